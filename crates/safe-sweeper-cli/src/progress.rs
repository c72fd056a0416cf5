use indicatif::{ProgressBar, ProgressStyle};
use safe_sweeper_core::model::{BackupTier, CleanupStatus};
use safe_sweeper_core::{ExecutionResult, ProgressReporter};
use std::sync::Mutex;

/// CLI progress reporter using an indicatif progress bar over plan items.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            f(pb);
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliReporter {
    fn on_execution_start(&self, total_items: usize) {
        let pb = ProgressBar::new(total_items as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Sweeping [{bar:30.cyan/dim}] {pos}/{len} items {msg}",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        let mut guard = self.bar.lock().unwrap();
        *guard = Some(pb);
    }

    fn on_item_start(&self, path: &str, _index: usize, _total: usize) {
        self.with_bar(|pb| pb.set_message(path.to_string()));
    }

    fn on_backup_complete(&self, _path: &str, _tier: BackupTier) {}

    fn on_item_complete(&self, _path: &str, _status: CleanupStatus) {
        self.with_bar(|pb| pb.inc(1));
    }

    fn on_paused(&self) {
        self.with_bar(|pb| pb.set_message("paused".to_string()));
    }

    fn on_resumed(&self) {
        self.with_bar(|pb| pb.set_message(String::new()));
    }

    fn on_execution_complete(&self, result: &ExecutionResult) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
        eprintln!(
            "  \x1b[32m✓\x1b[0m Sweep complete: {} ok, {} failed, {} skipped",
            result.success_count, result.failed_count, result.skipped_count
        );
    }
}
