use crate::engine::ExecutionResult;
use crate::model::{BackupTier, CleanupStatus};

/// Trait for observing execution progress.
///
/// The engine writes events; any consumer (CLI, logger, test harness)
/// drains them independently. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_execution_start(&self, _total_items: usize) {}
    fn on_item_start(&self, _path: &str, _index: usize, _total: usize) {}
    fn on_backup_complete(&self, _path: &str, _tier: BackupTier) {}
    fn on_item_complete(&self, _path: &str, _status: CleanupStatus) {}
    fn on_paused(&self) {}
    fn on_resumed(&self) {}
    fn on_execution_complete(&self, _result: &ExecutionResult) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
