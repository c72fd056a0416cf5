use crate::backup::BackupCoordinator;
use crate::config::AppConfig;
use crate::error::Error;
use crate::model::{CleanupStatus, DeleteErrorKind, ItemKind, RiskTier, RunStatus};
use crate::progress::ProgressReporter;
use crate::storage::models::PlanItemRow;
use crate::storage::Database;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One deletion failure after retry exhaustion, with enough detail for the
/// caller to offer itemized retry.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub item_id: i64,
    pub path: String,
    pub kind: DeleteErrorKind,
    pub error_text: String,
    pub retry_count: u32,
}

impl FailureRecord {
    pub fn suggested_remedy(&self) -> &'static str {
        self.kind.suggested_remedy()
    }
}

/// Aggregate outcome of one execution run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub plan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub bytes_freed: u64,
    pub bytes_failed: u64,
    pub failures: Vec<FailureRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Dangerous-tier items are only attempted when the caller explicitly
    /// confirmed them; otherwise they are recorded as skipped.
    pub include_dangerous: bool,
}

/// Handle to a run in flight. Cancellation and pause are cooperative flags
/// checked between items, never mid-item, so no item is ever left half
/// backed-up and half deleted.
pub struct ExecutionHandle {
    pub execution_id: String,
    cancel_flag: Arc<AtomicBool>,
    pause_flag: Arc<AtomicBool>,
    join: JoinHandle<Result<ExecutionResult, Error>>,
}

impl ExecutionHandle {
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.pause_flag.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause_flag.store(false, Ordering::SeqCst);
    }

    /// Block until the worker finishes and return its result.
    pub fn wait(self) -> Result<ExecutionResult, Error> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Other("execution worker panicked".to_string())),
        }
    }
}

/// Walks a plan on a dedicated worker thread: backup, then delete with
/// bounded retry, strictly sequentially, in the order safe → suspicious →
/// dangerous. One item's failure never aborts the run.
pub struct ExecutionEngine {
    db_path: String,
    backup_root: PathBuf,
    max_retries: u32,
    retry_delay: Duration,
    pause_poll: Duration,
    undo_window_days: i64,
}

impl ExecutionEngine {
    pub fn new(config: &AppConfig) -> ExecutionEngine {
        ExecutionEngine {
            db_path: config.database_path.clone(),
            backup_root: PathBuf::from(&config.backup_root),
            max_retries: config.execution.max_retries,
            retry_delay: Duration::from_millis(config.execution.retry_delay_ms),
            pause_poll: Duration::from_millis(config.execution.pause_poll_ms),
            undo_window_days: config.undo_window_days,
        }
    }

    pub fn with_db_path(mut self, path: &str) -> ExecutionEngine {
        self.db_path = path.to_string();
        self
    }

    /// Start executing a plan on a worker thread. Validates the plan before
    /// spawning so an unknown id fails fast on the calling thread.
    pub fn execute(
        &self,
        plan_id: &str,
        options: ExecuteOptions,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<ExecutionHandle, Error> {
        {
            let db = Database::open(&self.db_path)?;
            if db.get_plan(plan_id)?.is_none() {
                return Err(Error::UnknownPlan(plan_id.to_string()));
            }
        }

        let execution_id = Uuid::new_v4().to_string();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let pause_flag = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            db_path: self.db_path.clone(),
            backup_root: self.backup_root.clone(),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            pause_poll: self.pause_poll,
            undo_window_days: self.undo_window_days,
            plan_id: plan_id.to_string(),
            execution_id: execution_id.clone(),
            options,
            cancel_flag: cancel_flag.clone(),
            pause_flag: pause_flag.clone(),
            reporter,
        };

        let join = thread::Builder::new()
            .name("sweep-executor".to_string())
            .spawn(move || worker.run())
            .map_err(Error::Io)?;

        Ok(ExecutionHandle {
            execution_id,
            cancel_flag,
            pause_flag,
            join,
        })
    }
}

struct Worker {
    db_path: String,
    backup_root: PathBuf,
    max_retries: u32,
    retry_delay: Duration,
    pause_poll: Duration,
    undo_window_days: i64,
    plan_id: String,
    execution_id: String,
    options: ExecuteOptions,
    cancel_flag: Arc<AtomicBool>,
    pause_flag: Arc<AtomicBool>,
    reporter: Arc<dyn ProgressReporter>,
}

enum ItemOutcome {
    Success { retries: u32 },
    Skipped { reason: String, backup_failure: bool },
    Failed(FailureRecord),
}

impl Worker {
    fn run(self) -> Result<ExecutionResult, Error> {
        let db = Database::open(&self.db_path)?;
        let backup = BackupCoordinator::new(&self.backup_root)?;

        db.create_execution(&self.execution_id, &self.plan_id)?;
        let started_at = Utc::now();

        // Pending items first grouped by tier severity ascending, failed
        // items may be re-attempted on a later run.
        let all_items = db.get_plan_items(&self.plan_id)?;
        let mut queue: Vec<PlanItemRow> = Vec::with_capacity(all_items.len());
        for tier in [RiskTier::Safe, RiskTier::Suspicious, RiskTier::Dangerous] {
            queue.extend(
                all_items
                    .iter()
                    .filter(|i| {
                        i.final_tier == tier.as_str()
                            && matches!(i.status.as_str(), "pending" | "failed")
                    })
                    .cloned(),
            );
        }

        let total = queue.len();
        info!(
            "execution {} started: {} items from plan {}",
            self.execution_id, total, self.plan_id
        );
        self.reporter.on_execution_start(total);

        let mut result = ExecutionResult {
            execution_id: self.execution_id.clone(),
            plan_id: self.plan_id.clone(),
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            bytes_freed: 0,
            bytes_failed: 0,
            failures: Vec::new(),
        };
        let mut cancelled = false;
        // Skips caused by backup failure are real-world failures for the
        // purpose of status rollup, even though no deletion was attempted.
        let mut backup_failures = 0usize;

        for (index, item) in queue.iter().enumerate() {
            self.wait_while_paused();

            if self.cancel_flag.load(Ordering::SeqCst) {
                cancelled = true;
                // Everything not yet attempted is recorded as skipped.
                // Previously failed items queued for retry keep their
                // failed status; they just are not re-attempted.
                for remaining in &queue[index..] {
                    if remaining.status == "pending" {
                        self.mark_item(&db, remaining, CleanupStatus::Skipped, 0, Some("cancelled"))?;
                    }
                    result.skipped_count += 1;
                    self.reporter
                        .on_item_complete(&remaining.path, CleanupStatus::Skipped);
                }
                break;
            }

            self.reporter.on_item_start(&item.path, index, total);
            let outcome = self.process_item(&db, &backup, item)?;

            match outcome {
                ItemOutcome::Success { retries } => {
                    self.mark_item_with_status(
                        &db,
                        item,
                        CleanupStatus::Success,
                        retries as i64,
                        None,
                    )?;
                    result.success_count += 1;
                    result.bytes_freed += item.size.max(0) as u64;
                    self.reporter
                        .on_item_complete(&item.path, CleanupStatus::Success);
                }
                ItemOutcome::Skipped {
                    reason,
                    backup_failure,
                } => {
                    self.mark_item(&db, item, CleanupStatus::Skipped, 0, Some(&reason))?;
                    result.skipped_count += 1;
                    if backup_failure {
                        backup_failures += 1;
                    }
                    self.reporter
                        .on_item_complete(&item.path, CleanupStatus::Skipped);
                }
                ItemOutcome::Failed(failure) => {
                    self.mark_item_with_status(
                        &db,
                        item,
                        CleanupStatus::Failed,
                        failure.retry_count as i64,
                        Some(&failure.error_text),
                    )?;
                    db.insert_execution_failure(
                        &self.execution_id,
                        failure.item_id,
                        &failure.path,
                        failure.kind.as_str(),
                        &failure.error_text,
                        failure.retry_count as i64,
                        failure.suggested_remedy(),
                    )?;
                    result.failed_count += 1;
                    result.bytes_failed += item.size.max(0) as u64;
                    self.reporter
                        .on_item_complete(&item.path, CleanupStatus::Failed);
                    result.failures.push(failure);
                }
            }
        }

        let unsuccessful = result.failed_count + backup_failures;
        result.status = if cancelled {
            RunStatus::Cancelled
        } else if unsuccessful == 0 {
            RunStatus::Completed
        } else if result.success_count > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };
        result.completed_at = Some(Utc::now());

        db.complete_execution(
            &self.execution_id,
            result.status.as_str(),
            result.success_count as i64,
            result.failed_count as i64,
            result.skipped_count as i64,
            result.bytes_freed as i64,
            result.bytes_failed as i64,
        )?;

        // Anything actually deleted is reversible within the undo window.
        if result.success_count > 0 {
            let completed = result.completed_at.unwrap_or_else(Utc::now);
            let eligible_until = completed + ChronoDuration::days(self.undo_window_days);
            db.insert_undo_entry(
                &self.execution_id,
                &self.plan_id,
                &completed.to_rfc3339(),
                &eligible_until.to_rfc3339(),
            )?;
        }

        info!(
            "execution {} finished: {:?}, {} ok / {} failed / {} skipped, {} bytes freed",
            self.execution_id,
            result.status,
            result.success_count,
            result.failed_count,
            result.skipped_count,
            result.bytes_freed,
        );
        self.reporter.on_execution_complete(&result);
        Ok(result)
    }

    /// Backup (policy permitting), then delete with bounded retry.
    fn process_item(
        &self,
        db: &Database,
        backup: &BackupCoordinator,
        item: &PlanItemRow,
    ) -> Result<ItemOutcome, Error> {
        let tier = RiskTier::from_str(&item.final_tier).unwrap_or(RiskTier::Dangerous);

        if tier == RiskTier::Dangerous && !self.options.include_dangerous {
            debug!("{}: dangerous tier not confirmed, skipping", item.path);
            return Ok(ItemOutcome::Skipped {
                reason: "dangerous tier not confirmed".to_string(),
                backup_failure: false,
            });
        }

        self.mark_item(db, item, CleanupStatus::Running, item.retry_count, None)?;

        // Backup before delete. Losing the only copy of an item to a backup
        // failure is categorically worse than leaving it uncleaned, so a
        // failed backup skips the deletion outright.
        match backup.backup(db, item) {
            Ok(entry) => {
                let tier = crate::model::BackupTier::from_str(&entry.backup_tier)
                    .unwrap_or(crate::model::BackupTier::None);
                self.reporter.on_backup_complete(&item.path, tier);
            }
            Err(e) => {
                warn!("backup failed for {}: {}; deletion skipped", item.path, e);
                return Ok(ItemOutcome::Skipped {
                    reason: format!("backup failed: {e}"),
                    backup_failure: true,
                });
            }
        }

        let kind = ItemKind::from_str(&item.kind).unwrap_or(ItemKind::File);
        let path = Path::new(&item.path);
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match delete_path(path, kind) {
                Ok(()) => return Ok(ItemOutcome::Success { retries: attempts - 1 }),
                Err(e) => {
                    let error_kind = DeleteErrorKind::classify(&e);
                    // Already gone counts as done.
                    if error_kind == DeleteErrorKind::NotFound {
                        debug!("{}: already absent", item.path);
                        return Ok(ItemOutcome::Success { retries: attempts - 1 });
                    }
                    if attempts <= self.max_retries {
                        debug!(
                            "delete failed for {} (attempt {}/{}): {}; retrying",
                            item.path,
                            attempts,
                            self.max_retries + 1,
                            e
                        );
                        thread::sleep(self.retry_delay);
                        continue;
                    }
                    return Ok(ItemOutcome::Failed(FailureRecord {
                        item_id: item.id,
                        path: item.path.clone(),
                        kind: error_kind,
                        error_text: e.to_string(),
                        retry_count: attempts - 1,
                    }));
                }
            }
        }
    }

    fn wait_while_paused(&self) {
        if !self.pause_flag.load(Ordering::SeqCst) {
            return;
        }
        self.reporter.on_paused();
        while self.pause_flag.load(Ordering::SeqCst) && !self.cancel_flag.load(Ordering::SeqCst) {
            thread::sleep(self.pause_poll);
        }
        self.reporter.on_resumed();
    }

    fn mark_item(
        &self,
        db: &Database,
        item: &PlanItemRow,
        status: CleanupStatus,
        retry_count: i64,
        error_text: Option<&str>,
    ) -> Result<(), Error> {
        let current = CleanupStatus::from_str(&item.status).unwrap_or(CleanupStatus::Pending);
        if !current.may_transition_to(status) && current != status {
            // A non-monotonic transition is a programming bug, not a
            // runtime condition; surface it loudly.
            return Err(Error::Other(format!(
                "illegal status transition {} -> {} for item {}",
                current.as_str(),
                status.as_str(),
                item.id
            )));
        }
        let completed_at = match status {
            CleanupStatus::Success | CleanupStatus::Failed | CleanupStatus::Skipped => {
                Some(Utc::now().to_rfc3339())
            }
            _ => None,
        };
        db.update_item_status(
            item.id,
            status.as_str(),
            retry_count,
            error_text,
            completed_at.as_deref(),
        )?;
        Ok(())
    }

    /// Like `mark_item`, but for items that already moved Pending → Running
    /// inside this call chain.
    fn mark_item_with_status(
        &self,
        db: &Database,
        item: &PlanItemRow,
        status: CleanupStatus,
        retry_count: i64,
        error_text: Option<&str>,
    ) -> Result<(), Error> {
        let completed_at = Some(Utc::now().to_rfc3339());
        db.update_item_status(
            item.id,
            status.as_str(),
            retry_count,
            error_text,
            completed_at.as_deref(),
        )?;
        Ok(())
    }
}

fn delete_path(path: &Path, kind: ItemKind) -> std::io::Result<()> {
    match kind {
        ItemKind::Dir => fs::remove_dir_all(path),
        ItemKind::File => fs::remove_file(path),
    }
}
