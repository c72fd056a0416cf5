use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use safe_sweeper_core::classify::plan::build_plan;
use safe_sweeper_core::classify::rules::RuleClassifier;
use safe_sweeper_core::model::{CandidateItem, ItemKind, RunStatus};
use safe_sweeper_core::progress::ProgressReporter;
use safe_sweeper_core::storage::Database;
use safe_sweeper_core::{AppConfig, ExecuteOptions, ExecutionEngine, SilentReporter};
use tempfile::tempdir;

fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database_path = root.join("sweeper.db").to_string_lossy().into_owned();
    config.backup_root = root.join("backups").to_string_lossy().into_owned();
    config.execution.retry_delay_ms = 50;
    config.execution.pause_poll_ms = 10;
    config
}

fn candidate(path: &Path, kind: ItemKind, size: u64) -> CandidateItem {
    CandidateItem {
        path: path.to_path_buf(),
        size,
        kind,
        last_modified: Some(Utc::now()),
        risk_hint: None,
    }
}

fn file_candidate(path: &Path) -> CandidateItem {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    candidate(path, ItemKind::File, size)
}

/// Classify, build, and persist a plan for the given candidates.
fn save_plan(db: &Database, candidates: &[CandidateItem]) -> String {
    let classifier = RuleClassifier::new(&[]);
    let verdicts = candidates.iter().map(|c| classifier.classify(c)).collect();
    let plan = build_plan(verdicts, "execution test scan");
    db.save_plan(&plan).unwrap();
    plan.id
}

/// Records reporter callbacks for ordering assertions.
#[derive(Default)]
struct RecordingReporter {
    started: Mutex<Vec<String>>,
    paused: Mutex<usize>,
    resumed: Mutex<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn on_item_start(&self, path: &str, _index: usize, _total: usize) {
        self.started.lock().unwrap().push(path.to_string());
    }
    fn on_paused(&self) {
        *self.paused.lock().unwrap() += 1;
    }
    fn on_resumed(&self) {
        *self.resumed.lock().unwrap() += 1;
    }
}

#[test]
fn test_partial_execution_scenario() {
    // 10 safe, 5 suspicious, 2 dangerous; one suspicious item's backup
    // fails. Expect partial, 16 successes, 1 skipped, 0 failed.
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    let mut candidates = Vec::new();
    for i in 0..10 {
        let p = work.join(format!("junk_{i}.tmp"));
        fs::write(&p, format!("junk {i}")).unwrap();
        candidates.push(file_candidate(&p));
    }
    for i in 0..4 {
        let p = work.join(format!("notes_{i}.sqlite"));
        fs::write(&p, format!("notes {i}")).unwrap();
        candidates.push(file_candidate(&p));
    }
    // The fifth suspicious item's source is already gone: its backup must
    // fail, and its deletion must be skipped, not attempted.
    let ghost = work.join("ghost.sqlite");
    candidates.push(candidate(&ghost, ItemKind::File, 128));
    for i in 0..2 {
        let p = work.join(format!("tool_{i}.sh"));
        fs::write(&p, format!("#!/bin/sh\necho {i}")).unwrap();
        candidates.push(file_candidate(&p));
    }

    let plan_id = save_plan(&db, &candidates);
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let handle = engine
        .execute(
            &plan_id,
            ExecuteOptions {
                include_dangerous: true,
            },
            Arc::new(SilentReporter),
        )
        .unwrap();
    let result = handle.wait().unwrap();

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.success_count, 16);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.failed_count, 0);

    // Everything except the ghost is gone.
    for c in &candidates {
        if c.path == ghost {
            continue;
        }
        assert!(!c.path.exists(), "{} should be deleted", c.path.display());
    }

    let db = Database::open(&config.database_path).unwrap();
    let items = db.get_plan_items(&plan_id).unwrap();
    let ghost_item = items
        .iter()
        .find(|i| i.path.ends_with("ghost.sqlite"))
        .unwrap();
    assert_eq!(ghost_item.status, "skipped");
    assert!(ghost_item.error_text.as_deref().unwrap().contains("backup failed"));
    // No manifest entry exists for the backup-failed item.
    assert!(db
        .get_manifest_entry(&plan_id, ghost_item.id)
        .unwrap()
        .is_none());
}

#[test]
fn test_backup_exists_before_delete_for_risky_tiers() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    let suspicious = work.join("ledger.sqlite");
    fs::write(&suspicious, b"ledger data").unwrap();
    let dangerous = work.join("deploy.sh");
    fs::write(&dangerous, b"#!/bin/sh").unwrap();
    let safe = work.join("scratch.tmp");
    fs::write(&safe, b"scratch").unwrap();

    let plan_id = save_plan(
        &db,
        &[
            file_candidate(&safe),
            file_candidate(&suspicious),
            file_candidate(&dangerous),
        ],
    );
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(
            &plan_id,
            ExecuteOptions {
                include_dangerous: true,
            },
            Arc::new(SilentReporter),
        )
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.success_count, 3);

    let db = Database::open(&config.database_path).unwrap();
    let items = db.get_plan_items(&plan_id).unwrap();
    for item in &items {
        let entry = db
            .get_manifest_entry(&plan_id, item.id)
            .unwrap()
            .expect("every executed item gets a manifest entry");
        match item.final_tier.as_str() {
            "safe" => {
                assert_eq!(entry.backup_tier, "none");
                assert!(entry.backup_path.is_none());
            }
            "suspicious" => {
                assert_eq!(entry.backup_tier, "ref_link");
                let payload = entry.backup_path.as_deref().unwrap();
                assert!(Path::new(payload).exists());
                assert!(entry.checksum.is_none());
                assert!(entry.ref_fingerprint.is_some());
            }
            "dangerous" => {
                assert_eq!(entry.backup_tier, "full_copy");
                let payload = entry.backup_path.as_deref().unwrap();
                assert!(Path::new(payload).exists());
                assert!(entry.checksum.is_some());
            }
            other => panic!("unexpected tier {other}"),
        }
    }
}

#[test]
fn test_items_run_in_tier_order() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    let dangerous = work.join("zz_first_inserted.sh");
    fs::write(&dangerous, b"#!/bin/sh").unwrap();
    let suspicious = work.join("mm_second.sqlite");
    fs::write(&suspicious, b"data").unwrap();
    let safe = work.join("aa_last_inserted.tmp");
    fs::write(&safe, b"tmp").unwrap();

    // Deliberately inserted dangerous-first to prove ordering comes from
    // tier, not insertion order.
    let plan_id = save_plan(
        &db,
        &[
            file_candidate(&dangerous),
            file_candidate(&suspicious),
            file_candidate(&safe),
        ],
    );
    drop(db);

    let reporter = Arc::new(RecordingReporter::default());
    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(
            &plan_id,
            ExecuteOptions {
                include_dangerous: true,
            },
            reporter.clone(),
        )
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(result.success_count, 3);

    let started = reporter.started.lock().unwrap().clone();
    assert_eq!(started.len(), 3);
    assert!(started[0].ends_with("aa_last_inserted.tmp"));
    assert!(started[1].ends_with("mm_second.sqlite"));
    assert!(started[2].ends_with("zz_first_inserted.sh"));
}

#[test]
fn test_dangerous_items_need_explicit_confirmation() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    let safe = work.join("scratch.tmp");
    fs::write(&safe, b"scratch").unwrap();
    let dangerous = work.join("keeper.sh");
    fs::write(&dangerous, b"#!/bin/sh").unwrap();

    let plan_id = save_plan(&db, &[file_candidate(&safe), file_candidate(&dangerous)]);
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(&plan_id, ExecuteOptions::default(), Arc::new(SilentReporter))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.skipped_count, 1);
    // An unconfirmed dangerous tier is not a failure.
    assert_eq!(result.status, RunStatus::Completed);
    assert!(dangerous.exists(), "unconfirmed dangerous item must survive");
    assert!(!safe.exists());
}

#[test]
fn test_retry_exhaustion_records_failure() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    // A directory masquerading as a file: remove_file fails every attempt.
    let stuck = work.join("stuck.tmp");
    fs::create_dir_all(&stuck).unwrap();
    let fine = work.join("fine.tmp");
    fs::write(&fine, b"ok").unwrap();

    let plan_id = save_plan(
        &db,
        &[
            candidate(&stuck, ItemKind::File, 0),
            file_candidate(&fine),
        ],
    );
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(&plan_id, ExecuteOptions::default(), Arc::new(SilentReporter))
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.retry_count, config.execution.max_retries);
    assert!(failure.path.ends_with("stuck.tmp"));

    let db = Database::open(&config.database_path).unwrap();
    let failures = db.get_execution_failures(&result.execution_id).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].retry_count as u32, config.execution.max_retries);
    assert!(!failures[0].suggested_remedy.is_empty());

    let items = db.get_plan_items(&plan_id).unwrap();
    let stuck_item = items.iter().find(|i| i.path.ends_with("stuck.tmp")).unwrap();
    assert_eq!(stuck_item.status, "failed");
    assert_eq!(stuck_item.retry_count as u32, config.execution.max_retries);
}

#[test]
fn test_delete_succeeding_on_a_retry_counts_attempts() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let mut config = test_config(tmp.path());
    config.execution.retry_delay_ms = 300;
    let db = Database::open(&config.database_path).unwrap();

    // Starts life as a directory (remove_file fails), becomes a real file
    // mid-run, so the third attempt succeeds.
    let flaky = work.join("flaky.tmp");
    fs::create_dir_all(&flaky).unwrap();

    let plan_id = save_plan(&db, &[candidate(&flaky, ItemKind::File, 0)]);
    drop(db);

    let swap_path = flaky.clone();
    let swapper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(450));
        let _ = fs::remove_dir(&swap_path);
        let _ = fs::write(&swap_path, b"now a file");
    });

    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(&plan_id, ExecuteOptions::default(), Arc::new(SilentReporter))
        .unwrap()
        .wait()
        .unwrap();
    swapper.join().unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.success_count, 1);

    let db = Database::open(&config.database_path).unwrap();
    let items = db.get_plan_items(&plan_id).unwrap();
    assert_eq!(items[0].status, "success");
    assert_eq!(items[0].retry_count, 2);
}

#[test]
fn test_cancel_skips_everything_not_yet_attempted() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let mut config = test_config(tmp.path());
    config.execution.retry_delay_ms = 200;
    let db = Database::open(&config.database_path).unwrap();

    // First item burns ~600ms in its retry loop, leaving time to cancel.
    let slow = work.join("a_slow.tmp");
    fs::create_dir_all(&slow).unwrap();
    let mut candidates = vec![candidate(&slow, ItemKind::File, 0)];
    for i in 0..3 {
        let p = work.join(format!("later_{i}.tmp"));
        fs::write(&p, b"x").unwrap();
        candidates.push(file_candidate(&p));
    }

    let plan_id = save_plan(&db, &candidates);
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let handle = engine
        .execute(&plan_id, ExecuteOptions::default(), Arc::new(SilentReporter))
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    handle.cancel();
    let result = handle.wait().unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.skipped_count >= 3);
    for i in 0..3 {
        assert!(work.join(format!("later_{i}.tmp")).exists());
    }

    let db = Database::open(&config.database_path).unwrap();
    let items = db.get_plan_items(&plan_id).unwrap();
    let skipped = items.iter().filter(|i| i.status == "skipped").count();
    assert!(skipped >= 3);
}

#[test]
fn test_pause_blocks_between_items() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let mut config = test_config(tmp.path());
    config.execution.retry_delay_ms = 200;
    let db = Database::open(&config.database_path).unwrap();

    // First item takes ~600ms; the pause request lands while it runs and is
    // observed at the next item boundary.
    let slow = work.join("a_slow.tmp");
    fs::create_dir_all(&slow).unwrap();
    let second = work.join("b_second.tmp");
    fs::write(&second, b"x").unwrap();

    let plan_id = save_plan(
        &db,
        &[candidate(&slow, ItemKind::File, 0), file_candidate(&second)],
    );
    drop(db);

    let reporter = Arc::new(RecordingReporter::default());
    let engine = ExecutionEngine::new(&config);
    let handle = engine
        .execute(&plan_id, ExecuteOptions::default(), reporter.clone())
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    handle.pause();
    std::thread::sleep(Duration::from_millis(900));
    handle.resume();
    let result = handle.wait().unwrap();

    assert_eq!(*reporter.paused.lock().unwrap(), 1);
    assert_eq!(*reporter.resumed.lock().unwrap(), 1);
    assert_eq!(result.success_count, 1);
    assert!(!second.exists());
}

#[test]
fn test_undo_entry_written_with_configured_window() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let config = test_config(tmp.path());
    let db = Database::open(&config.database_path).unwrap();

    let file = work.join("gone.tmp");
    fs::write(&file, b"bye").unwrap();
    let plan_id = save_plan(&db, &[file_candidate(&file)]);
    drop(db);

    let engine = ExecutionEngine::new(&config);
    let result = engine
        .execute(&plan_id, ExecuteOptions::default(), Arc::new(SilentReporter))
        .unwrap()
        .wait()
        .unwrap();

    let db = Database::open(&config.database_path).unwrap();
    let undo = db.get_undo_entry(&result.execution_id).unwrap().unwrap();
    assert_eq!(undo.restore_state, "available");
    let completed = chrono::DateTime::parse_from_rfc3339(&undo.completed_at).unwrap();
    let until = chrono::DateTime::parse_from_rfc3339(&undo.eligible_until).unwrap();
    assert_eq!((until - completed).num_days(), config.undo_window_days);
}

#[test]
fn test_unknown_plan_fails_fast() {
    let tmp = tempdir().unwrap();
    let config = test_config(tmp.path());
    Database::open(&config.database_path).unwrap();

    let engine = ExecutionEngine::new(&config);
    let err = engine.execute(
        "no-such-plan",
        ExecuteOptions::default(),
        Arc::new(SilentReporter),
    );
    assert!(err.is_err());
}
