use crate::backup::checksum;
use crate::error::{Error, RestoreError};
use crate::model::{BackupTier, RestoreState};
use crate::storage::models::{ManifestRow, UndoRow};
use crate::storage::Database;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// A validated selection of manifest entries ready to restore. Session
/// creation performs every eligibility check; executing the session is pure
/// mechanics.
#[derive(Debug)]
pub struct RestoreSession {
    pub id: String,
    pub execution_id: String,
    pub plan_id: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestRow>,
    /// Total restorable (cleaned, backed-up) items for this execution,
    /// selected or not.
    pub restorable_total: usize,
    /// Manifest rows with dangling referents, reported but never restored.
    pub integrity_warnings: Vec<String>,
}

#[derive(Debug)]
pub struct RestoreFailure {
    pub item_id: i64,
    pub path: String,
    pub error: RestoreError,
}

#[derive(Debug, Default)]
pub struct RestoreOutcome {
    pub restored: usize,
    /// Items that were already restored earlier: reported as success, no
    /// filesystem write performed.
    pub already_restored: usize,
    pub untouched: usize,
    pub failures: Vec<RestoreFailure>,
}

/// Create a restore session for an execution, optionally narrowed to
/// specific item ids. Fails with a dedicated error when the undo window has
/// passed — never a silent no-op.
pub fn create_restore_session(
    db: &Database,
    execution_id: &str,
    item_ids: Option<&[i64]>,
) -> Result<RestoreSession, Error> {
    let undo = db
        .get_undo_entry(execution_id)?
        .ok_or_else(|| RestoreError::UnknownExecution(execution_id.to_string()))?;

    check_eligibility(db, &undo)?;

    let integrity_warnings: Vec<String> = db
        .find_corrupt_manifest_entries(&undo.plan_id)?
        .into_iter()
        .map(|(entry_id, referent)| {
            warn!("manifest entry {} references missing {}", entry_id, referent);
            format!("manifest entry {entry_id} references missing {referent}")
        })
        .collect();

    // Only items that were actually cleaned can be put back.
    let cleaned: HashSet<i64> = db
        .get_plan_items(&undo.plan_id)?
        .iter()
        .filter(|i| i.status == "success")
        .map(|i| i.id)
        .collect();

    let manifest = db.get_manifest_for_plan(&undo.plan_id)?;
    let restorable_total = manifest
        .iter()
        .filter(|m| m.backup_path.is_some() && cleaned.contains(&m.item_id))
        .count();

    let entries: Vec<ManifestRow> = match item_ids {
        Some(ids) => {
            let wanted: HashSet<i64> = ids.iter().copied().collect();
            manifest
                .into_iter()
                .filter(|m| wanted.contains(&m.item_id))
                .collect()
        }
        None => manifest
            .into_iter()
            .filter(|m| m.backup_path.is_some() && cleaned.contains(&m.item_id))
            .collect(),
    };

    info!(
        "restore session for execution {}: {} of {} restorable items selected",
        execution_id,
        entries.len(),
        restorable_total
    );

    Ok(RestoreSession {
        id: Uuid::new_v4().to_string(),
        execution_id: execution_id.to_string(),
        plan_id: undo.plan_id,
        created_at: Utc::now(),
        entries,
        restorable_total,
        integrity_warnings,
    })
}

/// Restore every entry in the session. Individual failures are collected;
/// they never abort the remaining entries. Restoring an already-restored
/// item reports success without writing anything.
pub fn execute_restore(db: &Database, session: &RestoreSession) -> Result<RestoreOutcome, Error> {
    let previously_restored: HashSet<i64> = db
        .restored_item_ids(&session.execution_id)?
        .into_iter()
        .collect();

    let mut outcome = RestoreOutcome::default();

    for entry in &session.entries {
        if previously_restored.contains(&entry.item_id) {
            outcome.already_restored += 1;
            continue;
        }

        match restore_entry(entry) {
            Ok(()) => {
                db.record_item_restored(&session.execution_id, entry.item_id)?;
                outcome.restored += 1;
            }
            Err(error) => {
                warn!("restore failed for {}: {}", entry.original_path, error);
                outcome.failures.push(RestoreFailure {
                    item_id: entry.item_id,
                    path: entry.original_path.clone(),
                    error,
                });
            }
        }
    }

    outcome.untouched = session
        .restorable_total
        .saturating_sub(outcome.restored + outcome.already_restored + outcome.failures.len());

    // Once every restorable item is back, the whole execution flips to
    // restored.
    let now_restored: HashSet<i64> = db
        .restored_item_ids(&session.execution_id)?
        .into_iter()
        .collect();
    if session.restorable_total > 0 && now_restored.len() >= session.restorable_total {
        db.set_restore_state(&session.execution_id, RestoreState::Restored.as_str())?;
    }

    info!(
        "restore session {}: {} restored, {} already restored, {} failed, {} untouched",
        session.id,
        outcome.restored,
        outcome.already_restored,
        outcome.failures.len(),
        outcome.untouched
    );
    Ok(outcome)
}

/// Undo history, newest first, with expired windows refreshed on read.
pub fn undo_history(db: &Database) -> Result<Vec<UndoRow>, Error> {
    let mut rows = db.list_undo_history()?;
    let now = Utc::now();
    for row in rows.iter_mut() {
        if row.restore_state == RestoreState::Available.as_str() && is_past(&row.eligible_until, now)
        {
            db.set_restore_state(&row.execution_id, RestoreState::Expired.as_str())?;
            row.restore_state = RestoreState::Expired.as_str().to_string();
        }
    }
    Ok(rows)
}

pub fn restored_items(db: &Database, execution_id: &str) -> Result<Vec<i64>, Error> {
    Ok(db.restored_item_ids(execution_id)?)
}

fn check_eligibility(db: &Database, undo: &UndoRow) -> Result<(), Error> {
    if undo.restore_state == RestoreState::Expired.as_str() {
        return Err(RestoreError::NotEligible(undo.execution_id.clone()).into());
    }
    if is_past(&undo.eligible_until, Utc::now()) {
        db.set_restore_state(&undo.execution_id, RestoreState::Expired.as_str())?;
        return Err(RestoreError::NotEligible(undo.execution_id.clone()).into());
    }
    Ok(())
}

fn is_past(rfc3339: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(rfc3339) {
        Ok(ts) => now > ts.with_timezone(&Utc),
        // An unparseable timestamp should deny restore, not allow it.
        Err(_) => true,
    }
}

fn restore_entry(entry: &ManifestRow) -> Result<(), RestoreError> {
    let tier = BackupTier::from_str(&entry.backup_tier).unwrap_or(BackupTier::None);

    let backup_path = match (&entry.backup_path, tier) {
        (Some(p), BackupTier::RefLink | BackupTier::FullCopy) => Path::new(p),
        _ => return Err(RestoreError::PayloadMissing(entry.original_path.clone())),
    };

    if entry.pruned_at.is_some() || !backup_path.exists() {
        return Err(RestoreError::PayloadMissing(entry.original_path.clone()));
    }

    let destination = Path::new(&entry.original_path);
    if destination.exists() {
        return Err(RestoreError::DestinationConflict(
            entry.original_path.clone(),
        ));
    }

    match tier {
        BackupTier::RefLink => {
            // The link shares the payload's inode: if the fingerprint moved,
            // the content we preserved is gone.
            if let Some(recorded) = entry.ref_fingerprint {
                let current = checksum::ref_fingerprint(backup_path).map_err(|e| io_error(entry, e))?;
                if current as i64 != recorded {
                    return Err(RestoreError::ChecksumMismatch {
                        path: entry.original_path.clone(),
                    });
                }
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(entry, e))?;
            }
            // Link back where possible; fall back to a copy across devices.
            if fs::hard_link(backup_path, destination).is_err() {
                fs::copy(backup_path, destination).map_err(|e| io_error(entry, e))?;
            }
        }
        BackupTier::FullCopy => {
            if let Some(recorded) = entry.checksum.as_deref() {
                let current =
                    checksum::blake3_checksum(backup_path).map_err(|e| io_error(entry, e))?;
                if current != recorded {
                    return Err(RestoreError::ChecksumMismatch {
                        path: entry.original_path.clone(),
                    });
                }
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(entry, e))?;
            }
            checksum::copy_recursive(backup_path, destination).map_err(|e| io_error(entry, e))?;
        }
        BackupTier::None => unreachable!("tier-none entries are rejected above"),
    }

    Ok(())
}

fn io_error(entry: &ManifestRow, source: std::io::Error) -> RestoreError {
    RestoreError::Io {
        path: entry.original_path.clone(),
        source,
    }
}
