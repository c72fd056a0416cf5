use super::models::*;
use super::sqlite::Database;
use crate::classify::plan::CleanupPlan;
use rusqlite::{params, OptionalExtension, Result};
use tracing::debug;

fn map_plan_row(row: &rusqlite::Row<'_>) -> Result<PlanRow> {
    Ok(PlanRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        scan_descriptor: row.get(2)?,
        total_items: row.get(3)?,
        total_bytes: row.get(4)?,
        safe_count: row.get(5)?,
        safe_bytes: row.get(6)?,
        suspicious_count: row.get(7)?,
        suspicious_bytes: row.get(8)?,
        dangerous_count: row.get(9)?,
        dangerous_bytes: row.get(10)?,
    })
}

fn map_item_row(row: &rusqlite::Row<'_>) -> Result<PlanItemRow> {
    Ok(PlanItemRow {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        path: row.get(2)?,
        kind: row.get(3)?,
        size: row.get(4)?,
        rule_tier: row.get(5)?,
        final_tier: row.get(6)?,
        rationale: row.get(7)?,
        confidence: row.get(8)?,
        verdict_source: row.get(9)?,
        status: row.get(10)?,
        retry_count: row.get(11)?,
        error_text: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

fn map_manifest_row(row: &rusqlite::Row<'_>) -> Result<ManifestRow> {
    Ok(ManifestRow {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        item_id: row.get(2)?,
        original_path: row.get(3)?,
        backup_path: row.get(4)?,
        backup_tier: row.get(5)?,
        checksum: row.get(6)?,
        ref_fingerprint: row.get(7)?,
        size: row.get(8)?,
        created_at: row.get(9)?,
        pruned_at: row.get(10)?,
    })
}

fn map_execution_row(row: &rusqlite::Row<'_>) -> Result<ExecutionRow> {
    Ok(ExecutionRow {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        started_at: row.get(2)?,
        completed_at: row.get(3)?,
        status: row.get(4)?,
        success_count: row.get(5)?,
        failed_count: row.get(6)?,
        skipped_count: row.get(7)?,
        bytes_freed: row.get(8)?,
        bytes_failed: row.get(9)?,
    })
}

fn map_undo_row(row: &rusqlite::Row<'_>) -> Result<UndoRow> {
    Ok(UndoRow {
        execution_id: row.get(0)?,
        plan_id: row.get(1)?,
        completed_at: row.get(2)?,
        eligible_until: row.get(3)?,
        restore_state: row.get(4)?,
    })
}

impl Database {
    // ── Cleanup Plans ────────────────────────────────────────────

    /// Persist a plan and its items in one transaction. Membership and tier
    /// columns are frozen here; execution only ever touches item status.
    pub fn save_plan(&self, plan: &CleanupPlan) -> Result<()> {
        let tx = self.connection().unchecked_transaction()?;
        {
            tx.execute(
                "INSERT INTO cleanup_plan \
                 (id, created_at, scan_descriptor, total_items, total_bytes, \
                  safe_count, safe_bytes, suspicious_count, suspicious_bytes, \
                  dangerous_count, dangerous_bytes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    plan.id,
                    plan.created_at.to_rfc3339(),
                    plan.scan_descriptor,
                    plan.total_items() as i64,
                    plan.total_bytes() as i64,
                    plan.count_for(crate::model::RiskTier::Safe) as i64,
                    plan.bytes_for(crate::model::RiskTier::Safe) as i64,
                    plan.count_for(crate::model::RiskTier::Suspicious) as i64,
                    plan.bytes_for(crate::model::RiskTier::Suspicious) as i64,
                    plan.count_for(crate::model::RiskTier::Dangerous) as i64,
                    plan.bytes_for(crate::model::RiskTier::Dangerous) as i64,
                ],
            )?;

            let mut stmt = tx.prepare_cached(
                "INSERT INTO plan_item \
                 (plan_id, path, kind, size, rule_tier, final_tier, rationale, \
                  confidence, verdict_source, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')",
            )?;
            for verdict in &plan.items {
                stmt.execute(params![
                    plan.id,
                    verdict.item.path.to_string_lossy().into_owned(),
                    verdict.item.kind.as_str(),
                    verdict.item.size as i64,
                    verdict.rule_tier.as_str(),
                    verdict.tier.as_str(),
                    verdict.rationale,
                    verdict.confidence,
                    verdict.source.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Saved plan {} with {} items", plan.id, plan.items.len());
        Ok(())
    }

    pub fn get_plan(&self, plan_id: &str) -> Result<Option<PlanRow>> {
        self.connection()
            .query_row(
                "SELECT id, created_at, scan_descriptor, total_items, total_bytes, \
                        safe_count, safe_bytes, suspicious_count, suspicious_bytes, \
                        dangerous_count, dangerous_bytes \
                 FROM cleanup_plan WHERE id = ?1",
                params![plan_id],
                map_plan_row,
            )
            .optional()
    }

    pub fn get_plan_items(&self, plan_id: &str) -> Result<Vec<PlanItemRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, plan_id, path, kind, size, rule_tier, final_tier, rationale, \
                    confidence, verdict_source, status, retry_count, error_text, completed_at \
             FROM plan_item WHERE plan_id = ?1 ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![plan_id], map_item_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn update_item_status(
        &self,
        item_id: i64,
        status: &str,
        retry_count: i64,
        error_text: Option<&str>,
        completed_at: Option<&str>,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE plan_item SET status = ?1, retry_count = ?2, error_text = ?3, \
             completed_at = ?4 WHERE id = ?5",
            params![status, retry_count, error_text, completed_at, item_id],
        )?;
        Ok(())
    }

    // ── Backup Manifest ──────────────────────────────────────────

    /// Insert a manifest entry and return its row id. Entries are written
    /// exactly once; no other component mutates them after creation.
    pub fn insert_manifest_entry(&self, entry: &ManifestRow) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO backup_manifest \
             (plan_id, item_id, original_path, backup_path, backup_tier, checksum, \
              ref_fingerprint, size, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.plan_id,
                entry.item_id,
                entry.original_path,
                entry.backup_path,
                entry.backup_tier,
                entry.checksum,
                entry.ref_fingerprint,
                entry.size,
                entry.created_at,
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn get_manifest_for_plan(&self, plan_id: &str) -> Result<Vec<ManifestRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, plan_id, item_id, original_path, backup_path, backup_tier, \
                    checksum, ref_fingerprint, size, created_at, pruned_at \
             FROM backup_manifest WHERE plan_id = ?1 ORDER BY item_id",
        )?;
        let rows = stmt
            .query_map(params![plan_id], map_manifest_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_manifest_entry(&self, plan_id: &str, item_id: i64) -> Result<Option<ManifestRow>> {
        self.connection()
            .query_row(
                "SELECT id, plan_id, item_id, original_path, backup_path, backup_tier, \
                        checksum, ref_fingerprint, size, created_at, pruned_at \
                 FROM backup_manifest WHERE plan_id = ?1 AND item_id = ?2",
                params![plan_id, item_id],
                map_manifest_row,
            )
            .optional()
    }

    /// Manifest entries with a payload on disk created before the cutoff.
    pub fn manifest_entries_older_than(&self, cutoff_rfc3339: &str) -> Result<Vec<ManifestRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, plan_id, item_id, original_path, backup_path, backup_tier, \
                    checksum, ref_fingerprint, size, created_at, pruned_at \
             FROM backup_manifest \
             WHERE backup_path IS NOT NULL AND pruned_at IS NULL AND created_at < ?1",
        )?;
        let rows = stmt
            .query_map(params![cutoff_rfc3339], map_manifest_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark a payload as pruned. The manifest row itself is retained for
    /// audit and undo-history purposes.
    pub fn mark_manifest_pruned(&self, entry_id: i64) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE backup_manifest SET pruned_at = ?1 WHERE id = ?2",
            params![now, entry_id],
        )?;
        Ok(())
    }

    /// All live (unpruned) payload paths, for orphan sweeping.
    pub fn live_backup_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.connection().prepare(
            "SELECT backup_path FROM backup_manifest \
             WHERE backup_path IS NOT NULL AND pruned_at IS NULL",
        )?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Manifest rows whose plan or item referent is missing. Foreign keys
    /// make this unreachable through this code path; an externally modified
    /// database still surfaces as warnings rather than a crash.
    pub fn find_corrupt_manifest_entries(&self, plan_id: &str) -> Result<Vec<(i64, String)>> {
        let mut stmt = self.connection().prepare(
            "SELECT bm.id, \
                    CASE WHEN cp.id IS NULL THEN 'plan ' || bm.plan_id \
                         ELSE 'item ' || bm.item_id END \
             FROM backup_manifest bm \
             LEFT JOIN cleanup_plan cp ON cp.id = bm.plan_id \
             LEFT JOIN plan_item pi ON pi.id = bm.item_id \
             WHERE bm.plan_id = ?1 AND (cp.id IS NULL OR pi.id IS NULL)",
        )?;
        let rows = stmt
            .query_map(params![plan_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Executions ───────────────────────────────────────────────

    pub fn create_execution(&self, execution_id: &str, plan_id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO execution (id, plan_id, started_at, status) \
             VALUES (?1, ?2, ?3, 'running')",
            params![execution_id, plan_id, now],
        )?;
        Ok(())
    }

    pub fn complete_execution(
        &self,
        execution_id: &str,
        status: &str,
        success_count: i64,
        failed_count: i64,
        skipped_count: i64,
        bytes_freed: i64,
        bytes_failed: i64,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE execution SET completed_at = ?1, status = ?2, success_count = ?3, \
             failed_count = ?4, skipped_count = ?5, bytes_freed = ?6, bytes_failed = ?7 \
             WHERE id = ?8",
            params![
                now,
                status,
                success_count,
                failed_count,
                skipped_count,
                bytes_freed,
                bytes_failed,
                execution_id
            ],
        )?;
        Ok(())
    }

    pub fn get_execution(&self, execution_id: &str) -> Result<Option<ExecutionRow>> {
        self.connection()
            .query_row(
                "SELECT id, plan_id, started_at, completed_at, status, success_count, \
                        failed_count, skipped_count, bytes_freed, bytes_failed \
                 FROM execution WHERE id = ?1",
                params![execution_id],
                map_execution_row,
            )
            .optional()
    }

    pub fn insert_execution_failure(
        &self,
        execution_id: &str,
        item_id: i64,
        path: &str,
        error_kind: &str,
        error_text: &str,
        retry_count: i64,
        suggested_remedy: &str,
    ) -> Result<()> {
        self.connection().execute(
            "INSERT INTO execution_failure \
             (execution_id, item_id, path, error_kind, error_text, retry_count, suggested_remedy) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                execution_id,
                item_id,
                path,
                error_kind,
                error_text,
                retry_count,
                suggested_remedy
            ],
        )?;
        Ok(())
    }

    pub fn get_execution_failures(&self, execution_id: &str) -> Result<Vec<FailureRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, execution_id, item_id, path, error_kind, error_text, \
                    retry_count, suggested_remedy \
             FROM execution_failure WHERE execution_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![execution_id], |row| {
                Ok(FailureRow {
                    id: row.get(0)?,
                    execution_id: row.get(1)?,
                    item_id: row.get(2)?,
                    path: row.get(3)?,
                    error_kind: row.get(4)?,
                    error_text: row.get(5)?,
                    retry_count: row.get(6)?,
                    suggested_remedy: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Undo History ─────────────────────────────────────────────

    pub fn insert_undo_entry(
        &self,
        execution_id: &str,
        plan_id: &str,
        completed_at: &str,
        eligible_until: &str,
    ) -> Result<()> {
        self.connection().execute(
            "INSERT INTO undo_history (execution_id, plan_id, completed_at, eligible_until) \
             VALUES (?1, ?2, ?3, ?4)",
            params![execution_id, plan_id, completed_at, eligible_until],
        )?;
        Ok(())
    }

    pub fn get_undo_entry(&self, execution_id: &str) -> Result<Option<UndoRow>> {
        self.connection()
            .query_row(
                "SELECT execution_id, plan_id, completed_at, eligible_until, restore_state \
                 FROM undo_history WHERE execution_id = ?1",
                params![execution_id],
                map_undo_row,
            )
            .optional()
    }

    pub fn set_restore_state(&self, execution_id: &str, state: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE undo_history SET restore_state = ?1 WHERE execution_id = ?2",
            params![state, execution_id],
        )?;
        Ok(())
    }

    pub fn list_undo_history(&self) -> Result<Vec<UndoRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT execution_id, plan_id, completed_at, eligible_until, restore_state \
             FROM undo_history ORDER BY completed_at DESC",
        )?;
        let rows = stmt
            .query_map([], map_undo_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn record_item_restored(&self, execution_id: &str, item_id: i64) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT OR IGNORE INTO restore_item (execution_id, item_id, restored_at) \
             VALUES (?1, ?2, ?3)",
            params![execution_id, item_id, now],
        )?;
        Ok(())
    }

    pub fn restored_item_ids(&self, execution_id: &str) -> Result<Vec<i64>> {
        let mut stmt = self.connection().prepare(
            "SELECT item_id FROM restore_item WHERE execution_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![execution_id], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(ids)
    }
}
