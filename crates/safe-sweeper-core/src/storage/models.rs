/// A persisted cleanup plan — one analyzed batch, frozen at creation.
#[derive(Debug, Clone)]
pub struct PlanRow {
    pub id: String,
    pub created_at: String,
    pub scan_descriptor: String,
    pub total_items: i64,
    pub total_bytes: i64,
    pub safe_count: i64,
    pub safe_bytes: i64,
    pub suspicious_count: i64,
    pub suspicious_bytes: i64,
    pub dangerous_count: i64,
    pub dangerous_bytes: i64,
}

/// Mutable execution state for one planned item. The plan's membership and
/// tier columns are written once by the plan save; only status, retry_count,
/// error_text and completed_at change afterwards.
#[derive(Debug, Clone)]
pub struct PlanItemRow {
    pub id: i64,
    pub plan_id: String,
    pub path: String,
    pub kind: String,
    pub size: i64,
    pub rule_tier: String,
    pub final_tier: String,
    pub rationale: String,
    pub confidence: f64,
    pub verdict_source: String,
    pub status: String,
    pub retry_count: i64,
    pub error_text: Option<String>,
    pub completed_at: Option<String>,
}

/// Record of how one item was preserved before deletion. Written once by the
/// backup coordinator; `pruned_at` is the only column touched later.
#[derive(Debug, Clone)]
pub struct ManifestRow {
    pub id: i64,
    pub plan_id: String,
    pub item_id: i64,
    pub original_path: String,
    pub backup_path: Option<String>,
    pub backup_tier: String,
    pub checksum: Option<String>,
    pub ref_fingerprint: Option<i64>,
    pub size: i64,
    pub created_at: String,
    pub pruned_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionRow {
    pub id: String,
    pub plan_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub success_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    pub bytes_freed: i64,
    pub bytes_failed: i64,
}

#[derive(Debug, Clone)]
pub struct FailureRow {
    pub id: i64,
    pub execution_id: String,
    pub item_id: i64,
    pub path: String,
    pub error_kind: String,
    pub error_text: String,
    pub retry_count: i64,
    pub suggested_remedy: String,
}

/// One reversible execution, tracked for rollback eligibility.
#[derive(Debug, Clone)]
pub struct UndoRow {
    pub execution_id: String,
    pub plan_id: String,
    pub completed_at: String,
    pub eligible_until: String,
    pub restore_state: String,
}
