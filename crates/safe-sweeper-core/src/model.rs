use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Risk tier assigned to a candidate item. Drives escalation eligibility,
/// backup strategy, and execution ordering — every tier-dependent decision
/// matches exhaustively on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Suspicious,
    Dangerous,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Safe => "safe",
            RiskTier::Suspicious => "suspicious",
            RiskTier::Dangerous => "dangerous",
        }
    }

    pub fn from_str(value: &str) -> Option<RiskTier> {
        match value {
            "safe" => Some(RiskTier::Safe),
            "suspicious" => Some(RiskTier::Suspicious),
            "dangerous" => Some(RiskTier::Dangerous),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Dir,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Dir => "dir",
        }
    }

    pub fn from_str(value: &str) -> Option<ItemKind> {
        match value {
            "file" => Some(ItemKind::File),
            "dir" => Some(ItemKind::Dir),
            _ => None,
        }
    }
}

/// One filesystem object under consideration for cleanup, as produced by the
/// scanner boundary. Metadata is already collected — classification performs
/// no I/O of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    pub path: PathBuf,
    pub size: u64,
    pub kind: ItemKind,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Optional pre-existing hint from the scanner. Replaces the
    /// unmatched-item default only; a matched rule always wins.
    #[serde(default)]
    pub risk_hint: Option<RiskTier>,
}

/// Where a verdict came from. Confidence is only meaningful for escalated
/// verdicts; rule verdicts carry 1.0 by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Rule,
    Escalated,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictSource::Rule => "rule",
            VerdictSource::Escalated => "escalated",
        }
    }

    pub fn from_str(value: &str) -> Option<VerdictSource> {
        match value {
            "rule" => Some(VerdictSource::Rule),
            "escalated" => Some(VerdictSource::Escalated),
            _ => None,
        }
    }
}

/// Outcome of classifying one item. `rule_tier` preserves the free tier's
/// answer even after escalation overrides it, so plans record tiers before
/// and after.
#[derive(Debug, Clone)]
pub struct ClassificationVerdict {
    pub item: CandidateItem,
    pub rule_tier: RiskTier,
    pub tier: RiskTier,
    pub rationale: String,
    pub confidence: f64,
    pub source: VerdictSource,
}

/// Backup strategy actually applied to an item, recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupTier {
    None,
    RefLink,
    FullCopy,
}

impl BackupTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupTier::None => "none",
            BackupTier::RefLink => "ref_link",
            BackupTier::FullCopy => "full_copy",
        }
    }

    pub fn from_str(value: &str) -> Option<BackupTier> {
        match value {
            "none" => Some(BackupTier::None),
            "ref_link" => Some(BackupTier::RefLink),
            "full_copy" => Some(BackupTier::FullCopy),
            _ => None,
        }
    }

    /// Strategy selection is a direct function of risk tier.
    pub fn for_tier(tier: RiskTier) -> BackupTier {
        match tier {
            RiskTier::Safe => BackupTier::None,
            RiskTier::Suspicious => BackupTier::RefLink,
            RiskTier::Dangerous => BackupTier::FullCopy,
        }
    }
}

/// Per-item execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl CleanupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupStatus::Pending => "pending",
            CleanupStatus::Running => "running",
            CleanupStatus::Success => "success",
            CleanupStatus::Failed => "failed",
            CleanupStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(value: &str) -> Option<CleanupStatus> {
        match value {
            "pending" => Some(CleanupStatus::Pending),
            "running" => Some(CleanupStatus::Running),
            "success" => Some(CleanupStatus::Success),
            "failed" => Some(CleanupStatus::Failed),
            "skipped" => Some(CleanupStatus::Skipped),
            _ => None,
        }
    }

    /// Transitions are monotonic: nothing moves back toward pending.
    /// Failed may re-enter Running (retry) or end Skipped (retry run that
    /// never reached it).
    pub fn may_transition_to(&self, next: CleanupStatus) -> bool {
        use CleanupStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Skipped) => true,
            (Running, Success) | (Running, Failed) | (Running, Skipped) => true,
            (Failed, Running) | (Failed, Skipped) => true,
            _ => false,
        }
    }
}

/// Aggregate state of one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<RunStatus> {
        match value {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

/// Rollback eligibility of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Available,
    Restored,
    Expired,
}

impl RestoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreState::Available => "available",
            RestoreState::Restored => "restored",
            RestoreState::Expired => "expired",
        }
    }

    pub fn from_str(value: &str) -> Option<RestoreState> {
        match value {
            "available" => Some(RestoreState::Available),
            "restored" => Some(RestoreState::Restored),
            "expired" => Some(RestoreState::Expired),
            _ => None,
        }
    }
}

/// Classified deletion failure, carrying a remedy the caller can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteErrorKind {
    PermissionDenied,
    InUse,
    NotFound,
    DiskFull,
    Other,
}

impl DeleteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteErrorKind::PermissionDenied => "permission_denied",
            DeleteErrorKind::InUse => "in_use",
            DeleteErrorKind::NotFound => "not_found",
            DeleteErrorKind::DiskFull => "disk_full",
            DeleteErrorKind::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<DeleteErrorKind> {
        match value {
            "permission_denied" => Some(DeleteErrorKind::PermissionDenied),
            "in_use" => Some(DeleteErrorKind::InUse),
            "not_found" => Some(DeleteErrorKind::NotFound),
            "disk_full" => Some(DeleteErrorKind::DiskFull),
            "other" => Some(DeleteErrorKind::Other),
            _ => None,
        }
    }

    pub fn suggested_remedy(&self) -> &'static str {
        match self {
            DeleteErrorKind::PermissionDenied => "retry with elevated permissions",
            DeleteErrorKind::InUse => "close the application holding the file and retry",
            DeleteErrorKind::NotFound => "item already absent; no action needed",
            DeleteErrorKind::DiskFull => "free disk space before retrying",
            DeleteErrorKind::Other => "inspect the error detail and retry",
        }
    }

    /// Map an I/O failure from a delete attempt onto the taxonomy. The
    /// numeric fallbacks are unix errnos (EBUSY, ETXTBSY, ENOSPC).
    pub fn classify(err: &std::io::Error) -> DeleteErrorKind {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => DeleteErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => DeleteErrorKind::NotFound,
            _ => match err.raw_os_error() {
                Some(16) | Some(26) => DeleteErrorKind::InUse,
                Some(28) => DeleteErrorKind::DiskFull,
                _ => DeleteErrorKind::Other,
            },
        }
    }
}
