use crate::model::DeleteErrorKind;
use thiserror::Error;

/// Why an escalated classification batch could not produce verdicts.
/// Always recovered locally by falling back to the rule-tier verdicts;
/// never surfaced as a plan-level failure.
#[derive(Error, Debug)]
pub enum ClassificationFailure {
    #[error("advisor request failed: {0}")]
    Network(String),

    #[error("advisor response could not be parsed: {0}")]
    Parse(String),

    #[error("advisor response incomplete: {0}")]
    Incomplete(String),
}

/// Why an item could not be restored. Reported per item; a failing item
/// never aborts the rest of a restore session.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("undo window has expired for execution {0}")]
    NotEligible(String),

    #[error("unknown execution {0}")]
    UnknownExecution(String),

    #[error("backup payload unavailable for {0}")]
    PayloadMissing(String),

    #[error("backup payload for {path} no longer matches its recorded checksum")]
    ChecksumMismatch { path: String },

    #[error("destination {0} already exists")]
    DestinationConflict(String),

    #[error("IO error restoring {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Backup failed for {path}: {source}")]
    Backup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Deletion failed for {path} ({kind:?}): {detail}")]
    Delete {
        path: String,
        kind: DeleteErrorKind,
        detail: String,
    },

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error("manifest entry {entry_id} references missing {referent}")]
    ManifestCorruption { entry_id: i64, referent: String },

    #[error("unknown plan {0}")]
    UnknownPlan(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("{0}")]
    Other(String),
}
