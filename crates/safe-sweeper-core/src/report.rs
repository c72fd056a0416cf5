use crate::engine::ExecutionResult;
use crate::error::Error;
use std::path::Path;
use tracing::info;

/// Write an execution report as CSV: one row per failure, carrying the run
/// context and a suggested remedy, so a caller can drive itemized retry
/// from the file alone. A clean run produces just the header and summary.
pub fn write_execution_report(result: &ExecutionResult, path: &Path) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::Report(e.to_string()))?;

    writer
        .write_record([
            "execution_id",
            "plan_id",
            "status",
            "success_count",
            "failed_count",
            "skipped_count",
            "bytes_freed",
            "path",
            "error_kind",
            "error_text",
            "retry_count",
            "suggested_remedy",
        ])
        .map_err(|e| Error::Report(e.to_string()))?;

    let summary = [
        result.execution_id.clone(),
        result.plan_id.clone(),
        result.status.as_str().to_string(),
        result.success_count.to_string(),
        result.failed_count.to_string(),
        result.skipped_count.to_string(),
        result.bytes_freed.to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ];
    writer
        .write_record(&summary)
        .map_err(|e| Error::Report(e.to_string()))?;

    for failure in &result.failures {
        let retries = failure.retry_count.to_string();
        writer
            .write_record([
                result.execution_id.as_str(),
                result.plan_id.as_str(),
                result.status.as_str(),
                "",
                "",
                "",
                "",
                failure.path.as_str(),
                failure.kind.as_str(),
                failure.error_text.as_str(),
                retries.as_str(),
                failure.suggested_remedy(),
            ])
            .map_err(|e| Error::Report(e.to_string()))?;
    }

    writer.flush().map_err(|e| Error::Report(e.to_string()))?;
    info!(
        "execution report written to {} ({} failures)",
        path.display(),
        result.failures.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeleteErrorKind, RunStatus};
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_report_contains_summary_and_failures() {
        let result = ExecutionResult {
            execution_id: "exec-1".into(),
            plan_id: "plan-1".into(),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            status: RunStatus::Partial,
            success_count: 3,
            failed_count: 1,
            skipped_count: 0,
            bytes_freed: 4096,
            bytes_failed: 100,
            failures: vec![crate::engine::FailureRecord {
                item_id: 7,
                path: "/srv/widgets/stuck.dat".into(),
                kind: DeleteErrorKind::PermissionDenied,
                error_text: "permission denied".into(),
                retry_count: 3,
            }],
        };

        let tmp = tempdir().unwrap();
        let out = tmp.path().join("report.csv");
        write_execution_report(&result, &out).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + summary + one failure
        assert!(lines[1].contains("partial"));
        assert!(lines[2].contains("/srv/widgets/stuck.dat"));
        assert!(lines[2].contains("permission_denied"));
        assert!(lines[2].contains("elevated permissions"));
    }
}
