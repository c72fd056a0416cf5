use anyhow::{Context, Result};
use safe_sweeper_core::model::CandidateItem;
use std::fs;
use std::path::Path;

/// Read candidate items from the scanner boundary: either one JSON array or
/// JSON-lines, one item per line.
pub fn load_candidates(path: &Path) -> Result<Vec<CandidateItem>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading candidate file {}", path.display()))?;
    let trimmed = raw.trim_start();

    if trimmed.starts_with('[') {
        let items: Vec<CandidateItem> =
            serde_json::from_str(trimmed).context("parsing candidate JSON array")?;
        return Ok(items);
    }

    let mut items = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item: CandidateItem = serde_json::from_str(line)
            .with_context(|| format!("parsing candidate on line {}", line_no + 1))?;
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"path": "/tmp/a.log", "size": 10, "kind": "file"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"path": "/tmp/b", "size": 0, "kind": "dir"}}"#).unwrap();

        let items = load_candidates(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].size, 10);
    }

    #[test]
    fn test_loads_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"path": "/tmp/a.log", "size": 10, "kind": "file", "risk_hint": "safe"}}]"#
        )
        .unwrap();

        let items = load_candidates(file.path()).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].risk_hint.is_some());
    }
}
