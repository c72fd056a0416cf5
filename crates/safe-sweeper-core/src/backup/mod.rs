pub mod checksum;

use crate::error::Error;
use crate::model::{BackupTier, ItemKind, RiskTier};
use crate::storage::models::{ManifestRow, PlanItemRow};
use crate::storage::Database;
use chrono::{Duration, Utc};
use rusqlite::params;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LINKS_DIR: &str = "links";
const FULL_DIR: &str = "full";

#[derive(Debug, Default, Clone)]
pub struct BackupStats {
    pub total_entries: i64,
    pub ref_link_entries: i64,
    pub full_copy_entries: i64,
    pub none_entries: i64,
    pub total_bytes: i64,
    pub pruned_entries: i64,
}

#[derive(Debug, Default)]
pub struct PruneStats {
    pub pruned_payloads: usize,
    pub orphans_removed: usize,
}

/// Creates backups keyed to risk tier and owns the manifest rows that record
/// them. Safe items get a tier-none entry (the decision is still recorded);
/// suspicious items get a hard link plus a content fingerprint; dangerous
/// items get a checksummed full copy.
pub struct BackupCoordinator {
    backup_root: PathBuf,
}

impl BackupCoordinator {
    pub fn new(backup_root: &Path) -> Result<BackupCoordinator, Error> {
        fs::create_dir_all(backup_root.join(LINKS_DIR))?;
        fs::create_dir_all(backup_root.join(FULL_DIR))?;
        Ok(BackupCoordinator {
            backup_root: backup_root.to_path_buf(),
        })
    }

    /// Back up one planned item ahead of its deletion and write the manifest
    /// entry. An `Err` here means the item must not be deleted.
    pub fn backup(&self, db: &Database, item: &PlanItemRow) -> Result<ManifestRow, Error> {
        let tier = RiskTier::from_str(&item.final_tier).unwrap_or(RiskTier::Dangerous);
        let kind = ItemKind::from_str(&item.kind).unwrap_or(ItemKind::File);

        let mut strategy = BackupTier::for_tier(tier);
        // Directories cannot be hard-linked; upgrade rather than skip.
        if strategy == BackupTier::RefLink && kind == ItemKind::Dir {
            strategy = BackupTier::FullCopy;
        }

        let original = Path::new(&item.path);
        let entry = match strategy {
            BackupTier::None => self.manifest_entry(item, BackupTier::None, None, None, None),
            BackupTier::RefLink => {
                let dest = self.backup_root.join(LINKS_DIR).join(backup_name(item));
                let fingerprint = checksum::ref_fingerprint(original)
                    .map_err(|e| backup_error(&item.path, e))?;
                fs::hard_link(original, &dest).map_err(|e| backup_error(&item.path, e))?;
                debug!("ref-link backup for {} at {}", item.path, dest.display());
                self.manifest_entry(
                    item,
                    BackupTier::RefLink,
                    Some(dest),
                    None,
                    Some(fingerprint as i64),
                )
            }
            BackupTier::FullCopy => {
                let dest = self.backup_root.join(FULL_DIR).join(backup_name(item));
                checksum::copy_recursive(original, &dest)
                    .map_err(|e| backup_error(&item.path, e))?;
                let digest =
                    checksum::blake3_checksum(&dest).map_err(|e| backup_error(&item.path, e))?;
                debug!("full-copy backup for {} at {}", item.path, dest.display());
                self.manifest_entry(item, BackupTier::FullCopy, Some(dest), Some(digest), None)
            }
        };

        let mut entry = entry;
        entry.id = db.insert_manifest_entry(&entry)?;
        Ok(entry)
    }

    fn manifest_entry(
        &self,
        item: &PlanItemRow,
        tier: BackupTier,
        backup_path: Option<PathBuf>,
        checksum: Option<String>,
        ref_fingerprint: Option<i64>,
    ) -> ManifestRow {
        ManifestRow {
            id: 0,
            plan_id: item.plan_id.clone(),
            item_id: item.id,
            original_path: item.path.clone(),
            backup_path: backup_path.map(|p| p.to_string_lossy().into_owned()),
            backup_tier: tier.as_str().to_string(),
            checksum,
            ref_fingerprint,
            size: item.size,
            created_at: Utc::now().to_rfc3339(),
            pruned_at: None,
        }
    }

    /// Remove backup payloads past the retention window, and sweep payload
    /// files no manifest row references. Manifest rows are retained either
    /// way; a later restore reports the payload unavailable.
    pub fn prune_expired(&self, db: &Database, retention_days: i64) -> Result<PruneStats, Error> {
        let cutoff = (Utc::now() - Duration::days(retention_days)).to_rfc3339();
        let mut stats = PruneStats::default();

        for entry in db.manifest_entries_older_than(&cutoff)? {
            let Some(backup_path) = entry.backup_path.as_deref() else {
                continue;
            };
            match remove_payload(Path::new(backup_path)) {
                Ok(()) => {
                    db.mark_manifest_pruned(entry.id)?;
                    stats.pruned_payloads += 1;
                }
                Err(e) => warn!("could not prune {}: {}", backup_path, e),
            }
        }

        let live: std::collections::HashSet<PathBuf> = db
            .live_backup_paths()?
            .into_iter()
            .map(PathBuf::from)
            .collect();
        for dir in [LINKS_DIR, FULL_DIR] {
            let dir = self.backup_root.join(dir);
            for child in fs::read_dir(&dir)? {
                let child = child?;
                if !live.contains(&child.path()) {
                    match remove_payload(&child.path()) {
                        Ok(()) => stats.orphans_removed += 1,
                        Err(e) => warn!("could not remove orphan {}: {}", child.path().display(), e),
                    }
                }
            }
        }

        info!(
            "prune complete: {} payloads pruned, {} orphans removed",
            stats.pruned_payloads, stats.orphans_removed
        );
        Ok(stats)
    }

    pub fn stats(&self, db: &Database) -> Result<BackupStats, Error> {
        let row = db.connection().query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN backup_tier = 'ref_link' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN backup_tier = 'full_copy' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN backup_tier = 'none' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(size), 0), \
                    COALESCE(SUM(CASE WHEN pruned_at IS NOT NULL THEN 1 ELSE 0 END), 0) \
             FROM backup_manifest",
            params![],
            |row| {
                Ok(BackupStats {
                    total_entries: row.get(0)?,
                    ref_link_entries: row.get(1)?,
                    full_copy_entries: row.get(2)?,
                    none_entries: row.get(3)?,
                    total_bytes: row.get(4)?,
                    pruned_entries: row.get(5)?,
                })
            },
        )?;
        Ok(row)
    }
}

fn backup_error(path: &str, source: std::io::Error) -> Error {
    Error::Backup {
        path: path.to_string(),
        source,
    }
}

fn remove_payload(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// `<item id>_<timestamp>_<sanitized name>` — unique per item and readable
/// when poking around the backup root by hand.
fn backup_name(item: &PlanItemRow) -> String {
    let stem = Path::new(&item.path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "item".to_string());
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}_{}", item.id, Utc::now().format("%Y%m%d%H%M%S"), sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::fs;
    use tempfile::tempdir;

    fn seeded_item(db: &Database, dir: &Path, name: &str, content: &[u8], tier: RiskTier) -> PlanItemRow {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();

        db.connection()
            .execute(
                "INSERT OR IGNORE INTO cleanup_plan (id, created_at, scan_descriptor, total_items, \
                 total_bytes, safe_count, safe_bytes, suspicious_count, suspicious_bytes, \
                 dangerous_count, dangerous_bytes) \
                 VALUES ('p1', '2026-01-01T00:00:00Z', 'test', 1, 1, 0, 0, 0, 0, 0, 0)",
                [],
            )
            .unwrap();
        db.connection()
            .execute(
                "INSERT INTO plan_item (plan_id, path, kind, size, rule_tier, final_tier, \
                 rationale, confidence, verdict_source) \
                 VALUES ('p1', ?1, 'file', ?2, ?3, ?3, 'test', 1.0, 'rule')",
                params![
                    path.to_string_lossy().into_owned(),
                    content.len() as i64,
                    tier.as_str()
                ],
            )
            .unwrap();
        let id = db.connection().last_insert_rowid();

        PlanItemRow {
            id,
            plan_id: "p1".into(),
            path: path.to_string_lossy().into_owned(),
            kind: "file".into(),
            size: content.len() as i64,
            rule_tier: tier.as_str().into(),
            final_tier: tier.as_str().into(),
            rationale: "test".into(),
            confidence: 1.0,
            verdict_source: "rule".into(),
            status: "pending".into(),
            retry_count: 0,
            error_text: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_safe_items_record_a_tier_none_entry() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let coordinator = BackupCoordinator::new(&tmp.path().join("backups")).unwrap();
        let item = seeded_item(&db, tmp.path(), "a.tmp", b"x", RiskTier::Safe);

        let entry = coordinator.backup(&db, &item).unwrap();
        assert_eq!(entry.backup_tier, "none");
        assert!(entry.backup_path.is_none());
        assert!(entry.checksum.is_none());
    }

    #[test]
    fn test_suspicious_items_get_a_link_and_fingerprint() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let coordinator = BackupCoordinator::new(&tmp.path().join("backups")).unwrap();
        let item = seeded_item(&db, tmp.path(), "b.xyz", b"linked content", RiskTier::Suspicious);

        let entry = coordinator.backup(&db, &item).unwrap();
        assert_eq!(entry.backup_tier, "ref_link");
        assert!(entry.ref_fingerprint.is_some());
        assert!(entry.checksum.is_none());
        let backup_path = entry.backup_path.unwrap();
        assert_eq!(fs::read(&backup_path).unwrap(), b"linked content");
    }

    #[test]
    fn test_dangerous_items_get_a_checksummed_copy() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let coordinator = BackupCoordinator::new(&tmp.path().join("backups")).unwrap();
        let item = seeded_item(&db, tmp.path(), "c.dat", b"precious", RiskTier::Dangerous);

        let entry = coordinator.backup(&db, &item).unwrap();
        assert_eq!(entry.backup_tier, "full_copy");
        let backup_path = entry.backup_path.clone().unwrap();
        assert_eq!(fs::read(&backup_path).unwrap(), b"precious");
        let digest = checksum::blake3_checksum(Path::new(&backup_path)).unwrap();
        assert_eq!(entry.checksum.as_deref(), Some(digest.as_str()));
    }

    #[test]
    fn test_backup_failure_surfaces_as_error() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let coordinator = BackupCoordinator::new(&tmp.path().join("backups")).unwrap();
        let mut item = seeded_item(&db, tmp.path(), "d.xyz", b"x", RiskTier::Suspicious);
        item.path = tmp.path().join("does_not_exist.xyz").to_string_lossy().into_owned();

        assert!(matches!(
            coordinator.backup(&db, &item),
            Err(Error::Backup { .. })
        ));
        // No manifest entry is written for a failed backup.
        assert!(db.get_manifest_entry("p1", item.id).unwrap().is_none());
    }

    #[test]
    fn test_prune_removes_old_payloads_but_keeps_rows() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let root = tmp.path().join("backups");
        let coordinator = BackupCoordinator::new(&root).unwrap();
        let item = seeded_item(&db, tmp.path(), "e.dat", b"old", RiskTier::Dangerous);

        let entry = coordinator.backup(&db, &item).unwrap();
        // Age the entry past the retention window.
        db.connection()
            .execute(
                "UPDATE backup_manifest SET created_at = '2020-01-01T00:00:00+00:00' WHERE id = ?1",
                params![entry.id],
            )
            .unwrap();

        let stats = coordinator.prune_expired(&db, 7).unwrap();
        assert_eq!(stats.pruned_payloads, 1);
        assert!(!Path::new(entry.backup_path.as_deref().unwrap()).exists());

        let row = db.get_manifest_entry("p1", item.id).unwrap().unwrap();
        assert!(row.pruned_at.is_some());
    }

    #[test]
    fn test_prune_sweeps_orphan_payloads() {
        let tmp = tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let root = tmp.path().join("backups");
        let coordinator = BackupCoordinator::new(&root).unwrap();

        fs::write(root.join("full/stray_payload"), b"nobody references me").unwrap();
        let stats = coordinator.prune_expired(&db, 7).unwrap();
        assert_eq!(stats.orphans_removed, 1);
        assert!(!root.join("full/stray_payload").exists());
    }
}
