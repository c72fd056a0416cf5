use dashmap::DashMap;
use rayon::prelude::*;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;
use walkdir::WalkDir;

const FINGERPRINT_LENGTH: usize = 1024; // 1KB

/// Cheap divergence fingerprint: XxHash64 over the first 1KB. Recorded for
/// reference-link backups so restore can tell whether the linked payload
/// still holds the content that was backed up.
pub fn ref_fingerprint(path: &Path) -> io::Result<u64> {
    let mut f = File::open(path)?;
    let mut buffer = vec![0; FINGERPRINT_LENGTH];
    let bytes_read = f.read(&mut buffer)?;
    buffer.truncate(bytes_read);

    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&buffer);
    Ok(hasher.finish())
}

/// Full-fidelity checksum of a file or directory payload, hex-encoded.
/// Directories hash per-file in parallel, then fold the per-file digests in
/// sorted relative-path order so the result is deterministic.
pub fn blake3_checksum(path: &Path) -> io::Result<String> {
    if path.is_dir() {
        blake3_dir(path)
    } else {
        blake3_file(path)
    }
}

fn blake3_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn blake3_dir(root: &Path) -> io::Result<String> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    let digests: DashMap<PathBuf, String> = DashMap::new();
    files.par_iter().try_for_each(|file| {
        let digest = blake3_file(file)?;
        let rel = file.strip_prefix(root).unwrap_or(file).to_path_buf();
        digests.insert(rel, digest);
        Ok::<_, io::Error>(())
    })?;

    let mut entries: Vec<(PathBuf, String)> = digests.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = blake3::Hasher::new();
    for (rel, digest) in entries {
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(digest.as_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Copy a file or an entire directory tree.
pub fn copy_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        for entry in WalkDir::new(src) {
            let entry = entry.map_err(io::Error::other)?;
            let rel = entry
                .path()
                .strip_prefix(src)
                .map_err(io::Error::other)?;
            let target = dst.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    } else {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
        Ok(())
    }
}
