//! On-disk cache of analysis results, keyed by file identity.
//!
//! The cache key is derived from the absolute path, file size, and
//! modification time, so editing or replacing a file invalidates its
//! cached entry automatically.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::error::{Result, TracklensError};

/// Caches [`AnalysisResult`] values as JSON files in a directory.
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    /// Open (and create if necessary) a cache at the platform default
    /// location, e.g. `~/.cache/tracklens` on Linux.
    pub fn open_default() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "tracklens", "tracklens").ok_or_else(|| {
            TracklensError::ConfigError(
                "could not determine a cache directory for this platform".to_string(),
            )
        })?;
        Self::open(dirs.cache_dir())
    }

    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Load a cached result for `audio_path`, or `None` on a miss.
    ///
    /// Corrupt entries are deleted and treated as misses.
    pub fn load(&self, audio_path: &Path) -> Option<AnalysisResult> {
        let entry = self.entry_path(audio_path)?;
        let data = fs::read_to_string(&entry).ok()?;
        match serde_json::from_str(&data) {
            Ok(result) => {
                debug!("cache hit: {}", entry.display());
                Some(result)
            }
            Err(e) => {
                warn!("removing corrupt cache entry {}: {}", entry.display(), e);
                let _ = fs::remove_file(&entry);
                None
            }
        }
    }

    /// Store a result for `audio_path`. Failures are logged, not fatal.
    pub fn store(&self, audio_path: &Path, result: &AnalysisResult) {
        let Some(entry) = self.entry_path(audio_path) else {
            return;
        };
        match serde_json::to_string(result) {
            Ok(json) => {
                if let Err(e) = fs::write(&entry, json) {
                    warn!("failed to write cache entry {}: {}", entry.display(), e);
                }
            }
            Err(e) => warn!("failed to serialize cache entry: {}", e),
        }
    }

    /// Remove every cached entry. Returns the number of files deleted.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!("cleared {} cache entries from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Directory holding the cache entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, audio_path: &Path) -> Option<PathBuf> {
        let key = cache_key(audio_path)?;
        Some(self.dir.join(format!("{:016x}.json", key)))
    }
}

/// Hash of path identity and file metadata, FNV-1a over
/// `"{absolute path}:{size}:{mtime seconds}"`.
fn cache_key(audio_path: &Path) -> Option<u64> {
    let abs = audio_path.canonicalize().ok()?;
    let meta = fs::metadata(&abs).ok()?;
    let mtime = meta
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    let identity = format!("{}:{}:{}", abs.display(), meta.len(), mtime);
    Some(fnv1a_64(identity.as_bytes()))
}

fn fnv1a_64(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
