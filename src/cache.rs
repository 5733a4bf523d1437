//! Process-lifetime build caches.
//!
//! The universe tier holds one generated universe keyed by a content hash of
//! its inputs. The file tier holds one extracted class set per content file
//! keyed by modification time. Each tier has a single lock; entries are
//! replaced whole, never patched.

use crate::generator::Universe;
use crate::registry::RuleExtensions;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// Fingerprint of everything the universe is derived from.
///
/// `extra` covers inputs that only exist in code, such as the ids of custom
/// builders.
pub fn content_hash(
    token_source: &str,
    media_source: &str,
    extensions: &RuleExtensions,
    extra: &[&str],
) -> String {
    let mut hasher = Sha256::new();
    update_framed(&mut hasher, token_source.as_bytes());
    update_framed(&mut hasher, media_source.as_bytes());
    let serialized = serde_json::to_vec(extensions).unwrap_or_default();
    update_framed(&mut hasher, &serialized);
    for item in extra {
        update_framed(&mut hasher, item.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[derive(Debug)]
pub struct UniverseCacheEntry {
    pub content_hash: String,
    pub universe: Universe,
    pub raw_text: String,
}

#[derive(Debug, Default)]
pub struct UniverseCache {
    entry: Mutex<Option<Arc<UniverseCacheEntry>>>,
    generations: AtomicUsize,
}

impl UniverseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry when `content_hash` matches, otherwise runs
    /// `build`, publishes the finished universe and returns it. The flag is
    /// `true` when `build` ran.
    pub fn get_or_build<F>(&self, content_hash: &str, build: F) -> (Arc<UniverseCacheEntry>, bool)
    where
        F: FnOnce() -> Universe,
    {
        let mut slot = lock(&self.entry);
        if let Some(entry) = slot.as_ref() {
            if entry.content_hash == content_hash {
                return (Arc::clone(entry), false);
            }
        }

        let universe = build();
        let raw_text = universe.raw_text();
        let entry = Arc::new(UniverseCacheEntry {
            content_hash: content_hash.to_string(),
            universe,
            raw_text,
        });
        *slot = Some(Arc::clone(&entry));
        self.generations.fetch_add(1, Ordering::Relaxed);
        (entry, true)
    }

    pub fn current(&self) -> Option<Arc<UniverseCacheEntry>> {
        lock(&self.entry).clone()
    }

    pub fn content_hash(&self) -> Option<String> {
        lock(&self.entry)
            .as_ref()
            .map(|entry| entry.content_hash.clone())
    }

    /// How many times a universe has been generated.
    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileScanRecord {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub classes: Arc<BTreeSet<String>>,
}

#[derive(Debug, Default)]
pub struct FileScanCache {
    records: Mutex<HashMap<PathBuf, FileScanRecord>>,
    scans: AtomicUsize,
}

impl FileScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached classes for `path` when its stored modification
    /// time equals `modified`; otherwise runs `scan` and stores the result.
    /// A file without a known modification time is always rescanned and
    /// never stored. A failed scan is returned as-is and not stored.
    ///
    /// `scan` runs without the lock held so files can be scanned in parallel.
    pub fn classes_for<F, E>(
        &self,
        path: &Path,
        modified: Option<SystemTime>,
        scan: F,
    ) -> Result<Arc<BTreeSet<String>>, E>
    where
        F: FnOnce() -> Result<BTreeSet<String>, E>,
    {
        if let Some(modified) = modified {
            if let Some(record) = lock(&self.records).get(path) {
                if record.modified == modified {
                    return Ok(Arc::clone(&record.classes));
                }
            }
        }

        let classes = Arc::new(scan()?);
        self.scans.fetch_add(1, Ordering::Relaxed);
        if let Some(modified) = modified {
            lock(&self.records).insert(
                path.to_path_buf(),
                FileScanRecord {
                    path: path.to_path_buf(),
                    modified,
                    classes: Arc::clone(&classes),
                },
            );
        }
        Ok(classes)
    }

    pub fn get(&self, path: &Path) -> Option<FileScanRecord> {
        lock(&self.records).get(path).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a file has actually been scanned.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Drops records for paths not in `paths`. Returns how many were removed.
    pub fn retain_paths(&self, paths: &[PathBuf]) -> usize {
        let keep = paths.iter().collect::<std::collections::HashSet<_>>();
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|path, _| keep.contains(path));
        before - records.len()
    }
}

/// Both cache tiers. Constructed once per build process and shared by
/// reference with every build pass.
#[derive(Debug, Default)]
pub struct BuildCache {
    pub universe: UniverseCache,
    pub files: FileScanCache,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
