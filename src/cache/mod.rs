//! Persistent per-asset dependency cache.
//!
//! Maps each asset path to its content hash and direct dependencies (with
//! file sizes), so searches can skip assets that cannot possibly reference
//! the searched objects without re-reading them.
//!
//! Lifecycle:
//! 1. [`DependencyCache::load_or_generate`] reads the cache file once. A
//!    missing or unreadable file triggers a full project scan instead.
//! 2. [`DependencyCache::begin_search`] marks every entry unverified.
//! 3. [`DependencyCache::get_or_refresh`] re-hashes an entry the first time
//!    it is used in a run, recomputing dependencies only if the hash moved.
//! 4. [`DependencyCache::save_or_log`] rewrites the whole file.

pub mod entry;
pub mod format;

pub use entry::{CacheEntry, ReachVerdict};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage;

/// What the cache needs to know about a project's files.
pub trait AssetDatabase {
    /// Every asset path the initial scan should cover.
    fn all_asset_paths(&self) -> Vec<String>;
    /// Hash that changes whenever the asset's dependencies may have changed.
    fn dependency_hash(&self, path: &str) -> String;
    fn direct_dependencies(&self, path: &str) -> Vec<String>;
    /// Size of the file in bytes, 0 if it does not exist.
    fn file_size(&self, path: &str) -> i64;
}

/// Answer of a progress callback during the initial scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    AlreadyLoaded,
    Loaded { entries: usize },
    Generated { entries: usize },
    /// The scan was cancelled; missing entries are filled in on demand.
    Cancelled { scanned: usize, total: usize },
}

pub struct DependencyCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    loaded: bool,
    progress_interval: usize,
}

impl DependencyCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            loaded: false,
            progress_interval: 30,
        }
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn entry(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    // ─── Load / Generate ────────────────────────────────────────

    /// Read the cache file, or scan the whole project when there is no usable file.
    ///
    /// `progress(done, total)` is polled every `progress_interval` items of the scan.
    pub fn load_or_generate(
        &mut self,
        db: &dyn AssetDatabase,
        progress: &mut dyn FnMut(usize, usize) -> ScanControl,
    ) -> LoadOutcome {
        if self.loaded {
            return LoadOutcome::AlreadyLoaded;
        }
        self.loaded = true;

        match std::fs::read(&self.path) {
            Ok(bytes) => match format::decode(&bytes) {
                Ok(entries) => {
                    self.entries = entries;
                    debug!(entries = self.entries.len(), path = %self.path.display(), "loaded dependency cache");
                    return LoadOutcome::Loaded {
                        entries: self.entries.len(),
                    };
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "dependency cache unreadable, regenerating");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read dependency cache, regenerating");
            }
        }

        self.entries.clear();
        self.generate(db, progress)
    }

    pub fn ensure_loaded(&mut self, db: &dyn AssetDatabase) {
        if !self.loaded {
            self.load_or_generate(db, &mut |_, _| ScanControl::Continue);
        }
    }

    fn generate(
        &mut self,
        db: &dyn AssetDatabase,
        progress: &mut dyn FnMut(usize, usize) -> ScanControl,
    ) -> LoadOutcome {
        let start = Instant::now();
        let paths = db.all_asset_paths();
        let total = paths.len();

        for (index, path) in paths.into_iter().enumerate() {
            if index % self.progress_interval == 0 && progress(index, total) == ScanControl::Cancel {
                warn!(
                    scanned = index,
                    total, "dependency cache generation cancelled, remaining assets will be scanned on demand"
                );
                self.save_or_log();
                return LoadOutcome::Cancelled {
                    scanned: index,
                    total,
                };
            }
            let entry = CacheEntry::compute(&path, db);
            self.entries.insert(path, entry);
        }

        info!(
            entries = self.entries.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated dependency cache"
        );
        self.save_or_log();
        LoadOutcome::Generated {
            entries: self.entries.len(),
        }
    }

    // ─── Lookup ─────────────────────────────────────────────────

    /// Start of a search run: every entry is re-verified on first use.
    pub fn begin_search(&mut self) {
        for entry in self.entries.values_mut() {
            entry.verified = false;
            entry.verdict = ReachVerdict::Unknown;
        }
    }

    /// Verified direct dependencies and their sizes.
    pub fn get_or_refresh(&mut self, path: &str, db: &dyn AssetDatabase) -> (&[String], &[i64]) {
        let entry = self.verified_entry(path, db);
        (&entry.dependencies, &entry.file_sizes)
    }

    fn verified_entry(&mut self, path: &str, db: &dyn AssetDatabase) -> &mut CacheEntry {
        self.ensure_loaded(db);
        let entry = self
            .entries
            .entry(path.to_string())
            .or_insert_with(|| CacheEntry::compute(path, db));
        if !entry.verified {
            entry.verify(path, db);
        }
        entry
    }

    /// True if `path` is one of `targets` or transitively depends on one.
    pub fn references_any(
        &mut self,
        path: &str,
        targets: &HashSet<String>,
        db: &dyn AssetDatabase,
    ) -> bool {
        let mut on_stack = HashMap::new();
        self.reach(path, targets, db, &mut on_stack).0
    }

    /// Depth-first reachability. The second value is the shallowest asset
    /// still on the stack that a cycle ran into below `path`. While it is set
    /// a negative answer depends on that asset and is not stored.
    fn reach(
        &mut self,
        path: &str,
        targets: &HashSet<String>,
        db: &dyn AssetDatabase,
        on_stack: &mut HashMap<String, usize>,
    ) -> (bool, Option<usize>) {
        if targets.contains(path) {
            return (true, None);
        }
        if let Some(&depth) = on_stack.get(path) {
            return (false, Some(depth));
        }

        let entry = self.verified_entry(path, db);
        match entry.verdict {
            ReachVerdict::Yes => return (true, None),
            ReachVerdict::No => return (false, None),
            ReachVerdict::Unknown => {}
        }
        let dependencies = entry.dependencies.clone();

        let depth = on_stack.len();
        on_stack.insert(path.to_string(), depth);
        let mut reached = dependencies.iter().any(|d| targets.contains(d));
        let mut cut: Option<usize> = None;
        if !reached {
            for dependency in &dependencies {
                let (found, low) = self.reach(dependency, targets, db, on_stack);
                if found {
                    reached = true;
                    break;
                }
                cut = match (cut, low) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
        }
        on_stack.remove(path);

        // Cycles that only lead back to `path` itself are settled here.
        let cut = cut.filter(|&low| low < depth);
        if reached || cut.is_none() {
            if let Some(entry) = self.entries.get_mut(path) {
                entry.verdict = if reached { ReachVerdict::Yes } else { ReachVerdict::No };
            }
        }
        if reached {
            (true, None)
        } else {
            (false, cut)
        }
    }

    // ─── Persistence ────────────────────────────────────────────

    pub fn save(&self) -> Result<()> {
        storage::write_atomic(&self.path, &format::encode(&self.entries))?;
        debug!(entries = self.entries.len(), path = %self.path.display(), "saved dependency cache");
        Ok(())
    }

    /// Save failures only cost the next run a rescan.
    pub fn save_or_log(&self) {
        if let Err(e) = self.save() {
            warn!(path = %self.path.display(), error = %e, "failed to save dependency cache");
        }
    }

    /// Forget every entry and delete the cache file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.loaded = false;
        storage::remove_if_exists(&self.path)?;
        Ok(())
    }
}
