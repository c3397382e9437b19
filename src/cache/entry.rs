use super::AssetDatabase;

/// Whether an asset transitively depends on one of the searched paths.
/// Computed at most once per search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachVerdict {
    #[default]
    Unknown,
    No,
    Yes,
}

/// Cached direct dependencies of one asset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheEntry {
    pub hash: String,
    /// Never contains empty paths.
    pub dependencies: Vec<String>,
    /// Size in bytes of each dependency, parallel to `dependencies`.
    pub file_sizes: Vec<i64>,
    pub(crate) verified: bool,
    pub(crate) verdict: ReachVerdict,
}

impl CacheEntry {
    /// A fresh, verified entry for `path`.
    pub fn compute(path: &str, db: &dyn AssetDatabase) -> Self {
        let mut entry = Self {
            hash: db.dependency_hash(path),
            ..Self::default()
        };
        entry.refresh(path, db);
        entry.verified = true;
        entry
    }

    /// An unverified entry read back from disk.
    pub(crate) fn from_parts(hash: String, dependencies: Vec<String>, file_sizes: Vec<i64>) -> Self {
        let mut entry = Self {
            hash,
            dependencies,
            file_sizes,
            verified: false,
            verdict: ReachVerdict::Unknown,
        };
        entry.compact();
        entry
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Re-check the content hash and recompute dependencies if it moved.
    pub fn verify(&mut self, path: &str, db: &dyn AssetDatabase) {
        let hash = db.dependency_hash(path);
        if hash != self.hash {
            self.hash = hash;
            self.refresh(path, db);
        }
        self.verified = true;
    }

    fn refresh(&mut self, path: &str, db: &dyn AssetDatabase) {
        self.dependencies = db.direct_dependencies(path);
        self.file_sizes = self
            .dependencies
            .iter()
            .map(|dependency| {
                if dependency.is_empty() {
                    0
                } else {
                    db.file_size(dependency)
                }
            })
            .collect();
        self.compact();
    }

    /// Drop empty dependency paths, keeping sizes aligned.
    fn compact(&mut self) {
        self.file_sizes.resize(self.dependencies.len(), 0);
        let mut sizes = std::mem::take(&mut self.file_sizes).into_iter();
        let mut kept_sizes = Vec::with_capacity(self.dependencies.len());
        self.dependencies.retain(|dependency| {
            let size = sizes.next().unwrap_or(0);
            if dependency.is_empty() {
                false
            } else {
                kept_sizes.push(size);
                true
            }
        });
        self.file_sizes = kept_sizes;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// In-memory database whose answers tests can change between calls.
    #[derive(Default)]
    pub(crate) struct FakeDatabase {
        pub hashes: RefCell<HashMap<String, String>>,
        pub dependencies: RefCell<HashMap<String, Vec<String>>>,
        pub sizes: RefCell<HashMap<String, i64>>,
        pub dependency_queries: Cell<usize>,
    }

    impl FakeDatabase {
        pub fn set(&self, path: &str, hash: &str, dependencies: &[&str]) {
            self.hashes.borrow_mut().insert(path.into(), hash.into());
            self.dependencies
                .borrow_mut()
                .insert(path.into(), dependencies.iter().map(|d| d.to_string()).collect());
        }

        pub fn set_size(&self, path: &str, size: i64) {
            self.sizes.borrow_mut().insert(path.into(), size);
        }
    }

    impl AssetDatabase for FakeDatabase {
        fn all_asset_paths(&self) -> Vec<String> {
            let mut paths: Vec<String> = self.hashes.borrow().keys().cloned().collect();
            paths.sort();
            paths
        }

        fn dependency_hash(&self, path: &str) -> String {
            self.hashes.borrow().get(path).cloned().unwrap_or_default()
        }

        fn direct_dependencies(&self, path: &str) -> Vec<String> {
            self.dependency_queries.set(self.dependency_queries.get() + 1);
            self.dependencies.borrow().get(path).cloned().unwrap_or_default()
        }

        fn file_size(&self, path: &str) -> i64 {
            self.sizes.borrow().get(path).copied().unwrap_or(0)
        }
    }

    #[test]
    fn test_verify_unchanged_hash_keeps_data() {
        let db = FakeDatabase::default();
        db.set("a.mat", "h1", &["b.png"]);
        db.set_size("b.png", 10);
        let mut entry = CacheEntry::compute("a.mat", &db);
        assert_eq!(db.dependency_queries.get(), 1);

        // Sizes change on disk but the hash does not: cached data is returned as is.
        db.set_size("b.png", 99);
        entry.verify("a.mat", &db);
        assert_eq!(db.dependency_queries.get(), 1, "dependencies not recomputed");
        assert_eq!(entry.file_sizes, vec![10]);
        assert!(entry.is_verified());
    }

    #[test]
    fn test_verify_changed_hash_refreshes() {
        let db = FakeDatabase::default();
        db.set("a.mat", "h1", &["b.png"]);
        db.set_size("b.png", 10);
        let mut entry = CacheEntry::compute("a.mat", &db);

        db.set("a.mat", "h2", &["c.png", "b.png"]);
        db.set_size("b.png", 11);
        db.set_size("c.png", 3);
        entry.verify("a.mat", &db);

        assert_eq!(entry.hash, "h2");
        assert_eq!(entry.dependencies, vec!["c.png", "b.png"]);
        assert_eq!(entry.file_sizes, vec![3, 11], "old sizes discarded");
    }

    #[test]
    fn test_empty_dependencies_are_compacted() {
        let db = FakeDatabase::default();
        db.set("a.mat", "h1", &["", "b.png", "", "c.png"]);
        db.set_size("b.png", 1);
        db.set_size("c.png", 2);

        let entry = CacheEntry::compute("a.mat", &db);
        assert_eq!(entry.dependencies, vec!["b.png", "c.png"]);
        assert_eq!(entry.file_sizes, vec![1, 2]);
    }

    #[test]
    fn test_loaded_entries_start_unverified() {
        let entry = CacheEntry::from_parts("h".into(), vec!["".into(), "x".into()], vec![0, 4]);
        assert!(!entry.is_verified());
        assert_eq!(entry.dependencies, vec!["x"]);
        assert_eq!(entry.file_sizes, vec![4]);
    }
}
