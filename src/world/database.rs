//! [`AssetDatabase`] backed by an [`ObjectWorld`] and the project directory.

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

use super::{ObjectId, ObjectWorld};
use crate::cache::AssetDatabase;
use crate::config::STATE_DIR;

pub struct ProjectDatabase<'w> {
    world: &'w ObjectWorld,
}

impl<'w> ProjectDatabase<'w> {
    pub fn new(world: &'w ObjectWorld) -> Self {
        Self { world }
    }

    /// Objects whose serialized data lives in the file at `path`.
    /// For a scene file that is every object in the scene.
    fn stored_objects(&self, path: &str) -> impl Iterator<Item = ObjectId> + '_ {
        self.world
            .objects_at(path)
            .iter()
            .chain(self.world.scene_members(path))
            .copied()
    }

    fn disk_files(&self, root: &Path) -> Vec<String> {
        WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(|entry| entry.file_name() != STATE_DIR)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(root).ok()?;
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect()
    }
}

impl AssetDatabase for ProjectDatabase<'_> {
    fn all_asset_paths(&self) -> Vec<String> {
        let mut paths: BTreeSet<String> = self.world.asset_paths().map(str::to_string).collect();
        if let Some(root) = self.world.project_root() {
            paths.extend(self.disk_files(root));
        }
        paths.into_iter().collect()
    }

    fn dependency_hash(&self, path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update([0u8]);

        if let Some(root) = self.world.project_root() {
            if let Ok(bytes) = std::fs::read(root.join(path)) {
                hasher.update(&bytes);
            }
        }
        hasher.update([0u8]);

        for id in self.stored_objects(path) {
            if let Some(record) = self.world.get(id) {
                if let Ok(json) = serde_json::to_vec(record) {
                    hasher.update(&json);
                    hasher.update([0u8]);
                }
            }
        }

        to_hex_lower(&hasher.finalize())
    }

    fn direct_dependencies(&self, path: &str) -> Vec<String> {
        let mut referenced = Vec::new();
        for id in self.stored_objects(path) {
            if let Some(record) = self.world.get(id) {
                referenced.extend(record.kind.references());
                for field in &record.fields {
                    field.value.collect_references(&mut referenced);
                }
            }
        }

        let dependencies: BTreeSet<String> = referenced
            .into_iter()
            .filter_map(|id| self.world.get(id)?.asset_path.clone())
            .filter(|dependency| dependency != path)
            .collect();
        dependencies.into_iter().collect()
    }

    fn file_size(&self, path: &str) -> i64 {
        self.world
            .project_root()
            .and_then(|root| std::fs::metadata(root.join(path)).ok())
            .map(|meta| meta.len() as i64)
            .unwrap_or(0)
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
