//! The project's object graph.
//!
//! [`ObjectWorld`] owns every [`ObjectRecord`] of a project and keeps the
//! indexes the crawler and the reverser look things up by: asset path, guid,
//! scene membership and the game object hierarchy.

pub mod database;
pub mod object;

pub use database::ProjectDatabase;
pub use object::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RefGraphError, Result};

/// Label given to nodes whose object no longer exists.
pub const DESTROYED_LABEL: &str = "<<destroyed>>";

/// On-disk project description: `.refgraph/objects.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub objects: Vec<ObjectRecord>,
}

/// A searched object together with the sub-objects stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    pub main: ObjectId,
    pub sub_objects: Vec<ObjectId>,
}

impl SearchTarget {
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::once(self.main).chain(self.sub_objects.iter().copied())
    }
}

#[derive(Debug, Default)]
pub struct ObjectWorld {
    records: Vec<ObjectRecord>,
    by_id: HashMap<ObjectId, usize>,
    by_path: BTreeMap<String, Vec<ObjectId>>,
    by_guid: HashMap<String, String>,
    by_scene: BTreeMap<String, Vec<ObjectId>>,
    parents: HashMap<ObjectId, ObjectId>,
    project_root: Option<PathBuf>,
}

impl ObjectWorld {
    /// Read a JSON manifest. Text assets without inline text are read from `project_root`.
    pub fn load(manifest_path: &Path, project_root: Option<&Path>) -> Result<Self> {
        let text = std::fs::read_to_string(manifest_path)?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        let mut world = Self::from_records(manifest.objects)?;
        world.project_root = project_root.map(Path::to_path_buf);
        debug!(
            objects = world.records.len(),
            assets = world.by_path.len(),
            "loaded object manifest"
        );
        Ok(world)
    }

    pub fn from_records(records: Vec<ObjectRecord>) -> Result<Self> {
        let mut world = Self {
            records,
            ..Self::default()
        };

        for (index, record) in world.records.iter().enumerate() {
            if world.by_id.insert(record.id, index).is_some() {
                return Err(RefGraphError::InvalidManifest(format!(
                    "duplicate object id {}",
                    record.id
                )));
            }
            if let Some(path) = &record.asset_path {
                world.by_path.entry(path.clone()).or_default().push(record.id);
                if let Some(guid) = &record.guid {
                    world.by_guid.insert(guid.clone(), path.clone());
                }
            }
            if let Some(scene) = &record.scene {
                world.by_scene.entry(scene.clone()).or_default().push(record.id);
            }
            if let ObjectKind::GameObject { children, .. } = &record.kind {
                for child in children {
                    world.parents.insert(*child, record.id);
                }
            }
        }

        Ok(world)
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    // ─── Lookup ─────────────────────────────────────────────────

    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.by_id.get(&id).map(|&index| &self.records[index])
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// "name (Type)", or the destroyed marker for unknown ids.
    pub fn label(&self, id: ObjectId) -> String {
        match self.get(id) {
            Some(record) => format!("{} ({})", record.name, record.kind.type_name()),
            None => DESTROYED_LABEL.to_string(),
        }
    }

    pub fn path_for_guid(&self, guid: &str) -> Option<&str> {
        self.by_guid.get(guid).map(String::as_str)
    }

    // ─── Assets ─────────────────────────────────────────────────

    pub fn asset_paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    /// Every object stored at `path`, main asset first when the manifest lists it first.
    pub fn objects_at(&self, path: &str) -> &[ObjectId] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn main_asset_at(&self, path: &str) -> Option<ObjectId> {
        self.objects_at(path)
            .iter()
            .copied()
            .find(|&id| self.get(id).is_some_and(|r| !r.sub_asset))
    }

    pub fn is_asset(&self, id: ObjectId) -> bool {
        self.get(id).is_some_and(ObjectRecord::is_asset)
    }

    pub fn is_main_asset(&self, id: ObjectId) -> bool {
        self.get(id).is_some_and(|r| r.is_asset() && !r.sub_asset)
    }

    /// Sub-assets stored next to `main`. Components and transforms are part of
    /// their game object and are not listed.
    pub fn sub_objects(&self, main: ObjectId) -> Vec<ObjectId> {
        let Some(path) = self.get(main).and_then(|r| r.asset_path.as_deref()) else {
            return Vec::new();
        };
        self.objects_at(path)
            .iter()
            .copied()
            .filter(|&id| id != main)
            .filter(|&id| {
                self.get(id)
                    .is_some_and(|r| r.sub_asset && !r.kind.is_component_like())
            })
            .collect()
    }

    /// Main assets stored anywhere below `folder`.
    pub fn assets_under(&self, folder: &str) -> Vec<ObjectId> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        self.by_path
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, _)| self.main_asset_at(path))
            .collect()
    }

    /// Inline text of a text-like asset, or its file contents under the project root.
    pub fn source_text(&self, id: ObjectId) -> Option<String> {
        let record = self.get(id)?;
        if let Some(text) = &record.text {
            return Some(text.clone());
        }
        let root = self.project_root.as_ref()?;
        let path = record.asset_path.as_deref()?;
        std::fs::read_to_string(root.join(path)).ok()
    }

    // ─── Hierarchy ──────────────────────────────────────────────

    pub fn owner_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id)?.kind.owner()
    }

    /// Component references are reported on their game object.
    pub fn preferably_game_object(&self, id: ObjectId) -> ObjectId {
        self.owner_of(id).unwrap_or(id)
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.parents.get(&id).copied()
    }

    fn children_of(&self, id: ObjectId) -> &[ObjectId] {
        match self.get(id).map(|r| &r.kind) {
            Some(ObjectKind::GameObject { children, .. }) => children,
            _ => &[],
        }
    }

    /// Resolve a slash-separated child path ("Body/Arm") below `root`.
    /// An empty path resolves to `root` itself.
    pub fn find_by_hierarchy_path(&self, root: ObjectId, path: &str) -> Option<ObjectId> {
        let mut current = root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .children_of(current)
                .iter()
                .copied()
                .find(|&child| self.get(child).is_some_and(|r| r.name == segment))?;
        }
        Some(current)
    }

    /// Absolute sibling indices from the scene root down to the object.
    /// Components use their game object's position.
    pub fn hierarchy_path(&self, id: ObjectId) -> Vec<u32> {
        let mut current = self.preferably_game_object(id);
        let mut path = Vec::new();
        let mut seen = HashSet::new();

        while seen.insert(current) {
            match self.parent_of(current) {
                Some(parent) => {
                    let index = self
                        .children_of(parent)
                        .iter()
                        .position(|&c| c == current)
                        .unwrap_or(0);
                    path.push(index as u32);
                    current = parent;
                }
                None => {
                    let index = self
                        .get(current)
                        .and_then(|r| r.scene.as_deref())
                        .and_then(|scene| {
                            self.scene_roots(scene).iter().position(|&r| r == current)
                        })
                        .unwrap_or(0);
                    path.push(index as u32);
                    break;
                }
            }
        }

        path.reverse();
        path
    }

    // ─── Scenes ─────────────────────────────────────────────────

    /// Scenes with at least one object, excluding the persistent pseudo-scene.
    pub fn scene_paths(&self) -> Vec<&str> {
        self.by_scene
            .keys()
            .map(String::as_str)
            .filter(|scene| *scene != DONT_DESTROY_ON_LOAD)
            .collect()
    }

    /// Every game object of a scene, in manifest order.
    pub fn scene_objects(&self, scene: &str) -> Vec<ObjectId> {
        self.by_scene
            .get(scene)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| self.get(id).is_some_and(|r| r.kind.is_game_object()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Everything living in a scene, components included.
    pub fn scene_members(&self, scene: &str) -> &[ObjectId] {
        self.by_scene.get(scene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scene_roots(&self, scene: &str) -> Vec<ObjectId> {
        self.scene_objects(scene)
            .into_iter()
            .filter(|id| !self.parents.contains_key(id))
            .collect()
    }

    // ─── Scripts & Animation ────────────────────────────────────

    /// All base classes and interfaces of a script.
    pub fn script_ancestors(&self, script: ObjectId) -> Vec<ObjectId> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([script]);
        let mut queue = vec![script];
        while let Some(current) = queue.pop() {
            if let Some(ObjectKind::Script { base_types, .. }) = self.get(current).map(|r| &r.kind)
            {
                for &base in base_types {
                    if seen.insert(base) {
                        ancestors.push(base);
                        queue.push(base);
                    }
                }
            }
        }
        ancestors
    }

    /// Clips a controller can play, through its layers, states and blend trees.
    pub fn controller_clips(&self, controller: ObjectId) -> Vec<ObjectId> {
        let mut clips = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![controller];

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(record) = self.get(current) else {
                continue;
            };
            match &record.kind {
                ObjectKind::AnimationClip { .. } => clips.push(current),
                ObjectKind::AnimatorController { layers } => {
                    stack.extend(layers.iter().rev().filter_map(|l| l.state_machine));
                }
                ObjectKind::AnimatorOverrideController { parent, clips: overrides } => {
                    stack.extend(overrides.iter().rev());
                    stack.extend(parent);
                }
                ObjectKind::AnimatorStateMachine {
                    child_machines,
                    states,
                    ..
                } => {
                    stack.extend(child_machines.iter().rev());
                    stack.extend(states.iter().rev());
                }
                ObjectKind::AnimatorState { motion, .. } => stack.extend(motion),
                ObjectKind::BlendTree { motions } => stack.extend(motions.iter().rev()),
                _ => {}
            }
        }

        clips
    }

    // ─── Search Targets ─────────────────────────────────────────

    /// Resolve a user-supplied target: an asset path, `path#SubName`, or a unique object name.
    pub fn resolve_target(&self, target: &str) -> Result<ObjectId> {
        if let Some((path, sub_name)) = target.split_once('#') {
            return self
                .objects_at(path)
                .iter()
                .copied()
                .find(|&id| self.get(id).is_some_and(|r| r.name == sub_name))
                .ok_or_else(|| RefGraphError::InvalidTarget(target.to_string()));
        }

        if let Some(main) = self.main_asset_at(target) {
            return Ok(main);
        }

        let mut matches = self.records.iter().filter(|r| r.name == target);
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record.id),
            (Some(_), Some(_)) => Err(RefGraphError::InvalidTarget(format!(
                "'{target}' matches more than one object, use an asset path"
            ))),
            _ => Err(RefGraphError::InvalidTarget(target.to_string())),
        }
    }

    /// Expand folders to the assets inside them and main assets to their sub-assets.
    pub fn expand_search_targets(&self, ids: &[ObjectId]) -> Result<Vec<SearchTarget>> {
        let mut targets = Vec::new();
        let mut seen = HashSet::new();

        for &id in ids {
            let record = self.get(id).ok_or(RefGraphError::UnknownObject(id))?;
            match &record.kind {
                ObjectKind::Folder => {
                    let folder = record.asset_path.as_deref().unwrap_or_default();
                    for asset in self.assets_under(folder) {
                        if self.get(asset).is_some_and(|r| {
                            !matches!(r.kind, ObjectKind::Folder | ObjectKind::SceneAsset)
                        }) {
                            self.push_target(asset, &mut seen, &mut targets);
                        }
                    }
                }
                _ => self.push_target(id, &mut seen, &mut targets),
            }
        }

        Ok(targets)
    }

    fn push_target(
        &self,
        id: ObjectId,
        seen: &mut HashSet<ObjectId>,
        targets: &mut Vec<SearchTarget>,
    ) {
        if !seen.insert(id) {
            return;
        }
        let sub_objects = if self.is_main_asset(id) {
            self.sub_objects(id)
                .into_iter()
                .filter(|&sub| seen.insert(sub))
                .collect()
        } else {
            Vec::new()
        };
        targets.push(SearchTarget {
            main: id,
            sub_objects,
        });
    }
}
