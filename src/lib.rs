//! # refgraph
//!
//! Find what references your assets.
//!
//! refgraph crawls a game project's object graph looking for a set of
//! searched objects, then reverses what it found so each searched object
//! becomes a root with the chains of objects that reference it hanging off it.
//!
//! ## Key Features
//!
//! - **Cache-filtered**: a persistent dependency cache skips assets that cannot reach a searched object
//! - **Cycle safe**: shared and cyclic references are crawled once
//! - **Persistent**: results can be saved and reloaded
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refgraph::{ObjectWorld, ProjectDatabase, RefGraphConfig, SearchParameters, UsageDetector};
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let world = ObjectWorld::load(&root.join(".refgraph/objects.json"), Some(root))?;
//! let db = ProjectDatabase::new(&world);
//! let mut detector = UsageDetector::from_config(&RefGraphConfig::default(), &root.join(".refgraph"));
//!
//! let target = world.resolve_target("Assets/Textures/Icon.png")?;
//! let result = detector.run(&world, &db, SearchParameters::new(vec![target]))?;
//! print!("{}", result.render_tree(true));
//! # Ok::<(), refgraph::RefGraphError>(())
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod detector;
pub mod error;
pub mod graph;
pub mod storage;
pub mod world;

// Re-exports for convenience
pub use error::{RefGraphError, Result};

pub use cache::{AssetDatabase, CacheEntry, DependencyCache, LoadOutcome, ScanControl};
pub use config::{RefGraphConfig, SearchOptions};
pub use detector::{SearchParameters, UsageDetector};

// Graph re-exports
pub use graph::{
    GroupType, Link, Node, NodeArena, NodeId, ResultGroup, SearchResult, SerializedGraph, UsedState,
};
pub use world::{ObjectId, ObjectKind, ObjectRecord, ObjectWorld, ProjectDatabase};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{asset, game_object, scene_object};
    use crate::world::{Field, FieldValue};
    use std::collections::HashSet;

    const SCENE: &str = "Assets/Scenes/Level.unity";

    /// AssetX is a prefab with ComponentB. SceneObjectA holds a component
    /// whose `fieldFoo` points at AssetX.
    fn prefab_world() -> ObjectWorld {
        ObjectWorld::from_records(vec![
            asset(1, "AssetX", game_object(&[2], &[]), "Assets/AssetX.prefab"),
            ObjectRecord {
                sub_asset: true,
                ..asset(
                    2,
                    "AssetX",
                    ObjectKind::Component {
                        owner: ObjectId(1),
                        script: None,
                        class: Some("ComponentB".into()),
                    },
                    "Assets/AssetX.prefab",
                )
            },
            scene_object(10, "SceneObjectA", game_object(&[11], &[]), SCENE),
            ObjectRecord {
                fields: vec![Field::new("fieldFoo", FieldValue::Reference(ObjectId(1)))],
                ..scene_object(
                    11,
                    "SceneObjectA",
                    ObjectKind::Component {
                        owner: ObjectId(10),
                        script: None,
                        class: Some("Holder".into()),
                    },
                    SCENE,
                )
            },
        ])
        .unwrap()
    }

    fn search(world: &ObjectWorld, dir: &tempfile::TempDir) -> SearchResult {
        let db = ProjectDatabase::new(world);
        let mut detector = UsageDetector::new(
            DependencyCache::new(dir.path().join("deps.cache")),
            SearchOptions::default(),
        );
        detector
            .run(world, &db, SearchParameters::new(vec![ObjectId(1)]))
            .unwrap()
    }

    #[test]
    fn test_end_to_end_prefab_reference() {
        let dir = tempfile::tempdir().unwrap();
        let world = prefab_world();
        let result = search(&world, &dir);

        assert_eq!(result.groups().len(), 1, "the prefab itself references nothing");
        let group = &result.groups()[0];
        assert_eq!(group.group_type, GroupType::Scene);
        assert_eq!(group.roots.len(), 1);

        let root = result.node(group.roots[0]);
        assert_eq!(root.object(), Some(ObjectId(1)));
        assert_eq!(root.label(), "AssetX (GameObject)");
        assert_eq!(root.links().len(), 1, "no weak link to ComponentB survives");

        let link = &root.links()[0];
        assert_eq!(link.descriptions, vec!["Variable: fieldFoo".to_string()]);
        assert!(!link.is_weak);
        let holder = result.node(link.target);
        assert_eq!(holder.object(), Some(ObjectId(11)));
        assert!(holder.links().is_empty());
        assert_eq!(result.used_objects().len(), 1);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let world = prefab_world();
        let first = search(&world, &tempfile::tempdir().unwrap());

        let dir = tempfile::tempdir().unwrap();
        let second = search(&world, &dir);
        let third = search(&world, &dir);

        assert_eq!(first.to_serialized(), second.to_serialized());
        assert_eq!(second.to_serialized(), third.to_serialized(), "warm cache, same result");
        assert_eq!(first.render_tree(true), third.render_tree(true));
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let reference = |name: &str, target: u32| Field::new(name, FieldValue::Reference(ObjectId(target)));
        let world = ObjectWorld::from_records(vec![
            ObjectRecord {
                fields: vec![reference("partner", 2)],
                ..asset(1, "A", ObjectKind::Generic { class: None }, "Assets/A.asset")
            },
            ObjectRecord {
                fields: vec![reference("partner", 1)],
                ..asset(2, "B", ObjectKind::Generic { class: None }, "Assets/B.asset")
            },
        ])
        .unwrap();

        let candidates: HashSet<ObjectId> = [ObjectId(1)].into();
        let forward = crawler::search(
            &world,
            &[ObjectId(1), ObjectId(2)],
            &candidates,
            &SearchOptions::default(),
        );
        assert_eq!(forward.arena.len(), 2);

        let mut arena = NodeArena::new();
        let group = graph::reverse(
            &forward,
            &candidates,
            ResultGroup::new("Assets", GroupType::Assets, None),
            &mut arena,
            &world,
        );
        assert_eq!(group.roots.len(), 1);
        assert_eq!(arena.reachable(&group.roots).len(), 2);

        let root = &arena[group.roots[0]];
        assert_eq!(root.links().len(), 1);
        assert_eq!(root.links()[0].descriptions, vec!["Variable: partner".to_string()]);
    }
}
