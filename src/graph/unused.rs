//! The "unused objects" report: searched objects nothing referenced.

use std::collections::BTreeSet;

use super::arena::NodeArena;
use super::reverse::sort_graph;
use super::types::{GroupType, NodeId, ResultGroup, UsedState};
use crate::world::{ObjectId, ObjectWorld, SearchTarget};

pub const UNUSED_GROUP_TITLE: &str = "Unused Objects";

/// Build the report for `targets`, given every object found during the search.
/// Returns `None` when everything is used.
pub fn build_unused_group(
    world: &ObjectWorld,
    targets: &[SearchTarget],
    used: &BTreeSet<ObjectId>,
    arena: &mut NodeArena,
) -> Option<ResultGroup> {
    let mut group = ResultGroup::new(UNUSED_GROUP_TITLE, GroupType::UnusedObjects, None);

    for target in targets {
        let unused_subs: Vec<ObjectId> = target
            .sub_objects
            .iter()
            .copied()
            .filter(|sub| !used.contains(sub))
            .collect();
        let some_sub_used = unused_subs.len() < target.sub_objects.len();

        if used.contains(&target.main) {
            // The main object is used, list its unused sub-objects on their own.
            for sub in unused_subs {
                let node = unused_node(arena, sub);
                group.roots.push(node);
            }
            continue;
        }

        // A main object whose sub-objects are all used counts as used.
        if !target.sub_objects.is_empty() && unused_subs.is_empty() {
            continue;
        }

        let root = arena.alloc(Some(target.main));
        arena.node_mut(root).used_state = if some_sub_used {
            UsedState::MixedCollapsed
        } else {
            UsedState::Unused
        };
        for sub in unused_subs {
            let child = unused_node(arena, sub);
            arena.add_link(root, child, None, false);
        }
        group.roots.push(root);
    }

    if group.roots.is_empty() {
        return None;
    }

    sort_graph(arena, &mut group.roots, world);
    arena.initialize(&group.roots, world);
    Some(group)
}

fn unused_node(arena: &mut NodeArena, object: ObjectId) -> NodeId {
    let node = arena.alloc(Some(object));
    arena.node_mut(node).used_state = UsedState::Unused;
    node
}

/// List the used sub-objects of a partially used node.
///
/// Only acts on `MixedCollapsed` nodes, which then become `MixedExpanded`,
/// so repeated calls are no-ops. Returns whether anything changed.
pub fn show_used_children(
    arena: &mut NodeArena,
    world: &ObjectWorld,
    node: NodeId,
    used: &BTreeSet<ObjectId>,
) -> bool {
    if arena.get(node).map(|n| n.used_state) != Some(UsedState::MixedCollapsed) {
        return false;
    }
    let Some(main) = arena[node].object else {
        return false;
    };

    for sub in world.sub_objects(main) {
        if used.contains(&sub) {
            let child = arena.alloc(Some(sub));
            arena.add_link(node, child, None, false);
        }
    }
    arena.node_mut(node).used_state = UsedState::MixedExpanded;

    let mut roots = [node];
    sort_graph(arena, &mut roots, world);
    arena.initialize(&roots, world);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::asset;
    use crate::world::{ObjectKind, ObjectRecord};

    fn world() -> ObjectWorld {
        let sub = |id, name: &str, path: &str| ObjectRecord {
            sub_asset: true,
            ..asset(id, name, ObjectKind::Sprite, path)
        };
        ObjectWorld::from_records(vec![
            asset(1, "Sheet", ObjectKind::Texture, "Assets/Sheet.png"),
            sub(2, "Sheet_0", "Assets/Sheet.png"),
            sub(3, "Sheet_1", "Assets/Sheet.png"),
            asset(4, "Lonely", ObjectKind::Texture, "Assets/Lonely.png"),
            asset(5, "Busy", ObjectKind::Texture, "Assets/Busy.png"),
            asset(6, "Pair", ObjectKind::Texture, "Assets/Pair.png"),
            sub(7, "Pair_0", "Assets/Pair.png"),
        ])
        .unwrap()
    }

    fn used(ids: &[u32]) -> BTreeSet<ObjectId> {
        ids.iter().map(|&id| ObjectId(id)).collect()
    }

    fn targets(world: &ObjectWorld) -> Vec<SearchTarget> {
        world
            .expand_search_targets(&[ObjectId(1), ObjectId(4), ObjectId(5), ObjectId(6)])
            .unwrap()
    }

    #[test]
    fn test_unused_report() {
        let world = world();
        let mut arena = NodeArena::new();
        let group =
            build_unused_group(&world, &targets(&world), &used(&[2, 5, 7]), &mut arena).unwrap();

        let labels: Vec<_> = group.roots.iter().map(|&r| arena[r].label().to_string()).collect();
        assert_eq!(labels, vec!["Lonely (Texture)", "Sheet (Texture)"], "Pair counts as used");

        let sheet = group.roots[1];
        assert_eq!(arena[sheet].used_state(), UsedState::MixedCollapsed);
        assert_eq!(arena[sheet].links().len(), 1);
        assert_eq!(arena[arena[sheet].links()[0].target].object(), Some(ObjectId(3)));
        assert_eq!(arena[group.roots[0]].used_state(), UsedState::Unused);
    }

    #[test]
    fn test_everything_used_gives_no_group() {
        let world = world();
        let mut arena = NodeArena::new();
        let all = used(&[1, 2, 3, 4, 5, 6, 7]);
        assert!(build_unused_group(&world, &targets(&world), &all, &mut arena).is_none());
    }

    #[test]
    fn test_show_used_children_is_idempotent() {
        let world = world();
        let usage = used(&[2, 5, 7]);
        let mut arena = NodeArena::new();
        let group = build_unused_group(&world, &targets(&world), &usage, &mut arena).unwrap();
        let sheet = group.roots[1];

        assert!(show_used_children(&mut arena, &world, sheet, &usage));
        assert_eq!(arena[sheet].used_state(), UsedState::MixedExpanded);
        let children: Vec<_> = arena[sheet]
            .links()
            .iter()
            .map(|l| (arena[l.target].object(), arena[l.target].used_state()))
            .collect();
        assert_eq!(
            children,
            vec![
                (Some(ObjectId(2)), UsedState::Used),
                (Some(ObjectId(3)), UsedState::Unused),
            ]
        );

        let before = arena.clone();
        assert!(!show_used_children(&mut arena, &world, sheet, &usage));
        assert_eq!(arena, before);
        assert!(!show_used_children(&mut arena, &world, group.roots[0], &usage));
    }
}
