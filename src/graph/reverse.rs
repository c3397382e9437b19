//! Turns a forward crawl graph into a result group.
//!
//! The crawl produces edges pointing from referencing objects to what they
//! reference. Results are presented the other way round: each searched
//! object is a root, with the chains of objects that reference it hanging
//! off it.

use std::collections::{HashMap, HashSet};

use super::arena::NodeArena;
use super::sort::SortKey;
use super::types::{GroupType, NodeId, ResultGroup};
use super::ForwardGraph;
use crate::world::{ObjectId, ObjectWorld, DONT_DESTROY_ON_LOAD};

const PROJECT_SETTINGS_PREFIX: &str = "ProjectSettings/";

/// Reverse `forward` into `arena` and fill `group` with the searched objects
/// that ended up with at least one reference.
pub fn reverse(
    forward: &ForwardGraph,
    root_set: &HashSet<ObjectId>,
    mut group: ResultGroup,
    arena: &mut NodeArena,
    world: &ObjectWorld,
) -> ResultGroup {
    let mut reverser = Reverser {
        forward: &forward.arena,
        root_set,
        world,
        group_type: group.group_type,
        scene_path: group.scene_path.as_deref(),
        out: arena,
        memo: HashMap::new(),
        roots: Vec::new(),
    };
    for &root in &forward.roots {
        reverser.reverse_node(root);
    }
    let mut roots = reverser.roots;

    prune_weak_links(arena, &roots);
    drop_links_to_root_owners(arena, &roots, world);
    roots.retain(|&root| !arena[root].links.is_empty());
    sort_graph(arena, &mut roots, world);
    arena.initialize(&roots, world);

    group.roots = roots;
    group
}

struct Reverser<'a> {
    forward: &'a NodeArena,
    root_set: &'a HashSet<ObjectId>,
    world: &'a ObjectWorld,
    group_type: GroupType,
    scene_path: Option<&'a str>,
    out: &'a mut NodeArena,
    /// Forward node -> reversed node.
    memo: HashMap<NodeId, NodeId>,
    roots: Vec<NodeId>,
}

impl Reverser<'_> {
    fn reverse_node(&mut self, forward_id: NodeId) -> NodeId {
        if let Some(&reversed) = self.memo.get(&forward_id) {
            return reversed;
        }

        let forward = self.forward;
        let node = &forward[forward_id];
        let reversed = self.out.alloc(node.object);
        self.memo.insert(forward_id, reversed);

        if let Some(object) = node.object {
            if self.root_set.contains(&object) {
                self.roots.push(reversed);
            }
            let is_main = self.is_main_reference(object);
            self.out.node_mut(reversed).is_main_reference = is_main;
        }

        // Roots recurse like any other node: a searched object may itself
        // reference another searched object.
        for link in &node.links {
            let target = self.reverse_node(link.target);
            self.out
                .add_link_with_descriptions(target, reversed, &link.descriptions, link.is_weak);
        }

        reversed
    }

    fn is_main_reference(&self, object: ObjectId) -> bool {
        let world = self.world;
        match self.group_type {
            GroupType::Assets => {
                let owner = world.preferably_game_object(object);
                world.get(owner).is_some_and(|record| {
                    record.is_asset() && (record.kind.is_game_object() || !record.hidden)
                })
            }
            GroupType::ProjectSettings => world
                .get(object)
                .and_then(|record| record.asset_path.as_deref())
                .is_some_and(|path| path.starts_with(PROJECT_SETTINGS_PREFIX)),
            GroupType::Scene => world.get(object).is_some_and(|record| {
                record.kind.is_game_object()
                    && record.scene.is_some()
                    && record.scene.as_deref() == self.scene_path
            }),
            GroupType::DontDestroyOnLoad => world.get(object).is_some_and(|record| {
                record.kind.is_game_object() && record.scene.as_deref() == Some(DONT_DESTROY_ON_LOAD)
            }),
            GroupType::UnusedObjects => false,
        }
    }
}

// ─── Weak Link Pruning ──────────────────────────────────────────

/// Remove weak links that do not lead to any real reference.
pub fn prune_weak_links(arena: &mut NodeArena, roots: &[NodeId]) {
    let mut visited = HashSet::new();
    for &root in roots.iter().rev() {
        remove_redundant_links(arena, root, &mut visited);
    }
}

fn remove_redundant_links(arena: &mut NodeArena, node: NodeId, visited: &mut HashSet<NodeId>) {
    if !visited.insert(node) {
        return;
    }

    let mut path = Vec::new();
    for index in (0..arena[node].links.len()).rev() {
        let link = &arena[node].links[index];
        if !link.is_weak {
            continue;
        }
        let target = link.target;
        path.clear();
        if arena[target].links.is_empty() || !reaches_strong_link(arena, target, &mut path) {
            arena.remove_link(node, index);
        }
    }

    let targets: Vec<NodeId> = arena[node].links.iter().map(|link| link.target).collect();
    for target in targets {
        remove_redundant_links(arena, target, visited);
    }
}

/// Depth-first search for a non-weak link below `node`. `path` holds the
/// nodes on the current search path.
fn reaches_strong_link(arena: &NodeArena, node: NodeId, path: &mut Vec<NodeId>) -> bool {
    let links = &arena[node].links;
    if links.is_empty() || path.contains(&node) {
        return false;
    }
    if links.iter().any(|link| !link.is_weak) {
        return true;
    }

    path.push(node);
    let found = links
        .iter()
        .any(|link| reaches_strong_link(arena, link.target, path));
    path.pop();
    found
}

// ─── Post-processing ────────────────────────────────────────────

/// A component root linking back to its game object, while that game object
/// is a root too, would only repeat the game object's own entry.
fn drop_links_to_root_owners(arena: &mut NodeArena, roots: &[NodeId], world: &ObjectWorld) {
    let root_game_objects: HashSet<ObjectId> = roots
        .iter()
        .filter_map(|&root| arena[root].object)
        .filter(|&object| world.get(object).is_some_and(|r| r.kind.is_game_object()))
        .collect();

    for &root in roots {
        let Some(owner) = arena[root].object.and_then(|object| world.owner_of(object)) else {
            continue;
        };
        if !root_game_objects.contains(&owner) {
            continue;
        }
        let owner_link = arena[root]
            .links
            .iter()
            .map(|link| link.target)
            .find(|&target| arena[target].object == Some(owner));
        if let Some(target) = owner_link {
            arena.remove_link_to(root, target);
        }
    }
}

/// Sort `roots` and the links of every node below them by [`SortKey`].
pub(crate) fn sort_graph(arena: &mut NodeArena, roots: &mut [NodeId], world: &ObjectWorld) {
    roots.sort_by_cached_key(|&root| SortKey::of(arena[root].object, world));

    for id in arena.reachable(roots) {
        let mut links = std::mem::take(&mut arena.node_mut(id).links);
        links.sort_by_cached_key(|link| SortKey::of(arena[link.target].object, world));
        arena.node_mut(id).links = links;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{asset, game_object, record, scene_object};
    use crate::world::{ObjectKind, ObjectRecord};

    const SCENE: &str = "Assets/Main.unity";

    fn component(id: u32, name: &str, owner: u32) -> ObjectRecord {
        scene_object(
            id,
            name,
            ObjectKind::Component {
                owner: ObjectId(owner),
                script: None,
                class: Some("Holder".into()),
            },
            SCENE,
        )
    }

    /// Forward graph built by hand: one node per object id.
    struct Forward {
        graph: ForwardGraph,
        nodes: HashMap<u32, NodeId>,
    }

    impl Forward {
        fn new() -> Self {
            Self {
                graph: ForwardGraph::default(),
                nodes: HashMap::new(),
            }
        }

        fn node(&mut self, object: u32) -> NodeId {
            if let Some(&id) = self.nodes.get(&object) {
                return id;
            }
            let id = self.graph.arena.alloc(Some(ObjectId(object)));
            self.nodes.insert(object, id);
            id
        }

        fn link(&mut self, from: u32, to: u32, description: Option<&str>, weak: bool) {
            let (from, to) = (self.node(from), self.node(to));
            self.graph.arena.add_link(from, to, description, weak);
        }

        fn root(&mut self, object: u32) {
            let id = self.node(object);
            self.graph.roots.push(id);
        }
    }

    fn set(ids: &[u32]) -> HashSet<ObjectId> {
        ids.iter().map(|&id| ObjectId(id)).collect()
    }

    fn scene_group() -> ResultGroup {
        ResultGroup::new(SCENE, GroupType::Scene, Some(SCENE.to_string()))
    }

    #[test]
    fn test_weak_chain_to_nothing_is_pruned() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(None);
        let x = arena.alloc(None);
        let y = arena.alloc(None);
        arena.add_link(root, x, None, true);
        arena.add_link(x, y, None, true);

        prune_weak_links(&mut arena, &[root]);
        assert!(arena.reachable(&[root]) == vec![root], "root reaches neither X nor Y");
    }

    #[test]
    fn test_weak_link_to_strong_reference_survives() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(None);
        let x = arena.alloc(None);
        let y = arena.alloc(None);
        arena.add_link(root, x, None, true);
        arena.add_link(x, y, Some("Variable: v"), false);

        prune_weak_links(&mut arena, &[root]);
        assert_eq!(arena[root].links().len(), 1);
        assert_eq!(arena[x].links().len(), 1);
    }

    #[test]
    fn test_weak_cycle_without_strong_links_is_pruned() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(None);
        let x = arena.alloc(None);
        let y = arena.alloc(None);
        arena.add_link(root, x, None, true);
        arena.add_link(x, y, None, true);
        arena.add_link(y, x, None, true);

        prune_weak_links(&mut arena, &[root]);
        assert!(arena[root].links().is_empty());
    }

    #[test]
    fn test_reverse_structural_link_pruned() {
        let world = ObjectWorld::from_records(vec![
            asset(1, "Wood", ObjectKind::Texture, "Assets/Wood.png"),
            scene_object(2, "Crate", game_object(&[3], &[]), SCENE),
            component(3, "Holder", 2),
        ])
        .unwrap();

        let mut forward = Forward::new();
        forward.link(2, 3, None, true);
        forward.link(3, 1, Some("Variable: tex"), false);
        forward.root(2);

        let mut arena = NodeArena::new();
        let group = reverse(&forward.graph, &set(&[1]), scene_group(), &mut arena, &world);

        assert_eq!(group.roots.len(), 1);
        let root = &arena[group.roots[0]];
        assert_eq!(root.object(), Some(ObjectId(1)));
        assert_eq!(root.label(), "Wood (Texture)");
        assert_eq!(root.links().len(), 1);

        let holder = &arena[root.links()[0].target];
        assert_eq!(root.links()[0].descriptions, vec!["Variable: tex"]);
        assert_eq!(holder.object(), Some(ObjectId(3)));
        assert!(
            holder.links().is_empty(),
            "the game object only contains the holder and is pruned"
        );
    }

    #[test]
    fn test_reverse_shares_nodes_and_drops_unreferenced_roots() {
        let world = ObjectWorld::from_records(vec![
            asset(1, "Wood", ObjectKind::Texture, "Assets/Wood.png"),
            asset(4, "Stone", ObjectKind::Texture, "Assets/Stone.png"),
            scene_object(10, "B", game_object(&[], &[]), SCENE),
            scene_object(11, "A", game_object(&[], &[]), SCENE),
            record(12, "Shared", ObjectKind::Generic { class: None }),
        ])
        .unwrap();

        let mut forward = Forward::new();
        forward.link(10, 12, Some("Variable: s"), false);
        forward.link(11, 12, Some("Variable: s"), false);
        forward.link(12, 1, Some("Variable: tex"), false);
        forward.root(10);
        forward.root(11);
        forward.root(4);

        let mut arena = NodeArena::new();
        let group = reverse(&forward.graph, &set(&[1, 4]), scene_group(), &mut arena, &world);

        assert_eq!(group.roots.len(), 1, "Stone has no references");
        let shared = arena[group.roots[0]].links()[0].target;
        let referrers: Vec<_> = arena[shared]
            .links()
            .iter()
            .map(|link| arena[link.target].object())
            .collect();
        assert_eq!(
            referrers,
            vec![Some(ObjectId(10)), Some(ObjectId(11))],
            "links sorted by hierarchy order"
        );
        assert!(arena[arena[shared].links()[0].target].is_main_reference());
    }

    #[test]
    fn test_component_root_drops_link_to_root_game_object() {
        let world = ObjectWorld::from_records(vec![
            scene_object(1, "Player", game_object(&[2], &[]), SCENE),
            component(2, "Health", 1),
            scene_object(3, "Spawner", game_object(&[], &[]), SCENE),
            scene_object(4, "Ui", game_object(&[], &[]), SCENE),
        ])
        .unwrap();

        let mut forward = Forward::new();
        forward.link(1, 2, None, true);
        forward.link(3, 1, Some("Variable: player"), false);
        forward.link(4, 2, Some("Variable: health"), false);
        forward.root(1);
        forward.root(3);
        forward.root(4);

        let mut arena = NodeArena::new();
        let group = reverse(&forward.graph, &set(&[1, 2]), scene_group(), &mut arena, &world);

        assert_eq!(group.roots.len(), 2);
        let health = group
            .roots
            .iter()
            .find(|&&root| arena[root].object() == Some(ObjectId(2)))
            .copied()
            .unwrap();
        let targets: Vec<_> = arena[health]
            .links()
            .iter()
            .map(|link| arena[link.target].object())
            .collect();
        assert_eq!(targets, vec![Some(ObjectId(4))]);
    }

    #[test]
    fn test_reverse_cycle_is_finite() {
        let world = ObjectWorld::from_records(vec![
            record(1, "A", ObjectKind::Generic { class: None }),
            record(2, "B", ObjectKind::Generic { class: None }),
        ])
        .unwrap();

        let mut forward = Forward::new();
        forward.link(1, 2, Some("Variable: b"), false);
        forward.link(2, 1, Some("Variable: a"), false);
        forward.root(1);

        let mut arena = NodeArena::new();
        let group = reverse(
            &forward.graph,
            &set(&[1]),
            ResultGroup::new("Assets", GroupType::Assets, None),
            &mut arena,
            &world,
        );

        assert_eq!(group.roots.len(), 1);
        assert_eq!(arena.len(), 2, "one reversed node per forward node");
        let b = arena[group.roots[0]].links()[0].target;
        assert_eq!(arena[b].links()[0].target, group.roots[0]);
    }
}
