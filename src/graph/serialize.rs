//! Flat, index-addressed form of result groups.
//!
//! Nodes are numbered in first-visit order starting from the group roots,
//! so a node shared by several parents is stored once and cycles need no
//! special encoding.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::arena::NodeArena;
use super::types::{GroupType, Link, Node, NodeId, ResultGroup, UsedState};
use crate::error::{RefGraphError, Result};
use crate::world::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub label: String,
    pub object: Option<ObjectId>,
    pub is_main_reference: bool,
    pub used_state: UsedState,
    /// Link targets as record indices. `link_descriptions` and
    /// `link_weak_states` run parallel to it.
    pub links: Vec<u32>,
    pub link_descriptions: Vec<Vec<String>>,
    pub link_weak_states: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedGroup {
    pub title: String,
    pub group_type: GroupType,
    pub scene_path: Option<String>,
    pub pending_search: bool,
    pub roots: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub nodes: Vec<SerializedNode>,
    pub groups: Vec<SerializedGroup>,
}

pub fn serialize(arena: &NodeArena, groups: &[ResultGroup]) -> SerializedGraph {
    let mut indexer = Indexer::default();
    let groups = groups
        .iter()
        .map(|group| SerializedGroup {
            title: group.title.clone(),
            group_type: group.group_type,
            scene_path: group.scene_path.clone(),
            pending_search: group.pending_search,
            roots: group.roots.iter().map(|&root| indexer.index_of(root)).collect(),
        })
        .collect();

    let mut nodes = Vec::new();
    let mut cursor = 0;
    while cursor < indexer.order.len() {
        let node = &arena[indexer.order[cursor]];
        cursor += 1;

        let links = node
            .links
            .iter()
            .map(|link| indexer.index_of(link.target))
            .collect();
        nodes.push(SerializedNode {
            label: node.label().to_string(),
            object: node.object,
            is_main_reference: node.is_main_reference,
            used_state: node.used_state,
            links,
            link_descriptions: node.links.iter().map(|l| l.descriptions.clone()).collect(),
            link_weak_states: node.links.iter().map(|l| l.is_weak).collect(),
        });
    }

    SerializedGraph { nodes, groups }
}

#[derive(Default)]
struct Indexer {
    indices: HashMap<NodeId, u32>,
    order: Vec<NodeId>,
}

impl Indexer {
    fn index_of(&mut self, node: NodeId) -> u32 {
        if let Some(&index) = self.indices.get(&node) {
            return index;
        }
        let index = self.order.len() as u32;
        self.indices.insert(node, index);
        self.order.push(node);
        index
    }
}

/// Rebuild a fresh arena and its groups. Record `i` becomes `NodeId(i)`.
pub fn deserialize(flat: &SerializedGraph) -> Result<(NodeArena, Vec<ResultGroup>)> {
    let count = flat.nodes.len();
    let resolve = |index: u32| -> Result<NodeId> {
        if (index as usize) < count {
            Ok(NodeId(index))
        } else {
            Err(RefGraphError::InvalidResult(format!(
                "node index {index} out of range ({count} nodes)"
            )))
        }
    };

    // Allocate every node first: links may point forward.
    let mut arena = NodeArena::new();
    for _ in 0..count {
        arena.alloc(None);
    }

    for (index, record) in flat.nodes.iter().enumerate() {
        if record.link_descriptions.len() != record.links.len()
            || record.link_weak_states.len() != record.links.len()
        {
            return Err(RefGraphError::InvalidResult(format!(
                "node {index} has mismatched link arrays"
            )));
        }

        let mut links = Vec::with_capacity(record.links.len());
        for ((&target, descriptions), &is_weak) in record
            .links
            .iter()
            .zip(&record.link_descriptions)
            .zip(&record.link_weak_states)
        {
            links.push(Link {
                target: resolve(target)?,
                descriptions: descriptions.clone(),
                is_weak,
            });
        }

        *arena.node_mut(NodeId(index as u32)) = Node {
            object: record.object,
            label: Some(record.label.clone()),
            links,
            used_state: record.used_state,
            is_main_reference: record.is_main_reference,
        };
    }

    let mut groups = Vec::with_capacity(flat.groups.len());
    for group in &flat.groups {
        groups.push(ResultGroup {
            title: group.title.clone(),
            group_type: group.group_type,
            scene_path: group.scene_path.clone(),
            pending_search: group.pending_search,
            roots: group
                .roots
                .iter()
                .map(|&root| resolve(root))
                .collect::<Result<_>>()?,
        });
    }

    Ok((arena, groups))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two roots in two groups sharing one child, plus a cycle back to a root.
    fn shared_graph() -> (NodeArena, Vec<ResultGroup>) {
        let mut arena = NodeArena::new();
        let _unreachable = arena.alloc(Some(ObjectId(99)));
        let r1 = arena.alloc(Some(ObjectId(1)));
        let r2 = arena.alloc(Some(ObjectId(2)));
        let shared = arena.alloc(Some(ObjectId(3)));
        arena.add_link(r1, shared, Some("Variable: b"), false);
        arena.add_link(r1, shared, Some("Variable: a"), false);
        arena.add_link(r2, shared, Some("Property: c"), true);
        arena.add_link(shared, r1, Some("Variable: back"), false);
        arena.node_mut(shared).used_state = UsedState::MixedCollapsed;
        arena.node_mut(r1).is_main_reference = true;
        for id in [r1, r2, shared] {
            arena.node_mut(id).label = Some(format!("node {}", id.index()));
        }

        let mut first = ResultGroup::new("Assets", GroupType::Assets, None);
        first.roots.push(r1);
        let mut second = ResultGroup::new("Main", GroupType::Scene, Some("Assets/Main.unity".into()));
        second.roots.push(r2);
        second.pending_search = true;
        (arena, vec![first, second])
    }

    #[test]
    fn test_shared_node_stored_once() {
        let (arena, groups) = shared_graph();
        let flat = serialize(&arena, &groups);

        assert_eq!(flat.nodes.len(), 3, "unreachable nodes dropped, shared node once");
        assert_eq!(flat.groups[0].roots, vec![0]);
        assert_eq!(flat.groups[1].roots, vec![1]);
        assert_eq!(flat.nodes[0].links, vec![2]);
        assert_eq!(flat.nodes[1].links, vec![2]);
        assert_eq!(flat.nodes[2].links, vec![0]);
    }

    #[test]
    fn test_round_trip_preserves_sharing_and_order() {
        let (arena, groups) = shared_graph();
        let flat = serialize(&arena, &groups);
        let (restored, restored_groups) = deserialize(&flat).unwrap();

        assert_eq!(restored.len(), 3);
        let r1 = restored_groups[0].roots[0];
        let r2 = restored_groups[1].roots[0];
        let via_r1 = restored[r1].links()[0].target;
        let via_r2 = restored[r2].links()[0].target;
        assert_eq!(via_r1, via_r2, "one instance for the shared node");

        assert_eq!(
            restored[r1].links()[0].descriptions,
            vec!["Variable: b", "Variable: a"],
            "description order preserved"
        );
        assert!(restored[r2].links()[0].is_weak);
        assert_eq!(restored[via_r1].used_state(), UsedState::MixedCollapsed);
        assert_eq!(restored[via_r1].links()[0].target, r1);
        assert!(restored[r1].is_main_reference());
        assert_eq!(restored[r1].label(), "node 1");
        assert!(restored_groups[1].pending_search);
        assert_eq!(restored_groups[1].scene_path.as_deref(), Some("Assets/Main.unity"));

        assert_eq!(serialize(&restored, &restored_groups), flat, "stable under re-serialization");
    }

    #[test]
    fn test_round_trip_through_bincode() {
        let (arena, groups) = shared_graph();
        let flat = serialize(&arena, &groups);
        let bytes = bincode::serialize(&flat).unwrap();
        let decoded: SerializedGraph = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, flat);
    }

    #[test]
    fn test_bad_indices_rejected() {
        let (arena, groups) = shared_graph();
        let mut flat = serialize(&arena, &groups);
        flat.nodes[0].links[0] = 17;
        assert!(deserialize(&flat).is_err());

        let mut flat = serialize(&arena, &groups);
        flat.nodes[0].link_weak_states.clear();
        assert!(deserialize(&flat).is_err());
    }
}
