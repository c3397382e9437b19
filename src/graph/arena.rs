//! Node allocator.
//!
//! Every search run owns its arenas explicitly; node ids are only meaningful
//! in the arena that allocated them.

use std::collections::{HashMap, HashSet};
use std::ops::Index;

use super::types::{Link, Node, NodeId};
use crate::world::{ObjectId, ObjectWorld, DESTROYED_LABEL};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, object: Option<ObjectId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::for_object(object));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    // ─── Links ──────────────────────────────────────────────────

    /// Link `from` to `to`. A second link between the same pair merges into the
    /// first: the description is appended if new, and the link stays weak only
    /// if both were weak. Self links are ignored.
    pub fn add_link(&mut self, from: NodeId, to: NodeId, description: Option<&str>, is_weak: bool) {
        let descriptions = description
            .filter(|d| !d.is_empty())
            .map(|d| vec![d.to_string()])
            .unwrap_or_default();
        self.add_link_with_descriptions(from, to, &descriptions, is_weak);
    }

    pub fn add_link_with_descriptions(
        &mut self,
        from: NodeId,
        to: NodeId,
        descriptions: &[String],
        is_weak: bool,
    ) {
        if from == to {
            return;
        }

        let node = self.node_mut(from);
        if let Some(link) = node.links.iter_mut().find(|link| link.target == to) {
            for description in descriptions {
                if !link.descriptions.contains(description) {
                    link.descriptions.push(description.clone());
                }
            }
            link.is_weak &= is_weak;
            return;
        }

        node.links.push(Link {
            target: to,
            descriptions: descriptions.to_vec(),
            is_weak,
        });
    }

    pub fn remove_link(&mut self, from: NodeId, index: usize) -> Link {
        self.node_mut(from).links.remove(index)
    }

    /// Remove the link from `from` to `to`, if any.
    pub fn remove_link_to(&mut self, from: NodeId, to: NodeId) -> bool {
        let links = &mut self.node_mut(from).links;
        match links.iter().position(|link| link.target == to) {
            Some(index) => {
                links.remove(index);
                true
            }
            None => false,
        }
    }

    // ─── Traversal ──────────────────────────────────────────────

    /// Every node reachable from `roots`, roots included, in first-visit order.
    pub fn reachable(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self[id].links.iter().rev().map(|link| link.target));
        }

        order
    }

    /// Compute labels for every node reachable from `roots`. Nodes whose
    /// object no longer exists lose their identity and get the destroyed
    /// label. Already initialized nodes are left alone.
    pub fn initialize(&mut self, roots: &[NodeId], world: &ObjectWorld) {
        for id in self.reachable(roots) {
            let node = self.node_mut(id);
            if node.label.is_some() {
                continue;
            }
            match node.object.filter(|&object| world.contains(object)) {
                Some(object) => node.label = Some(world.label(object)),
                None => {
                    node.object = None;
                    node.label = Some(DESTROYED_LABEL.to_string());
                }
            }
        }
    }

    /// Copy the sub-graph reachable from `roots` in `other` into this arena.
    /// Returns the new ids of `roots`.
    pub fn graft(&mut self, other: &NodeArena, roots: &[NodeId]) -> Vec<NodeId> {
        let order = other.reachable(roots);
        let mut mapping = HashMap::with_capacity(order.len());
        for &old in &order {
            let new = self.alloc(None);
            mapping.insert(old, new);
        }

        for &old in &order {
            let source = &other[old];
            let copy = Node {
                object: source.object,
                label: source.label.clone(),
                links: source
                    .links
                    .iter()
                    .map(|link| Link {
                        target: mapping[&link.target],
                        descriptions: link.descriptions.clone(),
                        is_weak: link.is_weak,
                    })
                    .collect(),
                used_state: source.used_state,
                is_main_reference: source.is_main_reference,
            };
            *self.node_mut(mapping[&old]) = copy;
        }

        roots.iter().map(|root| mapping[root]).collect()
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
