//! The outcome of a search run and the operations offered on it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

use super::arena::NodeArena;
use super::serialize::{self, SerializedGraph};
use super::types::{GroupType, Link, Node, NodeId, ResultGroup, UsedState};
use super::unused;
use crate::detector::SearchParameters;
use crate::error::{RefGraphError, Result};
use crate::storage;
use crate::world::{ObjectId, ObjectWorld};

const RESULT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub(crate) arena: NodeArena,
    pub(crate) groups: Vec<ResultGroup>,
    pub(crate) used_objects: BTreeSet<ObjectId>,
    pub(crate) parameters: SearchParameters,
    pub(crate) completed: bool,
}

impl SearchResult {
    pub fn new(parameters: SearchParameters) -> Self {
        Self {
            arena: NodeArena::new(),
            groups: Vec::new(),
            used_objects: BTreeSet::new(),
            parameters,
            completed: false,
        }
    }

    pub fn groups(&self) -> &[ResultGroup] {
        &self.groups
    }

    pub fn group(&self, group_type: GroupType) -> Option<&ResultGroup> {
        self.groups.iter().find(|g| g.group_type == group_type)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.arena[id]
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn used_objects(&self) -> &BTreeSet<ObjectId> {
        &self.used_objects
    }

    pub fn parameters(&self) -> &SearchParameters {
        &self.parameters
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Number of nodes reachable from any group.
    pub fn node_count(&self) -> usize {
        let roots: Vec<NodeId> = self.groups.iter().flat_map(|g| g.roots.iter().copied()).collect();
        self.arena.reachable(&roots).len()
    }

    // ─── Editing ────────────────────────────────────────────────

    pub fn remove_group(&mut self, index: usize) -> Option<ResultGroup> {
        (index < self.groups.len()).then(|| self.groups.remove(index))
    }

    /// Hide nodes from the result: links into them are dropped, roots that
    /// are hidden or lose all their links disappear.
    pub fn hide_nodes(&mut self, hidden: &[NodeId]) {
        let hidden: HashSet<NodeId> = hidden.iter().copied().collect();
        let roots: Vec<NodeId> = self.groups.iter().flat_map(|g| g.roots.iter().copied()).collect();

        for id in self.arena.reachable(&roots) {
            self.arena
                .node_mut(id)
                .links
                .retain(|link| !hidden.contains(&link.target));
        }

        let arena = &self.arena;
        for group in &mut self.groups {
            let keep_leaves = group.group_type == GroupType::UnusedObjects;
            group.roots.retain(|root| {
                !hidden.contains(root) && (keep_leaves || !arena[*root].links.is_empty())
            });
        }
    }

    /// A new result holding only `node` and what hangs below it.
    pub fn isolate(&self, node: NodeId) -> Result<SearchResult> {
        let source = self
            .arena
            .get(node)
            .ok_or_else(|| RefGraphError::InvalidResult(format!("no node {node}")))?;
        let group_type = self
            .groups
            .iter()
            .find(|g| self.arena.reachable(&g.roots).contains(&node))
            .map(|g| g.group_type)
            .unwrap_or(GroupType::Assets);

        let mut isolated = SearchResult::new(self.parameters.clone());
        let roots = isolated.arena.graft(&self.arena, &[node]);
        let mut group = ResultGroup::new(source.label(), group_type, None);
        group.roots = roots;
        isolated.groups.push(group);
        isolated.used_objects = self.used_objects.clone();
        isolated.completed = self.completed;
        Ok(isolated)
    }

    /// Expand a partially used node of the unused-objects report.
    pub fn show_used_children(&mut self, world: &ObjectWorld, node: NodeId) -> bool {
        unused::show_used_children(&mut self.arena, world, node, &self.used_objects)
    }

    /// Swap in a group built in another arena, keeping its position.
    pub(crate) fn replace_group(&mut self, index: usize, arena: &NodeArena, group: ResultGroup) {
        let roots = self.arena.graft(arena, &group.roots);
        let group = ResultGroup { roots, ..group };
        match self.groups.get_mut(index) {
            Some(slot) => *slot = group,
            None => self.groups.push(group),
        }
    }

    /// Recompute the used objects from the roots of every searched group.
    pub(crate) fn refresh_used_objects(&mut self) {
        self.used_objects = used_objects(&self.arena, &self.groups);
    }

    /// Copy what the groups still reach into a fresh arena, dropping nodes
    /// left behind by replaced or removed groups.
    pub(crate) fn compact(&mut self) {
        let roots: Vec<NodeId> = self.groups.iter().flat_map(|g| g.roots.iter().copied()).collect();
        let mut arena = NodeArena::new();
        let mapped = arena.graft(&self.arena, &roots);
        let slots = self.groups.iter_mut().flat_map(|g| g.roots.iter_mut());
        for (slot, id) in slots.zip(mapped) {
            *slot = id;
        }
        debug!(before = self.arena.len(), after = arena.len(), "compacted result arena");
        self.arena = arena;
    }

    // ─── Export ─────────────────────────────────────────────────

    /// Plain-text tree of every group. Cycles are cut; with
    /// `hide_duplicate_rows` a sub-tree is printed in full only once per group.
    pub fn render_tree(&self, hide_duplicate_rows: bool) -> String {
        let mut out = String::new();
        for group in &self.groups {
            let _ = writeln!(out, "== {} ({}) ==", group.title, group.group_type);
            if group.pending_search {
                let _ = writeln!(out, "  (not searched yet)");
                continue;
            }
            let mut expanded = HashSet::new();
            let mut path = Vec::new();
            for &root in &group.roots {
                self.render_node(&mut out, root, None, 1, &mut path, &mut expanded, hide_duplicate_rows);
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn render_node(
        &self,
        out: &mut String,
        id: NodeId,
        via: Option<&Link>,
        depth: usize,
        path: &mut Vec<NodeId>,
        expanded: &mut HashSet<NodeId>,
        hide_duplicate_rows: bool,
    ) {
        let node = &self.arena[id];
        let mut line = "  ".repeat(depth);
        if let Some(link) = via.filter(|l| !l.descriptions.is_empty()) {
            let _ = write!(line, "[{}] ", link.descriptions.join("] ["));
        }
        line.push_str(node.label());
        match node.used_state {
            UsedState::Unused => line.push_str(" (unused)"),
            UsedState::MixedCollapsed | UsedState::MixedExpanded => line.push_str(" (partially used)"),
            UsedState::Used => {}
        }

        if path.contains(&id) {
            let _ = writeln!(out, "{line} (cycle)");
            return;
        }
        if hide_duplicate_rows && !node.links.is_empty() && !expanded.insert(id) {
            let _ = writeln!(out, "{line} ...");
            return;
        }
        let _ = writeln!(out, "{line}");

        path.push(id);
        for link in &node.links {
            self.render_node(out, link.target, Some(link), depth + 1, path, expanded, hide_duplicate_rows);
        }
        path.pop();
    }

    // ─── Persistence ────────────────────────────────────────────

    pub fn to_serialized(&self) -> SerializedGraph {
        serialize::serialize(&self.arena, &self.groups)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let stored = StoredResult {
            version: RESULT_FORMAT_VERSION,
            parameters: self.parameters.clone(),
            used_objects: self.used_objects.iter().copied().collect(),
            completed: self.completed,
            graph: self.to_serialized(),
        };
        let bytes = bincode::serialize(&stored)?;
        storage::write_atomic(path, &bytes)?;
        debug!(path = %path.display(), nodes = stored.graph.nodes.len(), "saved search result");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let stored: StoredResult = bincode::deserialize(&bytes)?;
        if stored.version != RESULT_FORMAT_VERSION {
            return Err(RefGraphError::InvalidResult(format!(
                "unsupported result version {}",
                stored.version
            )));
        }
        let (arena, groups) = serialize::deserialize(&stored.graph)?;
        Ok(Self {
            arena,
            groups,
            used_objects: stored.used_objects.into_iter().collect(),
            parameters: stored.parameters,
            completed: stored.completed,
        })
    }
}

/// Objects left as roots of searched groups. The unused-objects report and
/// groups still waiting for a lazy search contribute nothing.
pub(crate) fn used_objects(arena: &NodeArena, groups: &[ResultGroup]) -> BTreeSet<ObjectId> {
    groups
        .iter()
        .filter(|g| g.group_type != GroupType::UnusedObjects && !g.pending_search)
        .flat_map(|g| g.roots.iter().filter_map(|&root| arena[root].object()))
        .collect()
}

#[derive(Serialize, Deserialize)]
struct StoredResult {
    version: u32,
    parameters: SearchParameters,
    used_objects: Vec<ObjectId>,
    completed: bool,
    graph: SerializedGraph,
}
