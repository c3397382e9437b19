//! Core types of the reference graph.
//!
//! Nodes live in a [`NodeArena`](super::NodeArena) and are addressed by
//! [`NodeId`]; links store a target id rather than a pointer, so cycles and
//! shared sub-trees need no special ownership handling.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::world::ObjectId;

/// Handle of a node inside its arena. Assigned in allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Usage classification of a node in the unused-objects report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsedState {
    /// Neither the object nor any of its sub-objects is used.
    Unused,
    /// Some sub-objects are used; they are not listed yet.
    MixedCollapsed,
    /// Some sub-objects are used and are listed as children.
    MixedExpanded,
    #[default]
    Used,
}

impl fmt::Display for UsedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsedState::Unused => write!(f, "unused"),
            UsedState::MixedCollapsed => write!(f, "mixed (collapsed)"),
            UsedState::MixedExpanded => write!(f, "mixed (expanded)"),
            UsedState::Used => write!(f, "used"),
        }
    }
}

/// The search domain a result group covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Assets,
    Scene,
    DontDestroyOnLoad,
    ProjectSettings,
    UnusedObjects,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::Assets => write!(f, "assets"),
            GroupType::Scene => write!(f, "scene"),
            GroupType::DontDestroyOnLoad => write!(f, "dont_destroy_on_load"),
            GroupType::ProjectSettings => write!(f, "project_settings"),
            GroupType::UnusedObjects => write!(f, "unused_objects"),
        }
    }
}

/// A directed edge, annotated with every place the reference was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: NodeId,
    pub descriptions: Vec<String>,
    /// Structural edge, kept only if it leads to a real reference.
    pub is_weak: bool,
}

/// One visited object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub(crate) object: Option<ObjectId>,
    pub(crate) label: Option<String>,
    pub(crate) links: Vec<Link>,
    pub(crate) used_state: UsedState,
    pub(crate) is_main_reference: bool,
}

impl Node {
    pub(crate) fn for_object(object: Option<ObjectId>) -> Self {
        Self {
            object,
            ..Self::default()
        }
    }

    /// Identity of the object this node stands for. `None` once the object is gone.
    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    /// "name (Type)". Empty until the node has been initialized.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    pub fn is_initialized(&self) -> bool {
        self.label.is_some()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_to(&self, target: NodeId) -> Option<&Link> {
        self.links.iter().find(|link| link.target == target)
    }

    pub fn used_state(&self) -> UsedState {
        self.used_state
    }

    pub fn is_main_reference(&self) -> bool {
        self.is_main_reference
    }
}

/// Named bucket of root nodes for one search domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultGroup {
    pub title: String,
    pub group_type: GroupType,
    /// Set for scene groups.
    pub scene_path: Option<String>,
    /// The scope was not searched yet (lazy scene search).
    pub pending_search: bool,
    pub roots: Vec<NodeId>,
}

impl ResultGroup {
    pub fn new(title: impl Into<String>, group_type: GroupType, scene_path: Option<String>) -> Self {
        Self {
            title: title.into(),
            group_type,
            scene_path,
            pending_search: false,
            roots: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
