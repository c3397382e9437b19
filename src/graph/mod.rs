//! Reference graph: nodes, links, result groups and their transformations.

pub mod arena;
pub mod result;
pub mod reverse;
pub mod serialize;
pub mod sort;
pub mod types;
pub mod unused;

pub use arena::NodeArena;
pub use result::SearchResult;
pub use reverse::{prune_weak_links, reverse};
pub use serialize::{deserialize, serialize, SerializedGraph};
pub use types::*;

/// What a crawl produces: nodes linked from referencing object to referenced object.
#[derive(Debug, Default)]
pub struct ForwardGraph {
    pub arena: NodeArena,
    /// Nodes of the objects the crawl started from.
    pub roots: Vec<NodeId>,
}
