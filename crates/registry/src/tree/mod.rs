//! Metadata Tree: arena-backed nodes, handles, paths, and the load session.
//!
//! Nodes live in a generation-scoped arena and refer to each other by [`NodeId`]. The
//! parent link is an index, so it is non-owning by construction; whole trees are dropped
//! together with their generation.

pub(crate) mod arena;
pub mod handle;
pub mod path;
pub mod session;
pub(crate) mod view;

#[cfg(test)]
mod tests;

pub use arena::{NodeId, NodeKind};
pub use handle::{ChildStream, NodeRef, WeakNodeRef};
pub use path::{NodePath, PathSegment};
pub use session::{ATTRIBUTE_KIND_ID, LoadSession};
pub use view::NodeView;
