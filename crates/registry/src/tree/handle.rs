//! Owning and non-owning node handles, and the lazy child stream.

use std::fmt;
use std::sync::{Arc, Weak};

use super::arena::{Arena, NodeId};
use super::path::NodePath;
use super::view::NodeView;
use crate::constraints::NodeMatcher;
use crate::core::{TypeKey, Value};
use crate::lifecycle::Generation;

/// A node pinned together with the generation that owns it.
///
/// Holding a `NodeRef` keeps the whole generation alive, so it stays valid across any
/// number of update swaps.
#[derive(Clone)]
pub struct NodeRef {
	generation: Arc<Generation>,
	id: NodeId,
}

impl NodeRef {
	/// Returns `None` if `id` does not belong to `generation`.
	pub fn new(generation: Arc<Generation>, id: NodeId) -> Option<Self> {
		generation.node(id)?;
		Some(Self { generation, id })
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	pub fn generation(&self) -> &Arc<Generation> {
		&self.generation
	}

	pub fn view(&self) -> Option<NodeView<'_>> {
		self.generation.node(self.id)
	}

	pub fn key(&self) -> Option<&TypeKey> {
		self.view().map(|v| v.key())
	}

	pub fn name(&self) -> Option<&str> {
		self.view().map(|v| v.name())
	}

	pub fn path(&self) -> NodePath {
		self.generation.path(self.id)
	}

	pub fn parent(&self) -> Option<NodeRef> {
		let parent = self.view()?.parent()?.id()?;
		Some(Self {
			generation: self.generation.clone(),
			id: parent,
		})
	}

	pub fn child(&self, name: &str) -> Option<NodeRef> {
		let id = self.generation.find_child_by_name(self.id, name)?;
		Some(Self {
			generation: self.generation.clone(),
			id,
		})
	}

	pub fn attribute(&self, name: &str) -> Option<&Value> {
		self.generation.get_attribute_value(self.id, name)
	}

	pub fn resolve_attribute(&self, name: &str) -> Option<Value> {
		self.generation.resolve_attribute_value(self.id, name)
	}

	pub fn downgrade(&self) -> WeakNodeRef {
		WeakNodeRef {
			generation: Arc::downgrade(&self.generation),
			id: self.id,
		}
	}
}

impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.generation, &other.generation) && self.id == other.id
	}
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeRef")
			.field("generation", &self.generation.id())
			.field("id", &self.id)
			.field("path", &self.path().to_string())
			.finish()
	}
}

/// Non-owning node handle.
///
/// Upgrading fails once the generation has been retired or dropped; it never fails while
/// the generation is still the active one.
#[derive(Clone, Debug)]
pub struct WeakNodeRef {
	generation: Weak<Generation>,
	id: NodeId,
}

impl WeakNodeRef {
	pub fn upgrade(&self) -> Option<NodeRef> {
		let generation = self.generation.upgrade()?;
		if generation.is_retired() {
			return None;
		}
		Some(NodeRef { generation, id: self.id })
	}

	pub fn id(&self) -> NodeId {
		self.id
	}
}

/// Lazy, finite, restartable iteration over a node's children.
#[derive(Clone, Debug)]
pub struct ChildStream<'g> {
	arena: &'g Arena,
	children: &'g [NodeId],
	filter: NodeMatcher,
	pos: usize,
}

impl<'g> ChildStream<'g> {
	pub(crate) fn new(arena: &'g Arena, children: &'g [NodeId], filter: NodeMatcher) -> Self {
		Self {
			arena,
			children,
			filter,
			pos: 0,
		}
	}

	/// Rewinds to the first child.
	pub fn restart(&mut self) {
		self.pos = 0;
	}
}

impl<'g> Iterator for ChildStream<'g> {
	type Item = NodeView<'g>;

	fn next(&mut self) -> Option<Self::Item> {
		while let Some(id) = self.children.get(self.pos) {
			self.pos += 1;
			if let Some(view) = NodeView::of(self.arena, *id)
				&& self.filter.matches(&view)
			{
				return Some(view);
			}
		}
		None
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(0, Some(self.children.len() - self.pos))
	}
}
