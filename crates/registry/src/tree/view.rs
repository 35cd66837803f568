use std::fmt;

use super::arena::{Arena, NodeId, NodeKind};
use super::path::NodePath;
use crate::core::{TypeKey, Value};

/// Borrowed, read-only view of a node handed to constraints.
///
/// A view may describe a node that is not linked yet: a child about to be attached sees
/// its prospective parent, and an attribute about to be written is viewed before its node
/// exists.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
	arena: &'a Arena,
	id: Option<NodeId>,
	key: &'a TypeKey,
	name: &'a str,
	kind: NodeKind,
	parent: Option<NodeId>,
}

impl<'a> NodeView<'a> {
	/// View of a stored node, or `None` if `id` is out of range.
	pub(crate) fn of(arena: &'a Arena, id: NodeId) -> Option<Self> {
		let data = arena.get(id)?;
		Some(Self {
			arena,
			id: Some(id),
			key: &data.key,
			name: &data.name,
			kind: data.kind,
			parent: data.parent,
		})
	}

	/// View of a stored node as if it were linked under `parent`.
	pub(crate) fn with_parent(self, parent: NodeId) -> Self {
		Self {
			parent: Some(parent),
			..self
		}
	}

	/// View of an attribute slot on `owner` that has no node yet.
	pub(crate) fn transient_attribute(arena: &'a Arena, owner: NodeId, key: &'a TypeKey, name: &'a str) -> Self {
		Self {
			arena,
			id: None,
			key,
			name,
			kind: NodeKind::Attribute,
			parent: Some(owner),
		}
	}

	pub fn id(&self) -> Option<NodeId> {
		self.id
	}

	pub fn key(&self) -> &'a TypeKey {
		self.key
	}

	pub fn type_name(&self) -> &'a str {
		self.key.type_name()
	}

	pub fn sub_type(&self) -> &'a str {
		self.key.sub_type()
	}

	pub fn name(&self) -> &'a str {
		self.name
	}

	pub fn kind(&self) -> NodeKind {
		self.kind
	}

	pub fn is_attribute(&self) -> bool {
		self.kind == NodeKind::Attribute
	}

	pub fn parent(&self) -> Option<NodeView<'a>> {
		NodeView::of(self.arena, self.parent?)
	}

	/// Nearest element: the node itself, or the owner of an attribute.
	pub fn element(&self) -> Option<NodeView<'a>> {
		match self.kind {
			NodeKind::Element => Some(*self),
			NodeKind::Attribute => self.parent(),
		}
	}

	/// The value stored on an attribute node.
	pub fn value(&self) -> Option<&'a Value> {
		self.arena.get(self.id?)?.value.as_ref()
	}

	/// The value of a named attribute on this node.
	pub fn attribute_value(&self, name: &str) -> Option<&'a Value> {
		let id = *self.arena.get(self.id?)?.attributes.get(name)?;
		self.arena.get(id)?.value.as_ref()
	}

	pub fn children(&self) -> impl Iterator<Item = NodeView<'a>> + use<'a> {
		let arena = self.arena;
		let ids: &'a [NodeId] = match self.id.and_then(|id| arena.get(id)) {
			Some(data) => &data.children,
			None => &[],
		};
		ids.iter().filter_map(move |id| NodeView::of(arena, *id))
	}

	pub fn path(&self) -> NodePath {
		let base = match self.parent {
			Some(p) => path_of(self.arena, p),
			None => NodePath::default(),
		};
		base.child(self.key.clone(), self.name)
	}
}

impl fmt::Debug for NodeView<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeView")
			.field("id", &self.id)
			.field("key", self.key)
			.field("name", &self.name)
			.field("kind", &self.kind)
			.finish()
	}
}

/// Root-to-node path of a stored node.
pub(crate) fn path_of(arena: &Arena, id: NodeId) -> NodePath {
	let mut chain = Vec::new();
	let mut cursor = Some(id);
	while let Some(id) = cursor {
		let Some(data) = arena.get(id) else { break };
		chain.push((data.key.clone(), data.name.clone()));
		cursor = data.parent;
	}
	chain
		.into_iter()
		.rev()
		.fold(NodePath::default(), |path, (key, name)| path.child(key, name))
}
