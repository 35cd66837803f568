use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{TypeKey, Value};

/// Index of a node inside its generation's arena.
///
/// Ids are only meaningful for the arena (and therefore the generation) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
	#[inline]
	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}

	pub fn as_u32(self) -> u32 {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	/// Structural node with children and attributes.
	Element,
	/// Value-carrying node owned by an element's attribute map.
	Attribute,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
	pub key: TypeKey,
	pub name: Arc<str>,
	pub kind: NodeKind,
	pub parent: Option<NodeId>,
	pub children: Vec<NodeId>,
	pub attributes: BTreeMap<Arc<str>, NodeId>,
	pub value: Option<Value>,
}

/// Generation-scoped node storage. Nodes are never removed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
	nodes: Vec<NodeData>,
}

impl Arena {
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn get(&self, id: NodeId) -> Option<&NodeData> {
		self.nodes.get(id.index())
	}

	pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
		self.nodes.get_mut(id.index())
	}

	pub fn push(&mut self, key: TypeKey, name: Arc<str>, kind: NodeKind, value: Option<Value>) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(NodeData {
			key,
			name,
			kind,
			parent: None,
			children: Vec::new(),
			attributes: BTreeMap::new(),
			value,
		});
		id
	}

	pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
		(0..self.nodes.len() as u32).map(NodeId)
	}

	/// Element nodes without a parent, in creation order.
	pub fn roots(&self) -> Vec<NodeId> {
		self.ids()
			.filter(|id| {
				self.get(*id)
					.is_some_and(|n| n.kind == NodeKind::Element && n.parent.is_none())
			})
			.collect()
	}

	/// Returns true if `ancestor` is `node` or one of its ancestors.
	pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut cursor = Some(node);
		while let Some(id) = cursor {
			if id == ancestor {
				return true;
			}
			cursor = self.get(id).and_then(|n| n.parent);
		}
		false
	}
}
