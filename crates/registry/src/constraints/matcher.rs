use std::fmt;
use std::sync::Arc;

use crate::core::key::component_matches;
use crate::core::{ATTR_TYPE, WILDCARD};
use crate::tree::NodeView;

/// Structural pattern over `(type, subtype, name)` with an optional parent pattern.
///
/// Patterns are written `type.subtype` with `*` as wildcard, optionally followed by
/// `:name`, e.g. `object.*`, `field.string:email`, `attr.*:maxLength`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeMatcher {
	type_name: Arc<str>,
	sub_type: Arc<str>,
	name: Arc<str>,
	parent: Option<Box<NodeMatcher>>,
}

impl NodeMatcher {
	pub fn new(type_name: impl Into<Arc<str>>, sub_type: impl Into<Arc<str>>) -> Self {
		Self {
			type_name: type_name.into(),
			sub_type: sub_type.into(),
			name: Arc::from(WILDCARD),
			parent: None,
		}
	}

	/// Matches every node.
	pub fn any() -> Self {
		Self::new(WILDCARD, WILDCARD)
	}

	/// Matches attribute nodes named `name`, of any value kind.
	pub fn attribute(name: impl Into<Arc<str>>) -> Self {
		Self::new(ATTR_TYPE, WILDCARD).named(name)
	}

	/// Parses `type[.subtype][:name]`. A bare type gets the wildcard subtype.
	pub fn parse(pattern: &str) -> Option<Self> {
		let pattern = pattern.trim();
		let (key, name) = match pattern.split_once(':') {
			Some((key, name)) if !name.is_empty() => (key, Some(name)),
			Some(_) => return None,
			None => (pattern, None),
		};
		let (ty, sub) = match key.split_once('.') {
			Some((ty, sub)) => (ty, sub),
			None => (key, WILDCARD),
		};
		if ty.is_empty() || sub.is_empty() {
			return None;
		}
		let matcher = Self::new(ty, sub);
		Some(match name {
			Some(name) => matcher.named(name),
			None => matcher,
		})
	}

	pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
		self.name = name.into();
		self
	}

	/// Additionally requires the node's parent to match `parent`.
	pub fn under(mut self, parent: NodeMatcher) -> Self {
		self.parent = Some(Box::new(parent));
		self
	}

	pub fn matches(&self, node: &NodeView<'_>) -> bool {
		if !component_matches(&self.type_name, node.type_name())
			|| !component_matches(&self.sub_type, node.sub_type())
			|| !component_matches(&self.name, node.name())
		{
			return false;
		}
		match &self.parent {
			None => true,
			Some(pattern) => node.parent().is_some_and(|p| pattern.matches(&p)),
		}
	}
}

impl fmt::Display for NodeMatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.type_name, self.sub_type)?;
		if &*self.name != WILDCARD {
			write!(f, ":{}", self.name)?;
		}
		if let Some(parent) = &self.parent {
			write!(f, " under {parent}")?;
		}
		Ok(())
	}
}
