use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::key::component_matches;
use crate::core::{TypeError, TypeKey, ValueKind, WILDCARD};

/// Declared shape of one attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeSpec {
	pub kind: ValueKind,
	#[serde(default)]
	pub required: bool,
}

impl AttributeSpec {
	pub const fn optional(kind: ValueKind) -> Self {
		Self { kind, required: false }
	}

	pub const fn required(kind: ValueKind) -> Self {
		Self { kind, required: true }
	}
}

/// A `(childType, childSubType|*, childName|*)` pattern a parent type accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlacementPattern {
	#[serde(rename = "type")]
	child_type: Arc<str>,
	#[serde(rename = "subtype", default = "wildcard")]
	child_sub_type: Arc<str>,
	#[serde(rename = "name", default = "wildcard")]
	child_name: Arc<str>,
}

fn wildcard() -> Arc<str> {
	Arc::from(WILDCARD)
}

impl PlacementPattern {
	pub fn new(child_type: impl Into<Arc<str>>, child_sub_type: impl Into<Arc<str>>, child_name: impl Into<Arc<str>>) -> Self {
		Self {
			child_type: child_type.into(),
			child_sub_type: child_sub_type.into(),
			child_name: child_name.into(),
		}
	}

	/// Accepts any child of the given type.
	pub fn any_of(child_type: impl Into<Arc<str>>) -> Self {
		Self::new(child_type, WILDCARD, WILDCARD)
	}

	pub fn child_type(&self) -> &str {
		&self.child_type
	}

	pub fn child_sub_type(&self) -> &str {
		&self.child_sub_type
	}

	pub fn child_name(&self) -> &str {
		&self.child_name
	}

	pub fn matches(&self, key: &TypeKey, name: &str) -> bool {
		component_matches(&self.child_type, key.type_name())
			&& component_matches(&self.child_sub_type, key.sub_type())
			&& component_matches(&self.child_name, name)
	}
}

impl fmt::Display for PlacementPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}:{}", self.child_type, self.child_sub_type, self.child_name)
	}
}

/// A registered type: its own attributes, placement rules, and optional parent.
///
/// Definitions are never mutated in place once registered; an extension produces a new
/// merged definition that replaces the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
	#[serde(flatten)]
	key: TypeKey,
	#[serde(default)]
	parent: Option<TypeKey>,
	#[serde(default)]
	attributes: BTreeMap<Arc<str>, AttributeSpec>,
	#[serde(default)]
	placement: BTreeSet<PlacementPattern>,
	#[serde(default, rename = "abstract")]
	is_abstract: bool,
	#[serde(default)]
	description: String,
}

impl TypeDefinition {
	pub fn new(type_name: impl Into<Arc<str>>, sub_type: impl Into<Arc<str>>) -> Self {
		Self {
			key: TypeKey::new(type_name, sub_type),
			parent: None,
			attributes: BTreeMap::new(),
			placement: BTreeSet::new(),
			is_abstract: false,
			description: String::new(),
		}
	}

	/// Declares the parent this type inherits from. The parent may be registered later.
	pub fn inherits(mut self, type_name: impl Into<Arc<str>>, sub_type: impl Into<Arc<str>>) -> Self {
		self.parent = Some(TypeKey::new(type_name, sub_type));
		self
	}

	pub fn attribute(mut self, name: impl Into<Arc<str>>, spec: AttributeSpec) -> Self {
		self.attributes.insert(name.into(), spec);
		self
	}

	/// Declares the open wildcard slot: any attribute name is accepted with this spec.
	pub fn open_attributes(mut self, kind: ValueKind) -> Self {
		self.attributes.insert(Arc::from(WILDCARD), AttributeSpec::optional(kind));
		self
	}

	pub fn allows(mut self, pattern: PlacementPattern) -> Self {
		self.placement.insert(pattern);
		self
	}

	pub fn abstract_type(mut self) -> Self {
		self.is_abstract = true;
		self
	}

	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn key(&self) -> &TypeKey {
		&self.key
	}

	pub fn parent(&self) -> Option<&TypeKey> {
		self.parent.as_ref()
	}

	/// Own attributes, including the wildcard slot under `*` if declared.
	pub fn attributes(&self) -> &BTreeMap<Arc<str>, AttributeSpec> {
		&self.attributes
	}

	pub fn placement(&self) -> &BTreeSet<PlacementPattern> {
		&self.placement
	}

	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// Returns the union of this definition and `ext`.
	///
	/// Additions are append-only: an attribute already declared with a different spec is an
	/// error, an identical redeclaration is a no-op.
	pub(crate) fn merged(&self, ext: &TypeExtension) -> Result<Self, TypeError> {
		let mut next = self.clone();
		for (name, spec) in &ext.attributes {
			match next.attributes.get(name) {
				Some(existing) if existing == spec => {}
				Some(_) => {
					return Err(TypeError::ExtendConflict {
						key: self.key.clone(),
						attribute: name.clone(),
					});
				}
				None => {
					next.attributes.insert(name.clone(), *spec);
				}
			}
		}
		next.placement.extend(ext.placement.iter().cloned());
		Ok(next)
	}
}

/// Additions applied to an already registered type by a collaborator that does not own it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeExtension {
	attributes: BTreeMap<Arc<str>, AttributeSpec>,
	placement: BTreeSet<PlacementPattern>,
}

impl TypeExtension {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn attribute(mut self, name: impl Into<Arc<str>>, spec: AttributeSpec) -> Self {
		self.attributes.insert(name.into(), spec);
		self
	}

	pub fn allows(mut self, pattern: PlacementPattern) -> Self {
		self.placement.insert(pattern);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.attributes.is_empty() && self.placement.is_empty()
	}
}
