//! Inheritance flattening.
//!
//! # Role
//!
//! Turns a chain of stored definitions into one [`ResolvedType`]: the attribute surface and
//! placement rules a node of the type actually has.
//!
//! # Invariants
//!
//! - The resolved attribute set is the union of the type's own attributes and every
//!   ancestor's, keyed by name (no duplicates).
//!   - Enforced in: [`flatten`]
//!   - Tested by: `types::tests::inheritance_closure_holds_for_random_chains`
//!   - Failure symptom: attributes declared on a base type are rejected on subtype nodes.
//! - A subtype never widens an inherited attribute: the value kind is fixed by the first
//!   ancestor that declares it, and `required` can only go from false to true.
//!   - Enforced in: [`flatten`]
//!   - Tested by: `types::tests::subtype_cannot_change_attribute_kind`
//!   - Failure symptom: a subtype silently accepts values its base type forbids.
//! - Walking a chain that revisits a key fails with the full cycle.
//!   - Enforced in: [`flatten`]
//!   - Tested by: `types::tests::cycles_are_reported_with_chain`
//!   - Failure symptom: resolution never terminates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::def::{AttributeSpec, PlacementPattern, TypeDefinition};
use crate::core::{TypeError, TypeKey, WILDCARD};

/// The inheritance-flattened view of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
	key: TypeKey,
	/// The type itself first, then each ancestor up to the base.
	ancestry: Vec<TypeKey>,
	attributes: BTreeMap<Arc<str>, AttributeSpec>,
	open_slot: Option<AttributeSpec>,
	placement: BTreeSet<PlacementPattern>,
	is_abstract: bool,
	description: String,
}

impl ResolvedType {
	pub fn key(&self) -> &TypeKey {
		&self.key
	}

	pub fn ancestry(&self) -> &[TypeKey] {
		&self.ancestry
	}

	/// Named attributes, excluding the open wildcard slot.
	pub fn attributes(&self) -> &BTreeMap<Arc<str>, AttributeSpec> {
		&self.attributes
	}

	/// Looks up the spec for `name`, falling back to the open wildcard slot.
	pub fn attribute(&self, name: &str) -> Option<AttributeSpec> {
		self.attributes.get(name).copied().or(self.open_slot)
	}

	pub fn open_slot(&self) -> Option<AttributeSpec> {
		self.open_slot
	}

	pub fn placement(&self) -> &BTreeSet<PlacementPattern> {
		&self.placement
	}

	/// Returns true if any of the type's placement rules match the child.
	pub fn accepts_child(&self, key: &TypeKey, name: &str) -> bool {
		self.placement.iter().any(|p| p.matches(key, name))
	}

	/// Abstractness is not inherited: only the type's own flag counts.
	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// Returns true if `ancestor` is this type or appears in its parent chain.
	pub fn is_subtype_of(&self, ancestor: &TypeKey) -> bool {
		self.ancestry.contains(ancestor)
	}

	pub fn required_attributes(&self) -> impl Iterator<Item = &Arc<str>> {
		self.attributes.iter().filter(|(_, spec)| spec.required).map(|(name, _)| name)
	}
}

/// Flattens the chain rooted at `key` using the stored definitions in `defs`.
pub(crate) fn flatten(key: &TypeKey, defs: &FxHashMap<TypeKey, Arc<TypeDefinition>>) -> Result<ResolvedType, TypeError> {
	let mut chain: Vec<Arc<TypeDefinition>> = Vec::new();
	let mut seen: FxHashSet<&TypeKey> = FxHashSet::default();
	let mut walk: Vec<TypeKey> = Vec::new();

	let mut cursor = key;
	loop {
		walk.push(cursor.clone());
		if !seen.insert(cursor) {
			return Err(TypeError::CyclicInheritance { chain: walk });
		}
		let Some(def) = defs.get(cursor) else {
			if chain.is_empty() {
				return Err(TypeError::Unknown { key: key.clone() });
			}
			walk.pop();
			return Err(TypeError::UnresolvedParent {
				key: key.clone(),
				missing: cursor.clone(),
				chain: walk,
			});
		};
		chain.push(def.clone());
		match def.parent() {
			Some(parent) => cursor = parent,
			None => break,
		}
	}

	let mut attributes: BTreeMap<Arc<str>, AttributeSpec> = BTreeMap::new();
	let mut declared_by: FxHashMap<Arc<str>, TypeKey> = FxHashMap::default();
	let mut open_slot: Option<AttributeSpec> = None;
	let mut placement = BTreeSet::new();

	// Base first so that the first declaration fixes the kind.
	for def in chain.iter().rev() {
		for (name, spec) in def.attributes() {
			if &**name == WILDCARD {
				open_slot = Some(match open_slot {
					Some(inherited) if inherited.kind != spec.kind => {
						return Err(TypeError::AttributeKindConflict {
							key: def.key().clone(),
							attribute: name.clone(),
							ancestor: declared_by.get(name).cloned().unwrap_or_else(|| def.key().clone()),
							inherited: inherited.kind,
							declared: spec.kind,
						});
					}
					_ => *spec,
				});
				declared_by.entry(name.clone()).or_insert_with(|| def.key().clone());
				continue;
			}
			match attributes.get_mut(name) {
				Some(inherited) => {
					if inherited.kind != spec.kind {
						return Err(TypeError::AttributeKindConflict {
							key: def.key().clone(),
							attribute: name.clone(),
							ancestor: declared_by.get(name).cloned().unwrap_or_else(|| def.key().clone()),
							inherited: inherited.kind,
							declared: spec.kind,
						});
					}
					inherited.required |= spec.required;
				}
				None => {
					attributes.insert(name.clone(), *spec);
					declared_by.insert(name.clone(), def.key().clone());
				}
			}
		}
		placement.extend(def.placement().iter().cloned());
	}

	let own = &chain[0];
	Ok(ResolvedType {
		key: key.clone(),
		ancestry: chain.iter().map(|d| d.key().clone()).collect(),
		attributes,
		open_slot,
		placement,
		is_abstract: own.is_abstract(),
		description: own.description().to_string(),
	})
}
