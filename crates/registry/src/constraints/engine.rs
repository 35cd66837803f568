//! Constraint Engine.
//!
//! # Role
//!
//! The single enforcement path for "can this child attach here" and "is this value valid".
//! The mutable [`ConstraintEngine`] is used while loading; sealing freezes it into a
//! [`ConstraintSet`] shared by the generation's readers.
//!
//! # Invariants
//!
//! - Placement is a conjunction: every rule that applies to the parent must accept the
//!   child. A rule that does not apply is skipped.
//!   - Enforced in: [`ConstraintEngine::check_placement`]
//!   - Tested by: `constraints::tests::placement_is_a_conjunction`
//!   - Failure symptom: a child forbidden by one rule is attached because another allowed it.
//! - With no applicable rule, the configured [`PlacementDefault`] decides.
//!   - Enforced in: [`ConstraintEngine::check_placement`]
//!   - Tested by: `constraints::tests::unconstrained_placement_follows_policy`
//!   - Failure symptom: types nobody declared rules for can be placed anywhere.
//! - Validation stops at the first failing rule and reports its id and the value.
//!   - Enforced in: [`check_validation`]
//!   - Tested by: `constraints::tests::validation_reports_first_failure`
//!   - Failure symptom: violations lose the offending value or the wrong rule is blamed.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use super::constraint::{Constraint, ConstraintKind};
use crate::core::{
	ConstraintError, DuplicatePolicy, PlacementDefault, PlacementViolation, RegistryOptions, ValidationViolation, Value,
};
use crate::tree::NodeView;
use crate::types::ResolvedType;

/// Constraint id reported when no rule applies and the default policy denies.
pub const UNCONSTRAINED_PLACEMENT_ID: &str = "placement.unconstrained";

/// Option-derived switches shared by the engine and its frozen set.
#[derive(Debug, Clone)]
pub(crate) struct Enforcement {
	policy: DuplicatePolicy,
	unconstrained: PlacementDefault,
	checking: bool,
	disabled: FxHashSet<Arc<str>>,
}

impl Enforcement {
	pub(crate) fn from_options(options: &RegistryOptions) -> Self {
		Self {
			policy: options.duplicate_constraints,
			unconstrained: options.unconstrained_placement,
			checking: options.constraint_checking,
			disabled: options.disabled_constraint_types.iter().map(|s| Arc::from(s.as_str())).collect(),
		}
	}

	/// Returns false if constraints are switched off for the node's element type.
	fn enforced_for(&self, node: &NodeView<'_>) -> bool {
		if !self.checking {
			return false;
		}
		let element = node.element().unwrap_or(*node);
		!self.disabled.contains(element.type_name())
	}
}

#[derive(Debug, Default)]
struct EngineInner {
	constraints: Vec<Constraint>,
	ids: FxHashSet<Arc<str>>,
}

/// Mutable constraint collection used during loading.
#[derive(Debug)]
pub struct ConstraintEngine {
	inner: RwLock<EngineInner>,
	enforcement: Enforcement,
}

impl ConstraintEngine {
	pub fn new(options: &RegistryOptions) -> Self {
		Self {
			inner: RwLock::new(EngineInner::default()),
			enforcement: Enforcement::from_options(options),
		}
	}

	/// Re-opens a frozen set for an update session.
	pub fn from_set(set: &ConstraintSet) -> Self {
		let constraints = set.constraints.to_vec();
		let ids = constraints.iter().map(|c| c.id.clone()).collect();
		Self {
			inner: RwLock::new(EngineInner { constraints, ids }),
			enforcement: set.enforcement.clone(),
		}
	}

	/// Appends `constraint`.
	///
	/// A repeated id is an error under [`DuplicatePolicy::Strict`] and ignored under
	/// [`DuplicatePolicy::Relaxed`].
	pub fn add_constraint(&self, constraint: Constraint) -> Result<(), ConstraintError> {
		let mut inner = self.inner.write();
		if inner.ids.contains(&constraint.id) {
			return match self.enforcement.policy {
				DuplicatePolicy::Strict => Err(ConstraintError::Duplicate { id: constraint.id }),
				DuplicatePolicy::Relaxed => {
					warn!(id = %constraint.id, "duplicate constraint ignored");
					Ok(())
				}
			};
		}
		debug!(id = %constraint.id, placement = constraint.is_placement(), "added constraint");
		inner.ids.insert(constraint.id.clone());
		inner.constraints.push(constraint);
		Ok(())
	}

	#[cfg(test)]
	pub(crate) fn remove(&self, id: &str) -> bool {
		let mut inner = self.inner.write();
		let before = inner.constraints.len();
		inner.constraints.retain(|c| &*c.id != id);
		inner.ids.remove(id);
		inner.constraints.len() != before
	}

	pub fn contains(&self, id: &str) -> bool {
		self.inner.read().ids.contains(id)
	}

	pub fn len(&self) -> usize {
		self.inner.read().constraints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Checks whether `child` may be attached under `parent`.
	///
	/// `child` must already be viewed with `parent` as its prospective parent. The parent's
	/// own placement rules take part as an implicit `type:<key>` constraint when non-empty.
	pub fn check_placement(&self, parent: &NodeView<'_>, parent_type: &ResolvedType, child: &NodeView<'_>) -> Result<(), PlacementViolation> {
		if !self.enforcement.enforced_for(parent) {
			trace!(parent = %parent.key(), "placement checks disabled for parent type");
			return Ok(());
		}

		let violation = |id: Arc<str>, description: String| PlacementViolation {
			constraint_id: id,
			parent: parent.path(),
			child: child.path(),
			description,
		};

		let mut applicable = 0usize;
		if !parent_type.placement().is_empty() {
			applicable += 1;
			if !parent_type.accepts_child(child.key(), child.name()) {
				return Err(violation(
					format!("type:{}", parent_type.key()).into(),
					format!("type {} does not accept {} children", parent_type.key(), child.key()),
				));
			}
		}

		let inner = self.inner.read();
		for c in &inner.constraints {
			let ConstraintKind::Placement(rule) = &c.kind else { continue };
			if !rule.applies(parent) {
				continue;
			}
			applicable += 1;
			if !rule.accepts(child) {
				trace!(id = %c.id, "placement rejected");
				return Err(violation(c.id.clone(), c.description.to_string()));
			}
		}

		if applicable == 0 {
			match self.enforcement.unconstrained {
				PlacementDefault::Deny => {
					return Err(violation(
						Arc::from(UNCONSTRAINED_PLACEMENT_ID),
						format!("no rule permits placing {} under {}", child.key(), parent.key()),
					));
				}
				PlacementDefault::Allow => trace!(parent = %parent.key(), "no placement rule applies; allowed by policy"),
			}
		}
		trace!(parent = %parent.key(), child = %child.key(), applicable, "placement accepted");
		Ok(())
	}

	/// Runs every applicable validator against `value`, stopping at the first failure.
	pub fn check_validation(&self, node: &NodeView<'_>, value: &Value) -> Result<(), ValidationViolation> {
		check_validation(&self.inner.read().constraints, &self.enforcement, node, value)
	}

	/// Freezes the current collection.
	pub fn freeze(&self) -> ConstraintSet {
		let inner = self.inner.read();
		ConstraintSet {
			constraints: inner.constraints.clone().into(),
			enforcement: self.enforcement.clone(),
		}
	}
}

/// Immutable constraint collection owned by a sealed generation.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
	constraints: Arc<[Constraint]>,
	enforcement: Enforcement,
}

impl ConstraintSet {
	pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
		self.constraints.iter()
	}

	pub fn len(&self) -> usize {
		self.constraints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.constraints.is_empty()
	}

	pub fn get(&self, id: &str) -> Option<&Constraint> {
		self.constraints.iter().find(|c| &*c.id == id)
	}

	/// Validation constraints that apply to `node`.
	pub fn validators_for(&self, node: &NodeView<'_>) -> Vec<Constraint> {
		if !self.enforcement.enforced_for(node) {
			return Vec::new();
		}
		self.constraints
			.iter()
			.filter(|c| matches!(&c.kind, ConstraintKind::Validation(v) if v.applies(node)))
			.cloned()
			.collect()
	}

	pub fn check_validation(&self, node: &NodeView<'_>, value: &Value) -> Result<(), ValidationViolation> {
		check_validation(&self.constraints, &self.enforcement, node, value)
	}
}

pub(crate) fn check_validation(constraints: &[Constraint], enforcement: &Enforcement, node: &NodeView<'_>, value: &Value) -> Result<(), ValidationViolation> {
	if !enforcement.enforced_for(node) {
		return Ok(());
	}
	for c in constraints {
		let ConstraintKind::Validation(rule) = &c.kind else { continue };
		if !rule.applies(node) {
			continue;
		}
		if let Err(reason) = rule.validate(node, value) {
			trace!(id = %c.id, node = %node.key(), "validation failed");
			return Err(ValidationViolation {
				constraint_id: c.id.clone(),
				path: node.path(),
				description: format!("{}: {reason}", c.description),
				value: Some(value.clone()),
			});
		}
	}
	Ok(())
}
