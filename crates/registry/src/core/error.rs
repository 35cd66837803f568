//! Error taxonomy.
//!
//! Every error is returned synchronously from the call that caused it. Violations and tree
//! errors are recoverable by the caller (the call is rejected, nothing changes); inheritance
//! errors surface at `seal` and abort the loading generation.

use std::sync::Arc;

use super::key::{TypeKey, display_chain};
use super::meta::RegistrySource;
use super::value::{Value, ValueKind};
use crate::lifecycle::LifecycleState;
use crate::tree::{NodeId, NodePath};

/// Type definition store failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
	/// A different definition already exists under the same key.
	#[error("duplicate type {key}: conflicting definition from {incoming} (existing from {existing})")]
	Duplicate {
		key: TypeKey,
		existing: RegistrySource,
		incoming: RegistrySource,
	},
	#[error("unknown type {key}")]
	Unknown { key: TypeKey },
	#[error("type {key} inherits from unregistered {missing} (chain: {})", display_chain(.chain))]
	UnresolvedParent {
		key: TypeKey,
		missing: TypeKey,
		chain: Vec<TypeKey>,
	},
	#[error("cyclic inheritance: {}", display_chain(.chain))]
	CyclicInheritance { chain: Vec<TypeKey> },
	/// A subtype redeclared an inherited attribute with a different value kind.
	#[error("type {key} declares attribute {attribute:?} as {declared}, but {ancestor} declares it as {inherited}")]
	AttributeKindConflict {
		key: TypeKey,
		attribute: Arc<str>,
		ancestor: TypeKey,
		inherited: ValueKind,
		declared: ValueKind,
	},
	/// An extension tried to override an attribute already declared on the type.
	#[error("cannot extend {key}: attribute {attribute:?} is already declared with a different spec")]
	ExtendConflict { key: TypeKey, attribute: Arc<str> },
	#[error("type {key} is abstract and cannot be instantiated")]
	Abstract { key: TypeKey },
}

/// Constraint registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
	#[error("duplicate constraint id {id:?}")]
	Duplicate { id: Arc<str> },
	#[error("invalid constraint {id:?}: {reason}")]
	Invalid { id: Arc<str>, reason: String },
}

/// A child was refused by the placement rules of its prospective parent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("placement of {child} under {parent} rejected by {constraint_id}: {description}")]
pub struct PlacementViolation {
	pub constraint_id: Arc<str>,
	pub parent: NodePath,
	pub child: NodePath,
	pub description: String,
}

/// A value failed a validation constraint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{constraint_id} failed at {path}: {description}{}", render_value(.value))]
pub struct ValidationViolation {
	pub constraint_id: Arc<str>,
	pub path: NodePath,
	pub description: String,
	pub value: Option<Value>,
}

fn render_value(value: &Option<Value>) -> String {
	const MAX: usize = 50;
	match value {
		None => String::new(),
		Some(v) => {
			let text = v.to_string();
			if text.chars().count() <= MAX {
				format!(" [value: {text}]")
			} else {
				let head: String = text.chars().take(MAX - 3).collect();
				format!(" [value: {head}...]")
			}
		}
	}
}

/// Structural tree failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
	#[error("unknown attribute {attribute:?} at {path}{}", render_suggestion(.suggestion))]
	UnknownAttribute {
		path: NodePath,
		attribute: Arc<str>,
		suggestion: Option<Arc<str>>,
	},
	#[error("missing required attribute {attribute:?} at {path}")]
	MissingRequiredAttribute { path: NodePath, attribute: Arc<str> },
	#[error("{parent} already has a child named {name:?}")]
	DuplicateChild { parent: NodePath, name: Arc<str> },
	#[error("{path} is already attached")]
	AlreadyAttached { path: NodePath },
	#[error("attaching {path} would create a cycle")]
	AttachCycle { path: NodePath },
	#[error("{path} is an attribute node and cannot take part in attach")]
	NotAnElement { path: NodePath },
	#[error("unknown node {id}")]
	UnknownNode { id: NodeId },
	#[error("{parent} has no child named {name:?}")]
	ChildNotFound { parent: NodePath, name: Arc<str> },
	#[error("invalid child filter {filter:?}")]
	InvalidFilter { filter: Arc<str> },
}

fn render_suggestion(suggestion: &Option<Arc<str>>) -> String {
	match suggestion {
		Some(s) => format!(" (did you mean {s:?}?)"),
		None => String::new(),
	}
}

/// Umbrella error for the registry surfaces.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
	#[error(transparent)]
	Type(#[from] TypeError),
	#[error(transparent)]
	Constraint(#[from] ConstraintError),
	#[error(transparent)]
	Placement(#[from] PlacementViolation),
	#[error(transparent)]
	Validation(#[from] ValidationViolation),
	#[error(transparent)]
	Tree(#[from] TreeError),
	/// Mutation attempted outside a loading or updating session.
	#[error("cannot {operation} while the registry is {state}")]
	ImmutableTree {
		operation: &'static str,
		state: LifecycleState,
	},
	#[error("invalid lifecycle transition {from} -> {to}")]
	InvalidTransition { from: LifecycleState, to: LifecycleState },
	#[error("an update is already in progress")]
	UpdateInProgress,
	#[error("update session was forked from {expected:?}, but the active generation is {actual:?}")]
	StaleUpdate {
		expected: Option<crate::lifecycle::GenerationId>,
		actual: Option<crate::lifecycle::GenerationId>,
	},
	#[error("no active generation")]
	NoActiveGeneration,
	#[error("seal failed with {} problem(s); first: {}", .problems.len(), first_problem(.problems))]
	SealFailed { problems: Vec<RegistryError> },
	#[error("invalid registry options: {0}")]
	Options(String),
}

fn first_problem(problems: &[RegistryError]) -> String {
	problems.first().map(ToString::to_string).unwrap_or_default()
}

impl RegistryError {
	/// Returns true for errors that only reject the offending call.
	pub fn is_recoverable(&self) -> bool {
		matches!(
			self,
			RegistryError::Placement(_)
				| RegistryError::Validation(_)
				| RegistryError::Tree(_)
				| RegistryError::Constraint(_)
				| RegistryError::Type(TypeError::Abstract { .. } | TypeError::Unknown { .. })
		)
	}
}
