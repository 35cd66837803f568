use std::fmt;
use std::sync::Arc;

use crate::core::Value;
use crate::tree::NodeView;

/// Structural rule deciding which children a parent may take.
pub trait Placement: Send + Sync + fmt::Debug {
	/// Returns true if this rule has an opinion about children of `parent`.
	fn applies(&self, parent: &NodeView<'_>) -> bool;

	/// Returns true if `child` may be attached under a parent this rule applies to.
	fn accepts(&self, child: &NodeView<'_>) -> bool;
}

/// Content rule checked whenever a value is assigned.
pub trait Validator: Send + Sync + fmt::Debug {
	fn applies(&self, node: &NodeView<'_>) -> bool;

	/// Returns a human-readable reason on failure.
	fn validate(&self, node: &NodeView<'_>, value: &Value) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub enum ConstraintKind {
	Placement(Arc<dyn Placement>),
	Validation(Arc<dyn Validator>),
}

/// A registered placement or validation rule.
#[derive(Debug, Clone)]
pub struct Constraint {
	pub(crate) id: Arc<str>,
	pub(crate) description: Arc<str>,
	pub(crate) kind: ConstraintKind,
}

impl Constraint {
	pub fn placement(id: impl Into<Arc<str>>, description: impl Into<Arc<str>>, rule: impl Placement + 'static) -> Self {
		Self {
			id: id.into(),
			description: description.into(),
			kind: ConstraintKind::Placement(Arc::new(rule)),
		}
	}

	pub fn validation(id: impl Into<Arc<str>>, description: impl Into<Arc<str>>, rule: impl Validator + 'static) -> Self {
		Self {
			id: id.into(),
			description: description.into(),
			kind: ConstraintKind::Validation(Arc::new(rule)),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn kind(&self) -> &ConstraintKind {
		&self.kind
	}

	pub fn is_placement(&self) -> bool {
		matches!(self.kind, ConstraintKind::Placement(_))
	}

	pub fn is_validation(&self) -> bool {
		matches!(self.kind, ConstraintKind::Validation(_))
	}
}

impl fmt::Display for Constraint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = if self.is_placement() { "placement" } else { "validation" };
		write!(f, "{kind} {}: {}", self.id, self.description)
	}
}
