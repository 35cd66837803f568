use std::fmt;

use crate::core::{TypeError, TypeKey};

/// Structural diagnosis of a type store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
	pub type_count: usize,
	/// Inheritance problems that would fail a seal.
	pub errors: Vec<TypeError>,
	/// Suspicious but legal shapes.
	pub warnings: Vec<String>,
	pub recommendations: Vec<String>,
	/// Parents referenced by registered types but never registered themselves.
	pub missing_parents: Vec<TypeKey>,
}

impl HealthReport {
	pub fn is_structurally_sound(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn follows_best_practices(&self) -> bool {
		self.is_structurally_sound() && self.warnings.is_empty()
	}

	pub fn summary(&self) -> String {
		format!(
			"{} types, {} errors, {} warnings, {} recommendations",
			self.type_count,
			self.errors.len(),
			self.warnings.len(),
			self.recommendations.len()
		)
	}
}

impl fmt::Display for HealthReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.summary())?;
		for e in &self.errors {
			writeln!(f, "  error: {e}")?;
		}
		for w in &self.warnings {
			writeln!(f, "  warning: {w}")?;
		}
		for r in &self.recommendations {
			writeln!(f, "  recommendation: {r}")?;
		}
		Ok(())
	}
}
