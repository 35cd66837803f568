//! Registry configuration.
//!
//! Options are plain data: hosts build them in code with the `with_*` setters or load them
//! from a TOML document via [`RegistryOptions::from_toml_str`].
//!
//! ```toml
//! strict-attributes = true
//! duplicate-constraints = "relaxed"
//! unconstrained-placement = "deny"
//! derived-cache-capacity = 1024
//! disabled-constraint-types = ["template"]
//! ```

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::error::RegistryError;

/// How a second registration under an existing constraint id is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
	/// Duplicate ids are a hard error.
	#[default]
	Strict,
	/// Duplicate ids are ignored (redundant discovery of the same producer).
	Relaxed,
}

/// Outcome of an attach for which no placement constraint applies to the parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementDefault {
	/// Reject: some rule must explicitly permit every placement.
	#[default]
	Deny,
	/// Accept: unconstrained parents take any child.
	Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryOptions {
	/// Unknown attribute names fail the whole loading generation, not just the call.
	pub strict_attributes: bool,
	pub duplicate_constraints: DuplicatePolicy,
	pub unconstrained_placement: PlacementDefault,
	/// Upper bound on entries in the reclaimable cache tier.
	pub derived_cache_capacity: usize,
	/// Global switch for placement and validation constraints.
	pub constraint_checking: bool,
	/// Type names whose nodes skip constraint enforcement.
	pub disabled_constraint_types: Vec<String>,
}

impl Default for RegistryOptions {
	fn default() -> Self {
		Self {
			strict_attributes: false,
			duplicate_constraints: DuplicatePolicy::Strict,
			unconstrained_placement: PlacementDefault::Deny,
			derived_cache_capacity: 4096,
			constraint_checking: true,
			disabled_constraint_types: Vec::new(),
		}
	}
}

impl RegistryOptions {
	/// Parses options from a TOML document; missing keys take their defaults.
	pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
		toml::from_str(text).map_err(|e| RegistryError::Options(e.to_string()))
	}

	pub fn with_strict_attributes(mut self, on: bool) -> Self {
		self.strict_attributes = on;
		self
	}

	pub fn with_duplicate_constraints(mut self, policy: DuplicatePolicy) -> Self {
		self.duplicate_constraints = policy;
		self
	}

	pub fn with_unconstrained_placement(mut self, default: PlacementDefault) -> Self {
		self.unconstrained_placement = default;
		self
	}

	pub fn with_derived_cache_capacity(mut self, capacity: usize) -> Self {
		self.derived_cache_capacity = capacity;
		self
	}

	pub fn with_constraint_checking(mut self, on: bool) -> Self {
		self.constraint_checking = on;
		self
	}

	pub fn disable_constraints_for(mut self, type_name: impl Into<String>) -> Self {
		self.disabled_constraint_types.push(type_name.into());
		self
	}

	/// Capacity of the reclaimable tier, never zero.
	pub(crate) fn derived_capacity(&self) -> NonZeroUsize {
		NonZeroUsize::new(self.derived_cache_capacity).unwrap_or(NonZeroUsize::MIN)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let opts = RegistryOptions::from_toml_str("").unwrap();
		assert_eq!(opts, RegistryOptions::default());
	}

	#[test]
	fn parses_kebab_case_document() {
		let opts = RegistryOptions::from_toml_str(
			r#"
			strict-attributes = true
			duplicate-constraints = "relaxed"
			unconstrained-placement = "allow"
			derived-cache-capacity = 0
			disabled-constraint-types = ["template"]
			"#,
		)
		.unwrap();
		assert!(opts.strict_attributes);
		assert_eq!(opts.duplicate_constraints, DuplicatePolicy::Relaxed);
		assert_eq!(opts.unconstrained_placement, PlacementDefault::Allow);
		assert_eq!(opts.derived_capacity().get(), 1);
		assert_eq!(opts.disabled_constraint_types, vec!["template".to_string()]);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = RegistryOptions::from_toml_str("strict = true").unwrap_err();
		assert!(matches!(err, RegistryError::Options(_)));
	}
}
