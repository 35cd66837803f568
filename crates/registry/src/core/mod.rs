//! Shared registry vocabulary: keys, values, provenance, options, and errors.

pub mod error;
pub mod key;
pub mod meta;
pub mod options;
pub mod value;

pub use error::{
	ConstraintError, PlacementViolation, RegistryError, TreeError, TypeError, ValidationViolation,
};
pub use key::{ATTR_TYPE, TypeKey, WILDCARD};
pub use meta::{Provenance, RegistrySource};
pub use options::{DuplicatePolicy, PlacementDefault, RegistryOptions};
pub use value::{Value, ValueKind};
