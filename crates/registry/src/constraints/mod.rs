//! Constraint Engine: placement and validation rules.

mod builtin;
pub mod constraint;
pub mod engine;
pub mod matcher;


pub use constraint::{Constraint, ConstraintKind, Placement, Validator};
pub use engine::{ConstraintEngine, ConstraintSet, UNCONSTRAINED_PLACEMENT_ID};
pub use matcher::NodeMatcher;
