//! In-memory schema registry.
//!
//! # Purpose
//!
//! - Store typed definitions (`type.subtype`) with single inheritance, attribute
//!   declarations, and placement rules.
//! - Enforce placement and validation constraints as a tree of named nodes is built.
//! - Serve the sealed tree to many concurrent readers while replacements are prepared off
//!   to the side and swapped in atomically.
//!
//! # Mental Model
//!
//! - [`types`]: the Type Definition Store. A mutable [`TypeStore`] during loading, frozen
//!   into a [`TypeCatalog`] at seal.
//! - [`constraints`]: the Constraint Engine. Placement rules gate where nodes may attach;
//!   validators gate names and attribute values.
//! - [`tree`]: the Metadata Tree. Producers build it through a [`LoadSession`]; readers see
//!   it through [`NodeView`]s and [`NodeRef`]s.
//! - [`cache`]: the Hybrid Cache in front of each generation's derived queries.
//! - [`lifecycle`]: the [`MetaRegistry`] state machine and its atomically published
//!   [`Generation`]s.
//!
//! # Concurrency
//!
//! Writers are serialized by the registry. Readers load the active generation with one
//! atomic operation and never block on writers. A generation stays readable for as long as
//! someone holds it, even after it has been replaced.
//!
//! # Invariants
//!
//! - Every type's resolved view equals the merge of its ancestry, base to self.
//! - Every sealed tree satisfies every rule registered in its session.
//! - Readers never observe a partially built or partially swapped generation.

pub mod cache;
pub mod constraints;
pub mod core;
pub mod lifecycle;
pub mod tree;
pub mod types;

pub use cache::{CacheKey, CacheOwner, CacheStats, CacheTier, HybridCache, Stability};
pub use constraints::{
	Constraint, ConstraintEngine, ConstraintKind, ConstraintSet, NodeMatcher, Placement,
	UNCONSTRAINED_PLACEMENT_ID, Validator,
};
pub use crate::core::{
	ConstraintError, DuplicatePolicy, PlacementDefault, PlacementViolation, Provenance,
	RegistryError, RegistryOptions, RegistrySource, TreeError, TypeError, TypeKey,
	ValidationViolation, Value, ValueKind,
};
pub use lifecycle::{Generation, GenerationId, LifecycleState, MetaRegistry, UpdateHandle};
pub use tree::{
	ChildStream, LoadSession, NodeId, NodeKind, NodePath, NodeRef, NodeView, WeakNodeRef,
};
pub use types::{
	AttributeSpec, HealthReport, PlacementPattern, ResolvedType, SchemaProvider, TypeCatalog,
	TypeDefinition, TypeExtension, TypeStore,
};
