//! Lifecycle Controller: state machine, generations, and atomic publication.
//!
//! # Mental Model
//!
//! - A [`MetaRegistry`] starts `Empty`, loads one tree, seals it, and serves it as the
//!   active [`Generation`].
//! - Updates are built off to the side in an [`UpdateHandle`] and published with a single
//!   pointer swap. The replaced generation is retired, not destroyed: whoever still holds it
//!   keeps reading it.
//!
//! # Invariants
//!
//! - Weak handles stop upgrading once their generation is swapped out.
//!   - Enforced in: `WeakNodeRef::upgrade`, [`Generation::is_retired`]
//!   - Tested by: `lifecycle::invariants::test_weak_handle_liveness_across_swap`
//!   - Failure symptom: a handle silently reads a tree that is no longer served.

pub mod generation;
pub mod registry;
pub mod state;

#[cfg(any(test, doc))]
pub(crate) mod invariants;

#[cfg(any(test, doc))]
pub(crate) mod test_fixtures;

#[cfg(test)]
mod tests;

pub use generation::Generation;
pub use registry::{MetaRegistry, UpdateHandle};
pub use state::{GenerationId, LifecycleState};
