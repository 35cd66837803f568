//! Lifecycle controller with atomic generation publication.
//!
//! # Role
//!
//! [`MetaRegistry`] gates mutation by lifecycle state and publishes sealed generations.
//! The producer calls are only open while loading; afterwards every change goes through an
//! [`UpdateHandle`] built in isolation and published by [`MetaRegistry::commit_update`].
//!
//! # Concurrency
//!
//! Mutating calls are serialized by one mutex around the lifecycle state and the loading
//! session. Readers never touch that mutex: [`MetaRegistry::current`] is a single atomic load
//! of the published generation.
//!
//! # Invariants
//!
//! - Publishing a generation is a single atomic pointer swap; a reader sees either the old
//!   or the new generation in full.
//!   - Enforced in: [`MetaRegistry::commit_update`]
//!   - Tested by: `lifecycle::invariants::test_atomic_update_visibility`
//!   - Failure symptom: a reader observes nodes from two generations at once.
//! - Nothing becomes active unless its seal succeeded.
//!   - Enforced in: [`MetaRegistry::seal`], [`MetaRegistry::commit_update`]
//!   - Tested by: `lifecycle::tests::failed_commit_keeps_old_generation`
//!   - Failure symptom: readers see a partially valid tree.
//! - Producer calls outside `Empty`/`Loading` fail with `ImmutableTree`.
//!   - Enforced in: [`MetaRegistry::with_session`]
//!   - Tested by: `lifecycle::invariants::test_immutability_after_seal`
//!   - Failure symptom: the active tree changes under concurrent readers.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::generation::Generation;
use super::state::{GenerationId, LifecycleState};
use crate::constraints::Constraint;
use crate::core::{RegistryError, RegistryOptions, TypeError, TypeKey, Value};
use crate::tree::{LoadSession, NodeId};
use crate::types::{ResolvedType, SchemaProvider, TypeDefinition, TypeExtension};

#[derive(Debug)]
struct Control {
	state: LifecycleState,
	/// Present in `Empty` and `Loading`.
	session: Option<LoadSession>,
	/// Ticket of the update in flight, if any.
	update: Option<u64>,
}

/// Process-wide schema registry.
#[derive(Debug)]
pub struct MetaRegistry {
	options: Arc<RegistryOptions>,
	control: Mutex<Control>,
	current: ArcSwapOption<Generation>,
	next_generation: AtomicU64,
	next_ticket: AtomicU64,
}

impl Default for MetaRegistry {
	fn default() -> Self {
		Self::new(RegistryOptions::default())
	}
}

impl MetaRegistry {
	pub fn new(options: RegistryOptions) -> Self {
		let options = Arc::new(options);
		Self {
			control: Mutex::new(Control {
				state: LifecycleState::Empty,
				session: Some(LoadSession::new(options.clone())),
				update: None,
			}),
			options,
			current: ArcSwapOption::const_empty(),
			next_generation: AtomicU64::new(1),
			next_ticket: AtomicU64::new(1),
		}
	}

	pub fn options(&self) -> &RegistryOptions {
		&self.options
	}

	pub fn state(&self) -> LifecycleState {
		self.control.lock().state
	}

	/// The active generation. Lock-free.
	pub fn current(&self) -> Result<Arc<Generation>, RegistryError> {
		self.current.load_full().ok_or(RegistryError::NoActiveGeneration)
	}

	pub fn current_generation(&self) -> Option<GenerationId> {
		self.current.load().as_ref().map(|g| g.id())
	}

	fn allocate_generation(&self) -> GenerationId {
		GenerationId(self.next_generation.fetch_add(1, Ordering::Relaxed))
	}

	/// Runs `f` against the loading session if `state` permits `operation`.
	fn with_session<R>(
		&self,
		operation: &'static str,
		allowed: fn(LifecycleState) -> bool,
		f: impl FnOnce(&mut LoadSession) -> Result<R, RegistryError>,
	) -> Result<R, RegistryError> {
		let mut control = self.control.lock();
		let state = control.state;
		match control.session.as_mut() {
			Some(session) if allowed(state) => f(session),
			_ => Err(RegistryError::ImmutableTree { operation, state }),
		}
	}

	pub fn begin_loading(&self) -> Result<(), RegistryError> {
		let mut control = self.control.lock();
		control.state.transition(LifecycleState::Loading)?;
		if control.session.is_none() {
			control.session = Some(LoadSession::new(self.options.clone()));
		}
		Ok(())
	}

	pub fn register_type(&self, def: TypeDefinition) -> Result<(), RegistryError> {
		self.with_session("register a type", LifecycleState::accepts_schema, |s| s.register_type(def))
	}

	pub fn extend_type(&self, key: &TypeKey, ext: &TypeExtension) -> Result<(), RegistryError> {
		self.with_session("extend a type", LifecycleState::accepts_schema, |s| s.extend_type(key, ext))
	}

	pub fn add_constraint(&self, constraint: Constraint) -> Result<(), RegistryError> {
		self.with_session("add a constraint", LifecycleState::accepts_schema, |s| s.add_constraint(constraint))
	}

	/// Installs providers into the loading session.
	///
	/// Providers must not call back into the registry from `install`.
	pub fn install_providers(&self, providers: &[Arc<dyn SchemaProvider>]) -> Result<usize, RegistryError> {
		self.with_session("install providers", LifecycleState::accepts_schema, |s| s.install_providers(providers))
	}

	pub fn create_node(&self, type_name: &str, sub_type: &str, name: &str) -> Result<NodeId, RegistryError> {
		self.with_session("create a node", is_loading, |s| s.create_node(type_name, sub_type, name))
	}

	pub fn attach(&self, parent: NodeId, child: NodeId) -> Result<(), RegistryError> {
		self.with_session("attach", is_loading, |s| s.attach(parent, child))
	}

	pub fn set_attribute_value(&self, node: NodeId, name: &str, value: impl Into<Value>) -> Result<(), RegistryError> {
		self.with_session("set an attribute value", is_loading, |s| s.set_attribute_value(node, name, value))
	}

	/// Seals the loading session and publishes it as the first generation.
	///
	/// On failure the registry returns to `Empty` with a fresh session.
	pub fn seal(&self) -> Result<GenerationId, RegistryError> {
		let mut control = self.control.lock();
		if control.state != LifecycleState::Loading {
			return Err(RegistryError::InvalidTransition {
				from: control.state,
				to: LifecycleState::Active,
			});
		}
		let Some(session) = control.session.take() else {
			return Err(RegistryError::InvalidTransition {
				from: control.state,
				to: LifecycleState::Active,
			});
		};
		let id = self.allocate_generation();
		match session.seal(id) {
			Ok(generation) => {
				self.current.store(Some(Arc::new(generation)));
				control.state.transition(LifecycleState::Active)?;
				info!(generation = %id, "published generation");
				Ok(id)
			}
			Err(err) => {
				control.state.transition(LifecycleState::Empty)?;
				control.session = Some(LoadSession::new(self.options.clone()));
				Err(err)
			}
		}
	}

	/// Starts a full-replacement update: current schema, empty tree.
	pub fn begin_update(&self) -> Result<UpdateHandle, RegistryError> {
		self.start_update(false)
	}

	/// Starts a partial-replacement update: current schema and a copy of the current tree.
	pub fn begin_update_from_current(&self) -> Result<UpdateHandle, RegistryError> {
		self.start_update(true)
	}

	fn start_update(&self, copy_tree: bool) -> Result<UpdateHandle, RegistryError> {
		let mut control = self.control.lock();
		if control.state == LifecycleState::Updating {
			return Err(RegistryError::UpdateInProgress);
		}
		if !control.state.can_transition(LifecycleState::Updating) {
			return Err(RegistryError::InvalidTransition {
				from: control.state,
				to: LifecycleState::Updating,
			});
		}
		let current = self.current()?;
		control.state.transition(LifecycleState::Updating)?;
		let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
		control.update = Some(ticket);
		info!(base = %current.id(), copy_tree, "update started");
		Ok(UpdateHandle {
			session: LoadSession::from_generation(self.options.clone(), &current, copy_tree),
			ticket,
		})
	}

	/// Seals `handle` and atomically swaps it in as the active generation.
	///
	/// A handle forked from a generation that is no longer active fails with `StaleUpdate`.
	/// If sealing fails the old generation stays active and the registry returns to `Active`.
	pub fn commit_update(&self, handle: UpdateHandle) -> Result<GenerationId, RegistryError> {
		let mut control = self.control.lock();
		let actual = self.current_generation();
		if handle.session.base() != actual {
			warn!(expected = ?handle.session.base(), ?actual, "discarding stale update");
			return Err(RegistryError::StaleUpdate {
				expected: handle.session.base(),
				actual,
			});
		}
		match control.update {
			Some(ticket) if ticket == handle.ticket => {}
			Some(_) => return Err(RegistryError::UpdateInProgress),
			None => {
				return Err(RegistryError::InvalidTransition {
					from: control.state,
					to: LifecycleState::Active,
				});
			}
		}
		control.update = None;
		control.state.transition(LifecycleState::Active)?;

		let id = self.allocate_generation();
		match handle.session.seal(id) {
			Ok(generation) => {
				let previous = self.current.swap(Some(Arc::new(generation)));
				if let Some(old) = previous {
					old.retire();
				}
				info!(generation = %id, "published generation");
				Ok(id)
			}
			Err(err) => {
				warn!(error = %err, "update failed to seal; keeping current generation");
				Err(err)
			}
		}
	}

	/// Discards `handle` and returns to `Active`.
	pub fn abort_update(&self, handle: UpdateHandle) -> Result<(), RegistryError> {
		let mut control = self.control.lock();
		if control.update != Some(handle.ticket) {
			return Err(RegistryError::InvalidTransition {
				from: control.state,
				to: LifecycleState::Active,
			});
		}
		control.update = None;
		control.state.transition(LifecycleState::Active)?;
		warn!("update aborted");
		Ok(())
	}

	/// Abandons whatever update is in flight, for hosts that lost their handle.
	pub fn cancel_update(&self) -> Result<(), RegistryError> {
		let mut control = self.control.lock();
		if control.update.take().is_none() {
			return Err(RegistryError::InvalidTransition {
				from: control.state,
				to: LifecycleState::Active,
			});
		}
		control.state.transition(LifecycleState::Active)?;
		warn!("update cancelled");
		Ok(())
	}

	/// Stops serving: unpublishes and retires the active generation.
	pub fn retire(&self) -> Result<(), RegistryError> {
		let mut control = self.control.lock();
		control.state.transition(LifecycleState::Retired)?;
		control.session = None;
		if let Some(old) = self.current.swap(None) {
			old.retire();
		}
		Ok(())
	}

	/// Convenience for `current()?.resolve_type_definition(..)`.
	pub fn resolve_type_definition(&self, type_name: &str, sub_type: &str) -> Result<Arc<ResolvedType>, RegistryError> {
		let generation = self.current()?;
		generation
			.resolve_type_definition(type_name, sub_type)
			.map_err(|e: TypeError| e.into())
	}
}

fn is_loading(state: LifecycleState) -> bool {
	state == LifecycleState::Loading
}

/// Builder for a replacement generation.
///
/// Dereferences to the [`LoadSession`] producer API; nothing built here is visible to
/// readers until [`MetaRegistry::commit_update`] succeeds.
#[derive(Debug)]
pub struct UpdateHandle {
	session: LoadSession,
	ticket: u64,
}

impl Deref for UpdateHandle {
	type Target = LoadSession;

	fn deref(&self) -> &LoadSession {
		&self.session
	}
}

impl DerefMut for UpdateHandle {
	fn deref_mut(&mut self) -> &mut LoadSession {
		&mut self.session
	}
}
