//! Producer side of the metadata tree.
//!
//! # Role
//!
//! A [`LoadSession`] owns everything a generation is built from: its type store, its
//! constraint engine, and its node arena. Producers mutate it through the calls below;
//! [`LoadSession::seal`] consumes it and yields an immutable [`Generation`].
//!
//! # Invariants
//!
//! - Every mutating call either succeeds completely or leaves the session unchanged.
//!   - Enforced in: [`LoadSession::attach`], [`LoadSession::set_attribute_value`]
//!   - Tested by: `lifecycle::invariants::test_attach_atomicity`
//!   - Failure symptom: a rejected child still shows up under its parent.
//! - Placement is checked before attribute surface, which is checked before name
//!   validation.
//!   - Enforced in: [`LoadSession::attach`]
//!   - Tested by: `tree::tests::attach_reports_placement_before_validation`
//!   - Failure symptom: a structurally illegal child is reported as a content error.
//! - A sealed generation satisfies every type, placement, and validation rule registered
//!   in its session, regardless of the order in which they were registered.
//!   - Enforced in: [`LoadSession::seal`]
//!   - Tested by: `tree::tests::seal_revalidates_late_rules`
//!   - Failure symptom: a rule added after a node was attached is silently ignored.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{debug, error, trace, warn};

use super::arena::{Arena, NodeId, NodeKind};
use super::path::NodePath;
use super::view::{NodeView, path_of};
use crate::constraints::{Constraint, ConstraintEngine};
use crate::core::{
	Provenance, RegistryError, RegistryOptions, TreeError, TypeError, TypeKey, ValidationViolation,
	Value,
};
use crate::lifecycle::{Generation, GenerationId};
use crate::types::source::{Party, cmp_party};
use crate::types::{AttributeSpec, ResolvedType, SchemaProvider, TypeCatalog, TypeDefinition, TypeExtension, TypeStore};

/// Constraint id reported when a value does not fit its attribute's declared kind.
pub const ATTRIBUTE_KIND_ID: &str = "attr.kind";

/// An attribute value parked until its owner's type can be resolved.
#[derive(Debug, Clone)]
struct Deferred {
	node: NodeId,
	name: Arc<str>,
	value: Value,
}

/// Builder state for one generation.
#[derive(Debug)]
pub struct LoadSession {
	options: Arc<RegistryOptions>,
	types: TypeStore,
	constraints: ConstraintEngine,
	arena: Arena,
	provenance: Provenance,
	installed: FxHashSet<Arc<str>>,
	next_ordinal: u32,
	/// Strict-mode failures that must fail the seal even though the call was rejected.
	fatal: Vec<RegistryError>,
	deferred: Vec<Deferred>,
	base: Option<GenerationId>,
}

impl LoadSession {
	/// Starts an empty session with only the builtin attribute types.
	pub fn new(options: Arc<RegistryOptions>) -> Self {
		let constraints = ConstraintEngine::new(&options);
		Self {
			options,
			types: TypeStore::new(),
			constraints,
			arena: Arena::default(),
			provenance: Provenance::runtime(),
			installed: FxHashSet::default(),
			next_ordinal: 0,
			fatal: Vec::new(),
			deferred: Vec::new(),
			base: None,
		}
	}

	/// Starts an update session carrying `generation`'s schema, and its tree if `copy_tree`.
	pub(crate) fn from_generation(options: Arc<RegistryOptions>, generation: &Generation, copy_tree: bool) -> Self {
		let arena = if copy_tree { generation.arena().clone() } else { Arena::default() };
		Self {
			options,
			types: TypeStore::from_catalog(generation.types()),
			constraints: ConstraintEngine::from_set(generation.constraints()),
			arena,
			provenance: Provenance::runtime(),
			installed: generation.installed_providers().iter().cloned().collect(),
			next_ordinal: 0,
			fatal: Vec::new(),
			deferred: Vec::new(),
			base: Some(generation.id()),
		}
	}

	/// Generation this session was forked from, if it is an update.
	pub fn base(&self) -> Option<GenerationId> {
		self.base
	}

	pub fn options(&self) -> &RegistryOptions {
		&self.options
	}

	pub fn types(&self) -> &TypeStore {
		&self.types
	}

	pub fn constraints(&self) -> &ConstraintEngine {
		&self.constraints
	}

	pub fn node_count(&self) -> usize {
		self.arena.len()
	}

	pub fn register_type(&mut self, def: TypeDefinition) -> Result<(), RegistryError> {
		Ok(self.types.register_with(def, self.provenance.clone())?)
	}

	pub fn extend_type(&mut self, key: &TypeKey, ext: &TypeExtension) -> Result<(), RegistryError> {
		Ok(self.types.extend(key, ext)?)
	}

	pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), RegistryError> {
		Ok(self.constraints.add_constraint(constraint)?)
	}

	/// Installs providers in `(priority, source, discovery order)` order.
	///
	/// A provider whose id was already installed in this session (or the generation it was
	/// forked from) is skipped.
	pub fn install_providers(&mut self, providers: &[Arc<dyn SchemaProvider>]) -> Result<usize, RegistryError> {
		let mut queue: Vec<(Party, &Arc<dyn SchemaProvider>)> = providers
			.iter()
			.map(|p| {
				let party = Party::of(p.as_ref(), self.next_ordinal);
				self.next_ordinal += 1;
				(party, p)
			})
			.collect();
		queue.sort_by(|a, b| cmp_party(&a.0, &b.0));

		let mut installed = 0;
		for (party, provider) in queue {
			let id: Arc<str> = Arc::from(provider.id());
			if self.installed.contains(&id) {
				debug!(provider = %id, "provider already installed; skipping");
				continue;
			}
			let previous = std::mem::replace(&mut self.provenance, party.provenance());
			let result = provider.install(self);
			self.provenance = previous;
			result?;
			debug!(provider = %id, priority = party.priority, "installed provider");
			self.installed.insert(id);
			installed += 1;
		}
		Ok(installed)
	}

	/// Creates a detached element node of a registered, concrete type.
	pub fn create_node(&mut self, type_name: &str, sub_type: &str, name: impl Into<Arc<str>>) -> Result<NodeId, RegistryError> {
		let key = TypeKey::new(type_name, sub_type);
		let name = name.into();
		let Some(def) = self.types.definition(&key) else {
			return Err(TypeError::Unknown { key }.into());
		};
		if def.is_abstract() {
			return Err(TypeError::Abstract { key }.into());
		}
		if key.is_attr() {
			return Err(TreeError::NotAnElement {
				path: NodePath::default().child(key, name),
			}
			.into());
		}
		let id = self.arena.push(key, name, NodeKind::Element, None);
		trace!(node = %id, "created node");
		Ok(id)
	}

	/// Read-only view of a node in this session.
	pub fn node(&self, id: NodeId) -> Option<NodeView<'_>> {
		NodeView::of(&self.arena, id)
	}

	pub fn path(&self, id: NodeId) -> NodePath {
		path_of(&self.arena, id)
	}

	fn element(&self, id: NodeId) -> Result<NodeView<'_>, TreeError> {
		let view = NodeView::of(&self.arena, id).ok_or(TreeError::UnknownNode { id })?;
		if view.is_attribute() {
			return Err(TreeError::NotAnElement { path: view.path() });
		}
		Ok(view)
	}

	/// Links `child` under `parent`.
	///
	/// Runs placement checks, then the attribute surface check for values set on the child
	/// before its type could be resolved, then name validation. Nothing changes on failure.
	pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), RegistryError> {
		let parent_view = self.element(parent)?;
		let child_view = self.element(child)?;

		if child_view.parent().is_some() {
			return Err(TreeError::AlreadyAttached { path: child_view.path() }.into());
		}
		if self.arena.is_ancestor_or_self(child, parent) {
			return Err(TreeError::AttachCycle { path: child_view.path() }.into());
		}
		if parent_view.children().any(|c| c.name() == child_view.name()) {
			return Err(TreeError::DuplicateChild {
				parent: parent_view.path(),
				name: Arc::from(child_view.name()),
			}
			.into());
		}

		let parent_type = self.types.resolve(parent_view.key())?;
		let child_type = self.types.resolve(child_view.key())?;
		if child_type.is_abstract() {
			return Err(TypeError::Abstract {
				key: child_type.key().clone(),
			}
			.into());
		}

		let prospective = child_view.with_parent(parent);
		self.constraints.check_placement(&parent_view, &parent_type, &prospective)?;

		let mut accepted = Vec::new();
		let mut rejected = Vec::new();
		for (idx, d) in self.deferred.iter().enumerate().filter(|(_, d)| d.node == child) {
			match self.check_attribute(&child_type, child, &d.name, &d.value) {
				Ok(spec) => accepted.push((idx, spec)),
				Err(RegistryError::Tree(err @ TreeError::UnknownAttribute { .. })) if !self.options.strict_attributes => {
					warn!(error = %err, "dropping unknown attribute");
					rejected.push(idx);
				}
				Err(err) => {
					if matches!(err, RegistryError::Tree(TreeError::UnknownAttribute { .. })) {
						self.fatal.push(err.clone());
					}
					return Err(err);
				}
			}
		}

		let name = Value::String(child_view.name().to_string());
		self.constraints.check_validation(&prospective, &name)?;

		// All checks passed; link and flush deferred values.
		if let Some(data) = self.arena.get_mut(child) {
			data.parent = Some(parent);
		}
		if let Some(data) = self.arena.get_mut(parent) {
			data.children.push(child);
		}
		let mut flushed = Vec::new();
		for (idx, spec) in accepted {
			let d = self.deferred[idx].clone();
			flushed.push(idx);
			self.write_attribute(child, d.name, spec, d.value);
		}
		flushed.extend(rejected);
		let mut idx = 0;
		self.deferred.retain(|_| {
			let keep = !flushed.contains(&idx);
			idx += 1;
			keep
		});
		trace!(parent = %parent, child = %child, "attached");
		Ok(())
	}

	/// Writes an attribute value after running kind and validation checks.
	///
	/// If the node's type cannot be resolved yet because an ancestor type is missing, the
	/// value is parked and checked when the node is attached or the session seals.
	pub fn set_attribute_value(&mut self, node: NodeId, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Result<(), RegistryError> {
		let name = name.into();
		let value = value.into();
		let view = self.element(node)?;
		let ty = match self.types.resolve(view.key()) {
			Ok(ty) => ty,
			Err(TypeError::UnresolvedParent { missing, .. }) => {
				debug!(node = %node, attribute = %name, missing = %missing, "owner type unresolved; deferring value");
				self.deferred.retain(|d| !(d.node == node && d.name == name));
				self.deferred.push(Deferred { node, name, value });
				return Ok(());
			}
			Err(err) => return Err(err.into()),
		};
		match self.check_attribute(&ty, node, &name, &value) {
			Ok(spec) => {
				// A parked value for the same slot is older than this one.
				self.deferred.retain(|d| !(d.node == node && d.name == name));
				self.write_attribute(node, name, spec, value);
				Ok(())
			}
			Err(err) => {
				if self.options.strict_attributes && matches!(err, RegistryError::Tree(TreeError::UnknownAttribute { .. })) {
					self.fatal.push(err.clone());
				} else if let RegistryError::Tree(e @ TreeError::UnknownAttribute { .. }) = &err {
					warn!(error = %e, "rejected unknown attribute");
				}
				Err(err)
			}
		}
	}

	/// Surface, kind, and validation checks for one attribute value.
	fn check_attribute(&self, ty: &ResolvedType, node: NodeId, name: &Arc<str>, value: &Value) -> Result<AttributeSpec, RegistryError> {
		let Some(spec) = ty.attribute(name) else {
			return Err(TreeError::UnknownAttribute {
				path: path_of(&self.arena, node),
				attribute: name.clone(),
				suggestion: suggest_attribute(ty, name),
			}
			.into());
		};
		let attr_key = TypeKey::attr(spec.kind);
		let view = NodeView::transient_attribute(&self.arena, node, &attr_key, name);
		if !value.matches_kind(spec.kind) {
			return Err(ValidationViolation {
				constraint_id: Arc::from(ATTRIBUTE_KIND_ID),
				path: view.path(),
				description: format!("expected a {} value, got {}", spec.kind, value.kind()),
				value: Some(value.clone()),
			}
			.into());
		}
		self.constraints.check_validation(&view, value)?;
		Ok(spec)
	}

	fn write_attribute(&mut self, node: NodeId, name: Arc<str>, spec: AttributeSpec, value: Value) {
		let existing = self.arena.get(node).and_then(|d| d.attributes.get(&name).copied());
		match existing {
			Some(attr) => {
				if let Some(data) = self.arena.get_mut(attr) {
					data.value = Some(value);
				}
			}
			None => {
				let attr = self.arena.push(TypeKey::attr(spec.kind), name.clone(), NodeKind::Attribute, Some(value));
				if let Some(data) = self.arena.get_mut(attr) {
					data.parent = Some(node);
				}
				if let Some(data) = self.arena.get_mut(node) {
					data.attributes.insert(name, attr);
				}
			}
		}
	}

	/// Freezes the session into generation `id`.
	///
	/// Resolves every type, re-runs every structural, placement, and validation check over
	/// the final tree, and enforces required attributes. Any problem fails the whole seal.
	pub fn seal(mut self, id: GenerationId) -> Result<Generation, RegistryError> {
		let mut problems = std::mem::take(&mut self.fatal);
		let catalog = match self.types.freeze() {
			Ok(catalog) => Some(catalog),
			Err(errors) => {
				problems.extend(errors.into_iter().map(RegistryError::from));
				None
			}
		};

		if let Some(catalog) = &catalog {
			self.flush_deferred(catalog, &mut problems);
			self.revalidate(catalog, &mut problems);
		}

		let Some(catalog) = catalog.filter(|_| problems.is_empty()) else {
			let samples: Vec<String> = problems.iter().take(5).map(ToString::to_string).collect();
			error!(generation = %id, count = problems.len(), ?samples, "seal failed");
			return Err(RegistryError::SealFailed { problems });
		};

		debug!(
			generation = %id,
			types = catalog.len(),
			constraints = self.constraints.len(),
			nodes = self.arena.len(),
			"sealed generation"
		);
		Ok(Generation::new(
			id,
			self.arena,
			catalog,
			self.constraints.freeze(),
			self.installed.into_iter().collect(),
			&self.options,
		))
	}

	/// Writes parked values now that every type resolves.
	fn flush_deferred(&mut self, catalog: &TypeCatalog, problems: &mut Vec<RegistryError>) {
		for d in std::mem::take(&mut self.deferred) {
			let Some(key) = self.arena.get(d.node).map(|n| n.key.clone()) else { continue };
			let ty = match catalog.resolve(&key) {
				Ok(ty) => ty,
				Err(err) => {
					problems.push(err.into());
					continue;
				}
			};
			match self.check_attribute(&ty, d.node, &d.name, &d.value) {
				Ok(spec) => self.write_attribute(d.node, d.name, spec, d.value),
				Err(RegistryError::Tree(err @ TreeError::UnknownAttribute { .. })) if !self.options.strict_attributes => {
					warn!(error = %err, "dropping unknown attribute");
				}
				Err(err) => problems.push(err),
			}
		}
	}

	fn revalidate(&self, catalog: &TypeCatalog, problems: &mut Vec<RegistryError>) {
		for id in self.arena.ids() {
			let Some(view) = NodeView::of(&self.arena, id) else { continue };
			if view.is_attribute() {
				continue;
			}
			let ty = match catalog.resolve(view.key()) {
				Ok(ty) => ty,
				Err(err) => {
					problems.push(err.into());
					continue;
				}
			};
			if ty.is_abstract() {
				problems.push(TypeError::Abstract { key: ty.key().clone() }.into());
				continue;
			}

			if let Some(parent) = view.parent() {
				match catalog.resolve(parent.key()) {
					Ok(parent_type) => {
						if let Err(v) = self.constraints.check_placement(&parent, &parent_type, &view) {
							problems.push(v.into());
						}
					}
					Err(err) => problems.push(err.into()),
				}
				if let Err(v) = self.constraints.check_validation(&view, &Value::String(view.name().to_string())) {
					problems.push(v.into());
				}
			}

			let Some(data) = self.arena.get(id) else { continue };
			for (name, attr) in &data.attributes {
				let Some(value) = self.arena.get(*attr).and_then(|a| a.value.as_ref()) else { continue };
				if let Err(err) = self.check_attribute(&ty, id, name, value) {
					problems.push(err);
				}
			}
			for required in ty.required_attributes() {
				if !data.attributes.contains_key(required) {
					problems.push(
						TreeError::MissingRequiredAttribute {
							path: view.path(),
							attribute: required.clone(),
						}
						.into(),
					);
				}
			}
		}
	}
}

/// Closest declared attribute name within three edits.
fn suggest_attribute(ty: &ResolvedType, name: &str) -> Option<Arc<str>> {
	ty.attributes()
		.keys()
		.min_by_key(|k| strsim::levenshtein(name, k))
		.filter(|k| strsim::levenshtein(name, k) <= 3)
		.cloned()
}
