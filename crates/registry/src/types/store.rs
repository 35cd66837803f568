//! Type Definition Store.
//!
//! # Role
//!
//! The mutable table of type definitions used while a generation is loading, and the
//! immutable [`TypeCatalog`] it freezes into when the generation seals.
//!
//! # Mental model
//!
//! Each key holds the definition as registered (`base`) and the definition currently in
//! effect (`effective`, the base merged with every extension). Registration order is not
//! trusted: a type whose parent is missing is stored anyway and parked in a waiting list
//! keyed by the missing parent. When that parent arrives the parked children are
//! re-validated. Flattened views are computed lazily and memoised until the next mutation
//! that could change them.
//!
//! # Invariants
//!
//! - Identical re-registration is a no-op; a conflicting one is rejected.
//!   - Enforced in: [`TypeStore::register_with`]
//!   - Tested by: `types::tests::identical_registration_is_idempotent`
//!   - Failure symptom: redundant provider discovery fails startup, or silently shadows a type.
//! - Extensions are append-only.
//!   - Enforced in: [`TypeDefinition::merged`](super::def::TypeDefinition)
//!   - Tested by: `types::tests::extend_cannot_override_attribute`
//!   - Failure symptom: a collaborator silently changes an attribute owned by another.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::def::{TypeDefinition, TypeExtension};
use super::health::HealthReport;
use super::resolve::{ResolvedType, flatten};
use crate::core::{ATTR_TYPE, Provenance, TypeError, TypeKey, ValueKind};

#[derive(Debug, Clone)]
pub(crate) struct Entry {
	/// Definition as originally registered.
	base: Arc<TypeDefinition>,
	/// Base merged with every extension applied so far.
	effective: Arc<TypeDefinition>,
	provenance: Provenance,
}

#[derive(Debug, Clone, Default)]
struct StoreInner {
	entries: FxHashMap<TypeKey, Entry>,
	effective: FxHashMap<TypeKey, Arc<TypeDefinition>>,
	order: Vec<TypeKey>,
	/// Missing parent -> children that declared it.
	waiting: FxHashMap<TypeKey, Vec<TypeKey>>,
	resolved: FxHashMap<TypeKey, Arc<ResolvedType>>,
}

impl StoreInner {
	fn insert(&mut self, def: TypeDefinition, provenance: Provenance) {
		let key = def.key().clone();
		let def = Arc::new(def);
		self.effective.insert(key.clone(), def.clone());
		self.entries.insert(
			key.clone(),
			Entry {
				base: def.clone(),
				effective: def,
				provenance,
			},
		);
		self.order.push(key);
	}
}

/// Append-mostly table of type definitions.
#[derive(Debug)]
pub struct TypeStore {
	inner: RwLock<StoreInner>,
}

impl Default for TypeStore {
	fn default() -> Self {
		Self::new()
	}
}

impl TypeStore {
	/// Creates a store seeded with the builtin `attr.<kind>` types.
	pub fn new() -> Self {
		let mut inner = StoreInner::default();
		for kind in ValueKind::ALL {
			let def = TypeDefinition::new(ATTR_TYPE, kind.name()).describe(format!("builtin {kind} attribute"));
			inner.insert(def, Provenance::builtin());
		}
		Self {
			inner: RwLock::new(inner),
		}
	}

	/// Re-opens a frozen catalog for an update session.
	pub fn from_catalog(catalog: &TypeCatalog) -> Self {
		let mut inner = StoreInner::default();
		for key in catalog.order.iter() {
			if let Some(entry) = catalog.entries.get(key) {
				inner.effective.insert(key.clone(), entry.effective.clone());
				inner.entries.insert(key.clone(), entry.clone());
				inner.order.push(key.clone());
			}
		}
		inner.resolved = (*catalog.resolved).clone();
		Self {
			inner: RwLock::new(inner),
		}
	}

	pub fn register(&self, def: TypeDefinition) -> Result<(), TypeError> {
		self.register_with(def, Provenance::runtime())
	}

	/// Registers `def`, recording where it came from.
	///
	/// The parent does not have to exist yet.
	pub fn register_with(&self, def: TypeDefinition, provenance: Provenance) -> Result<(), TypeError> {
		let mut inner = self.inner.write();
		let key = def.key().clone();

		if let Some(existing) = inner.entries.get(&key) {
			if *existing.base == def {
				debug!(key = %key, source = %provenance.source, "identical type re-registration ignored");
				return Ok(());
			}
			return Err(TypeError::Duplicate {
				key,
				existing: existing.provenance.source.clone(),
				incoming: provenance.source,
			});
		}

		if let Some(parent) = def.parent()
			&& !inner.entries.contains_key(parent)
		{
			debug!(key = %key, parent = %parent, "parent not registered yet; deferring resolution");
			inner.waiting.entry(parent.clone()).or_default().push(key.clone());
		}

		debug!(key = %key, source = %provenance.source, priority = provenance.priority, "registered type");
		inner.insert(def, provenance);

		if let Some(children) = inner.waiting.remove(&key) {
			for child in children {
				match flatten(&child, &inner.effective) {
					Ok(_) => debug!(key = %child, parent = %key, "deferred parent resolved"),
					Err(TypeError::UnresolvedParent { missing, .. }) => {
						trace!(key = %child, missing = %missing, "still waiting on an ancestor");
					}
					Err(err) => warn!(key = %child, error = %err, "deferred type failed re-validation"),
				}
			}
		}
		Ok(())
	}

	/// Adds attributes and placement rules to an already registered type.
	pub fn extend(&self, key: &TypeKey, ext: &TypeExtension) -> Result<(), TypeError> {
		let mut inner = self.inner.write();
		let Some(entry) = inner.entries.get(key) else {
			return Err(TypeError::Unknown { key: key.clone() });
		};
		let merged = Arc::new(entry.effective.merged(ext)?);
		if *merged == *entry.effective {
			trace!(key = %key, "extension adds nothing");
			return Ok(());
		}

		// Every chain through `key` that flattens today must still flatten afterwards.
		let mut trial = inner.effective.clone();
		trial.insert(key.clone(), merged.clone());
		for other in &inner.order {
			let Ok(before) = flatten(other, &inner.effective) else {
				continue;
			};
			if !before.is_subtype_of(key) {
				continue;
			}
			if let Err(err) = flatten(other, &trial) {
				warn!(key = %key, affected = %other, error = %err, "extension rejected");
				return Err(err);
			}
		}

		if let Some(entry) = inner.entries.get_mut(key) {
			entry.effective = merged.clone();
		}
		inner.effective.insert(key.clone(), merged);
		// Any flattened view whose chain passes through `key` is stale.
		inner.resolved.retain(|_, r| !r.is_subtype_of(key));
		debug!(key = %key, "extended type");
		Ok(())
	}

	/// Returns the inheritance-flattened view of `key`.
	pub fn resolve(&self, key: &TypeKey) -> Result<Arc<ResolvedType>, TypeError> {
		if let Some(hit) = self.inner.read().resolved.get(key) {
			return Ok(hit.clone());
		}
		let mut inner = self.inner.write();
		if let Some(hit) = inner.resolved.get(key) {
			return Ok(hit.clone());
		}
		let resolved = Arc::new(flatten(key, &inner.effective)?);
		inner.resolved.insert(key.clone(), resolved.clone());
		Ok(resolved)
	}

	/// Returns the definition currently in effect for `key`, without flattening.
	pub fn definition(&self, key: &TypeKey) -> Option<Arc<TypeDefinition>> {
		self.inner.read().effective.get(key).cloned()
	}

	pub fn provenance(&self, key: &TypeKey) -> Option<Provenance> {
		self.inner.read().entries.get(key).map(|e| e.provenance.clone())
	}

	pub fn contains(&self, key: &TypeKey) -> bool {
		self.inner.read().entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.inner.read().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Keys in registration order.
	pub fn keys(&self) -> Vec<TypeKey> {
		self.inner.read().order.clone()
	}

	/// Parents that are referenced but not registered.
	pub fn pending_parents(&self) -> Vec<TypeKey> {
		let inner = self.inner.read();
		let mut missing: Vec<TypeKey> = inner.waiting.keys().cloned().collect();
		missing.sort();
		missing
	}

	/// Resolves every registered type and freezes the store into a catalog.
	///
	/// Returns every inheritance error found; the store itself is left untouched.
	pub fn freeze(&self) -> Result<TypeCatalog, Vec<TypeError>> {
		let inner = self.inner.read();
		let mut resolved = FxHashMap::default();
		let mut errors = Vec::new();
		for key in &inner.order {
			if let Some(hit) = inner.resolved.get(key) {
				resolved.insert(key.clone(), hit.clone());
				continue;
			}
			match flatten(key, &inner.effective) {
				Ok(r) => {
					resolved.insert(key.clone(), Arc::new(r));
				}
				Err(e) => errors.push(e),
			}
		}
		if !errors.is_empty() {
			return Err(errors);
		}
		debug!(count = resolved.len(), "froze type store");
		Ok(TypeCatalog {
			entries: Arc::new(inner.entries.clone()),
			resolved: Arc::new(resolved),
			order: inner.order.clone().into(),
		})
	}

	/// Diagnoses the inheritance graph without failing.
	pub fn health_report(&self) -> HealthReport {
		let inner = self.inner.read();
		let mut report = HealthReport {
			type_count: inner.entries.len(),
			..HealthReport::default()
		};
		let mut ok: Vec<ResolvedType> = Vec::new();
		for key in &inner.order {
			match flatten(key, &inner.effective) {
				Ok(r) => ok.push(r),
				Err(e) => report.errors.push(e),
			}
		}
		report.missing_parents = inner.waiting.keys().cloned().collect();
		report.missing_parents.sort();

		for ty in ok.iter().filter(|t| t.is_abstract()) {
			let has_concrete = ok.iter().any(|other| !other.is_abstract() && other.key() != ty.key() && other.is_subtype_of(ty.key()));
			if !has_concrete {
				report.warnings.push(format!("abstract type {} has no concrete subtypes", ty.key()));
			}
		}
		for ty in ok.iter().filter(|t| !t.is_abstract() && !t.key().is_attr()) {
			if ty.placement().is_empty() {
				report.recommendations.push(format!("type {} declares no placement rules; it can only be a leaf", ty.key()));
			}
		}
		report
	}
}

/// Frozen, shareable view of a type store.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
	entries: Arc<FxHashMap<TypeKey, Entry>>,
	resolved: Arc<FxHashMap<TypeKey, Arc<ResolvedType>>>,
	order: Arc<[TypeKey]>,
}

impl TypeCatalog {
	pub fn resolve(&self, key: &TypeKey) -> Result<Arc<ResolvedType>, TypeError> {
		self.resolved.get(key).cloned().ok_or_else(|| TypeError::Unknown { key: key.clone() })
	}

	pub fn definition(&self, key: &TypeKey) -> Option<&Arc<TypeDefinition>> {
		self.entries.get(key).map(|e| &e.effective)
	}

	pub fn provenance(&self, key: &TypeKey) -> Option<&Provenance> {
		self.entries.get(key).map(|e| &e.provenance)
	}

	pub fn contains(&self, key: &TypeKey) -> bool {
		self.resolved.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Resolved types in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<ResolvedType>> {
		self.order.iter().filter_map(|k| self.resolved.get(k))
	}

	/// Types that have `ancestor` as a strict ancestor.
	pub fn subtypes_of<'a>(&'a self, ancestor: &'a TypeKey) -> impl Iterator<Item = &'a Arc<ResolvedType>> + 'a {
		self.iter().filter(move |t| t.key() != ancestor && t.is_subtype_of(ancestor))
	}
}
