//! Sealed generations: the read path.
//!
//! # Role
//!
//! A [`Generation`] is everything one sealed load produced: the node arena, the frozen type
//! catalog, the frozen constraint set, and the hybrid cache in front of them. It is never
//! mutated after construction apart from its cache and its retired flag.
//!
//! # Concurrency
//!
//! All queries take `&self` and are safe to run from any number of threads. Readers hold an
//! `Arc<Generation>`, so a generation outlives the swap that replaces it for as long as
//! someone still reads it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::state::GenerationId;
use crate::cache::{CacheKey, CacheOwner, CacheTier, HybridCache, Stability};
use crate::constraints::{Constraint, ConstraintSet, NodeMatcher};
use crate::core::{RegistryOptions, TreeError, TypeError, TypeKey, Value};
use crate::tree::arena::{Arena, NodeKind};
use crate::tree::view::path_of;
use crate::tree::{ChildStream, NodeId, NodePath, NodeView};
use crate::types::{ResolvedType, TypeCatalog};

const CHILDREN_BY_NAME: &str = "children.by-name";
const ATTR_RESOLVE: &str = "attr.resolve";
const CHILDREN_OF_TYPE: &str = "children.of-type";
const VALIDATORS: &str = "validators";
const SUBTYPES: &str = "type.subtypes";

type ChildIndex = FxHashMap<Arc<str>, NodeId>;

/// One sealed, immutable registry tree.
#[derive(Debug)]
pub struct Generation {
	id: GenerationId,
	arena: Arena,
	roots: Vec<NodeId>,
	types: TypeCatalog,
	constraints: ConstraintSet,
	installed: Vec<Arc<str>>,
	cache: HybridCache,
	retired: AtomicBool,
}

impl Generation {
	pub(crate) fn new(
		id: GenerationId,
		arena: Arena,
		types: TypeCatalog,
		constraints: ConstraintSet,
		installed: Vec<Arc<str>>,
		options: &RegistryOptions,
	) -> Self {
		let roots = arena.roots();
		let generation = Self {
			id,
			arena,
			roots,
			types,
			constraints,
			installed,
			cache: HybridCache::new(options.derived_capacity()),
			retired: AtomicBool::new(false),
		};
		#[cfg(any(debug_assertions, feature = "registry-contracts"))]
		generation.assert_links();
		generation.prime();
		generation
	}

	/// Every parent link must be mirrored by the parent's child or attribute list.
	#[cfg(any(debug_assertions, feature = "registry-contracts"))]
	fn assert_links(&self) {
		for id in self.arena.ids() {
			let Some(data) = self.arena.get(id) else { continue };
			let Some(parent) = data.parent else { continue };
			let linked = self.arena.get(parent).is_some_and(|p| match data.kind {
				NodeKind::Element => p.children.contains(&id),
				NodeKind::Attribute => p.attributes.get(&data.name) == Some(&id),
			});
			assert!(linked, "broken parent link: {id} -> {parent}");
		}
	}

	/// Fills the permanent tier with the structural child indexes.
	fn prime(&self) {
		let mut primed = 0usize;
		for id in self.arena.ids() {
			let Some(data) = self.arena.get(id) else { continue };
			if data.kind != NodeKind::Element || data.children.is_empty() {
				continue;
			}
			self.cache.insert_permanent(CacheKey::node(id, CHILDREN_BY_NAME, ""), self.build_child_index(id));
			primed += 1;
		}
		self.cache.insert_permanent(CacheKey::new(CacheOwner::Tree, CHILDREN_BY_NAME, ""), self.build_root_index());
		debug!(generation = %self.id, primed, "primed permanent cache");
	}

	fn build_child_index(&self, parent: NodeId) -> ChildIndex {
		let mut index = ChildIndex::default();
		if let Some(data) = self.arena.get(parent) {
			for child in &data.children {
				if let Some(c) = self.arena.get(*child) {
					index.insert(c.name.clone(), *child);
				}
			}
		}
		index
	}

	fn build_root_index(&self) -> ChildIndex {
		let mut index = ChildIndex::default();
		for root in &self.roots {
			if let Some(r) = self.arena.get(*root) {
				// First root wins when detached nodes share a name.
				index.entry(r.name.clone()).or_insert(*root);
			}
		}
		index
	}

	pub fn id(&self) -> GenerationId {
		self.id
	}

	pub fn types(&self) -> &TypeCatalog {
		&self.types
	}

	pub fn constraints(&self) -> &ConstraintSet {
		&self.constraints
	}

	pub fn cache(&self) -> &HybridCache {
		&self.cache
	}

	pub(crate) fn arena(&self) -> &Arena {
		&self.arena
	}

	/// Ids of the schema providers installed into this generation.
	pub fn installed_providers(&self) -> &[Arc<str>] {
		&self.installed
	}

	pub fn node_count(&self) -> usize {
		self.arena.len()
	}

	pub fn is_retired(&self) -> bool {
		self.retired.load(Ordering::Acquire)
	}

	/// Marks the generation retired and drops its cache.
	///
	/// Readers still holding the generation keep working; their lookups are served from the
	/// bounded derived tier only.
	pub(crate) fn retire(&self) {
		if self.retired.swap(true, Ordering::AcqRel) {
			return;
		}
		self.cache.retire();
		info!(generation = %self.id, "generation retired");
	}

	pub fn resolve_type_definition(&self, type_name: &str, sub_type: &str) -> Result<Arc<ResolvedType>, TypeError> {
		self.types.resolve(&TypeKey::new(type_name, sub_type))
	}

	pub fn node(&self, id: NodeId) -> Option<NodeView<'_>> {
		NodeView::of(&self.arena, id)
	}

	pub fn path(&self, id: NodeId) -> NodePath {
		path_of(&self.arena, id)
	}

	/// Detached element nodes, in creation order.
	pub fn roots(&self) -> &[NodeId] {
		&self.roots
	}

	pub fn root(&self, name: &str) -> Option<NodeId> {
		let index = self.cache.get_or_compute(
			CacheKey::new(CacheOwner::Tree, CHILDREN_BY_NAME, ""),
			CacheTier::Permanent,
			Stability::Stable,
			|| self.build_root_index(),
		);
		index.get(name).copied()
	}

	pub fn find_child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
		let index = self.cache.get_or_compute(
			CacheKey::node(parent, CHILDREN_BY_NAME, ""),
			CacheTier::Permanent,
			Stability::Stable,
			|| self.build_child_index(parent),
		);
		index.get(name).copied()
	}

	pub fn require_child_by_name(&self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
		if self.arena.get(parent).is_none() {
			return Err(TreeError::UnknownNode { id: parent });
		}
		self.find_child_by_name(parent, name).ok_or_else(|| TreeError::ChildNotFound {
			parent: self.path(parent),
			name: Arc::from(name),
		})
	}

	/// The node's own value for `name`.
	pub fn get_attribute_value(&self, node: NodeId, name: &str) -> Option<&Value> {
		let attr = *self.arena.get(node)?.attributes.get(name)?;
		self.arena.get(attr)?.value.as_ref()
	}

	/// The node's own value for `name`, or the nearest ancestor's.
	pub fn resolve_attribute_value(&self, node: NodeId, name: &str) -> Option<Value> {
		let resolved = self.cache.get_or_compute(CacheKey::node(node, ATTR_RESOLVE, name), CacheTier::Derived, Stability::Stable, || {
			let mut cursor = Some(node);
			while let Some(id) = cursor {
				if let Some(v) = self.get_attribute_value(id, name) {
					return Some(v.clone());
				}
				cursor = self.arena.get(id).and_then(|d| d.parent);
			}
			None
		});
		(*resolved).clone()
	}

	/// Lazily iterates `parent`'s children matching `filter` (`field`, `field.string`, `*`).
	///
	/// The stream is finite and can be restarted or cloned. A malformed filter is an error,
	/// never a wildcard.
	pub fn stream_children(&self, parent: NodeId, filter: &str) -> Result<ChildStream<'_>, TreeError> {
		let matcher = NodeMatcher::parse(filter).ok_or_else(|| TreeError::InvalidFilter { filter: filter.into() })?;
		let children = self.arena.get(parent).map(|d| d.children.as_slice()).unwrap_or(&[]);
		Ok(ChildStream::new(&self.arena, children, matcher))
	}

	/// Materialized, cached form of [`Generation::stream_children`].
	pub fn children_of_type(&self, parent: NodeId, filter: &str) -> Result<Arc<Vec<NodeId>>, TreeError> {
		let stream = self.stream_children(parent, filter)?;
		Ok(self.cache.get_or_compute(CacheKey::node(parent, CHILDREN_OF_TYPE, filter), CacheTier::Derived, Stability::Volatile, || {
			stream.filter_map(|v| v.id()).collect()
		}))
	}

	/// Validation constraints that apply to `node`.
	pub fn applicable_validations(&self, node: NodeId) -> Arc<Vec<Constraint>> {
		self.cache.get_or_compute(CacheKey::node(node, VALIDATORS, ""), CacheTier::Derived, Stability::Stable, || {
			self.node(node).map(|v| self.constraints.validators_for(&v)).unwrap_or_default()
		})
	}

	/// Registered strict subtypes of `key`.
	pub fn subtypes_of(&self, key: &TypeKey) -> Arc<Vec<TypeKey>> {
		self.cache.get_or_compute(CacheKey::new(CacheOwner::Type(key.clone()), SUBTYPES, ""), CacheTier::Derived, Stability::Stable, || {
			self.types.subtypes_of(key).map(|t| t.key().clone()).collect()
		})
	}

	/// Walks `segments` by name: the first names a root, each following one a child.
	pub fn find_by_path(&self, segments: &[&str]) -> Option<NodeId> {
		let (first, rest) = segments.split_first()?;
		let mut cursor = self.root(first)?;
		for name in rest {
			cursor = self.find_child_by_name(cursor, name)?;
		}
		Some(cursor)
	}
}
