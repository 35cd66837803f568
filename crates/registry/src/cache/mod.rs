//! Hybrid two-tier memoization for hot read paths.
//!
//! # Role
//!
//! Sits in front of tree queries that are pure functions of a sealed generation: child
//! lookup by name, inherited attribute values, derived validator and child lists.
//!
//! # Mental model
//!
//! - The permanent tier holds strong references until the whole cache is cleared.
//! - The derived tier is a bounded LRU. Eviction is invisible to callers: a miss simply
//!   recomputes.
//! - A derived hit for a [`Stability::Stable`] operation is promoted into the permanent tier.
//! - A retired cache keeps only the derived tier: permanent stores and promotions land there
//!   instead, so late readers of a retired generation cannot pin memory again.
//!
//! # Invariants
//!
//! - Emptying the derived tier never changes a query result.
//!   - Enforced in: [`HybridCache::get_or_compute`] (entries are only ever produced by `compute`)
//!   - Tested by: `lifecycle::invariants::test_cache_reclaim_transparency`
//!   - Failure symptom: results change after memory pressure or a capacity change.

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::core::TypeKey;
use crate::tree::NodeId;

#[cfg(test)]
mod tests;

/// What a cached result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheOwner {
	Node(NodeId),
	Type(TypeKey),
	/// Generation-wide results.
	Tree,
}

/// `(owner, operation, args)` key shared by both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub owner: CacheOwner,
	pub operation: &'static str,
	pub args: Arc<str>,
}

impl CacheKey {
	pub fn new(owner: CacheOwner, operation: &'static str, args: impl Into<Arc<str>>) -> Self {
		Self {
			owner,
			operation,
			args: args.into(),
		}
	}

	pub fn node(id: NodeId, operation: &'static str, args: impl Into<Arc<str>>) -> Self {
		Self::new(CacheOwner::Node(id), operation, args)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
	/// Strong; dropped only by [`HybridCache::clear`].
	Permanent,
	/// Reclaimable; may be evicted at any time.
	Derived,
}

/// Whether a result can change without a generation-wide invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
	Stable,
	Volatile,
}

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Default)]
struct Counters {
	permanent_hits: AtomicU64,
	derived_hits: AtomicU64,
	misses: AtomicU64,
	promotions: AtomicU64,
	evictions: AtomicU64,
	clears: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub permanent_hits: u64,
	pub derived_hits: u64,
	/// Lookups that had to run the compute function.
	pub misses: u64,
	pub promotions: u64,
	/// Derived entries pushed out by the capacity bound.
	pub evictions: u64,
	pub clears: u64,
	pub permanent_len: usize,
	pub derived_len: usize,
}

impl CacheStats {
	pub fn hits(&self) -> u64 {
		self.permanent_hits + self.derived_hits
	}

	/// Fraction of lookups served from either tier.
	pub fn hit_ratio(&self) -> f64 {
		let total = self.hits() + self.misses;
		if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
	}
}

pub struct HybridCache {
	permanent: RwLock<FxHashMap<CacheKey, Entry>>,
	derived: Mutex<LruCache<CacheKey, Entry>>,
	counters: Counters,
	retired: AtomicBool,
}

impl std::fmt::Debug for HybridCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HybridCache").field("stats", &self.stats()).finish()
	}
}

impl HybridCache {
	pub fn new(derived_capacity: NonZeroUsize) -> Self {
		Self {
			permanent: RwLock::new(FxHashMap::default()),
			derived: Mutex::new(LruCache::new(derived_capacity)),
			counters: Counters::default(),
			retired: AtomicBool::new(false),
		}
	}

	/// Returns the cached result for `key`, computing and storing it on a miss.
	///
	/// `compute` runs without any cache lock held. If two threads race on the same
	/// permanent key, the first stored value wins and both callers receive it.
	pub fn get_or_compute<T, F>(&self, key: CacheKey, tier: CacheTier, stability: Stability, compute: F) -> Arc<T>
	where
		T: Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		if let Some(hit) = self.permanent.read().get(&key).cloned().and_then(downcast::<T>) {
			self.counters.permanent_hits.fetch_add(1, Ordering::Relaxed);
			return hit;
		}

		let derived_hit = self.derived.lock().get(&key).cloned();
		if let Some(entry) = derived_hit
			&& let Some(hit) = downcast::<T>(entry.clone())
		{
			self.counters.derived_hits.fetch_add(1, Ordering::Relaxed);
			if stability == Stability::Stable {
				let mut permanent = self.permanent.write();
				if !self.is_retired() {
					self.derived.lock().pop(&key);
					permanent.entry(key).or_insert(entry);
					self.counters.promotions.fetch_add(1, Ordering::Relaxed);
				}
			}
			return hit;
		}

		self.counters.misses.fetch_add(1, Ordering::Relaxed);
		trace!(operation = key.operation, ?tier, "cache miss");
		let fresh: Arc<T> = Arc::new(compute());
		let entry: Entry = fresh.clone();
		if tier == CacheTier::Permanent {
			let mut permanent = self.permanent.write();
			if !self.is_retired() {
				let stored = permanent.entry(key).or_insert(entry).clone();
				return downcast::<T>(stored).unwrap_or(fresh);
			}
		}
		self.push_derived(key, entry);
		fresh
	}

	/// Stores `value` in the permanent tier, replacing any previous entry.
	///
	/// After [`HybridCache::retire`] the value goes to the derived tier instead.
	pub fn insert_permanent<T: Send + Sync + 'static>(&self, key: CacheKey, value: T) {
		let entry: Entry = Arc::new(value);
		{
			let mut permanent = self.permanent.write();
			if !self.is_retired() {
				permanent.insert(key, entry);
				return;
			}
		}
		self.push_derived(key, entry);
	}

	fn push_derived(&self, key: CacheKey, entry: Entry) {
		let displaced = self.derived.lock().push(key.clone(), entry);
		if let Some((old_key, _)) = displaced
			&& old_key != key
		{
			self.counters.evictions.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Drops both tiers and stops using the permanent tier for good.
	pub fn retire(&self) {
		self.retired.store(true, Ordering::Release);
		self.clear();
	}

	pub fn is_retired(&self) -> bool {
		self.retired.load(Ordering::Acquire)
	}

	/// Returns a cached value from either tier without computing or promoting.
	pub fn peek<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<T>> {
		if let Some(hit) = self.permanent.read().get(key).cloned() {
			return downcast(hit);
		}
		self.derived.lock().peek(key).cloned().and_then(downcast)
	}

	pub fn tier_of(&self, key: &CacheKey) -> Option<CacheTier> {
		if self.permanent.read().contains_key(key) {
			Some(CacheTier::Permanent)
		} else if self.derived.lock().contains(key) {
			Some(CacheTier::Derived)
		} else {
			None
		}
	}

	/// Drops the reclaimable tier, as memory pressure would.
	pub fn clear_derived(&self) {
		let dropped = {
			let mut derived = self.derived.lock();
			let n = derived.len();
			derived.clear();
			n
		};
		debug!(dropped, "cleared derived cache tier");
	}

	/// Drops both tiers.
	pub fn clear(&self) {
		let permanent = {
			let mut map = self.permanent.write();
			let n = map.len();
			map.clear();
			n
		};
		let derived = {
			let mut lru = self.derived.lock();
			let n = lru.len();
			lru.clear();
			n
		};
		self.counters.clears.fetch_add(1, Ordering::Relaxed);
		debug!(permanent, derived, "cleared cache");
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			permanent_hits: self.counters.permanent_hits.load(Ordering::Relaxed),
			derived_hits: self.counters.derived_hits.load(Ordering::Relaxed),
			misses: self.counters.misses.load(Ordering::Relaxed),
			promotions: self.counters.promotions.load(Ordering::Relaxed),
			evictions: self.counters.evictions.load(Ordering::Relaxed),
			clears: self.counters.clears.load(Ordering::Relaxed),
			permanent_len: self.permanent.read().len(),
			derived_len: self.derived.lock().len(),
		}
	}
}

fn downcast<T: Send + Sync + 'static>(entry: Entry) -> Option<Arc<T>> {
	entry.downcast::<T>().ok()
}
