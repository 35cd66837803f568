use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn cache(capacity: usize) -> HybridCache {
	HybridCache::new(NonZeroUsize::new(capacity).unwrap())
}

fn key(n: u32, op: &'static str) -> CacheKey {
	CacheKey::node(NodeId(n), op, "")
}

#[test]
fn permanent_entries_are_computed_once() {
	let cache = cache(4);
	let calls = AtomicUsize::new(0);
	for _ in 0..3 {
		let v = cache.get_or_compute(key(1, "children.by-name"), CacheTier::Permanent, Stability::Stable, || {
			calls.fetch_add(1, Ordering::SeqCst);
			42u32
		});
		assert_eq!(*v, 42);
	}
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	let stats = cache.stats();
	assert_eq!(stats.misses, 1);
	assert_eq!(stats.permanent_hits, 2);
}

#[test]
fn stable_derived_hits_are_promoted() {
	let cache = cache(4);
	let k = key(1, "attr.resolve");
	cache.get_or_compute(k.clone(), CacheTier::Derived, Stability::Stable, || "v".to_string());
	assert_eq!(cache.tier_of(&k), Some(CacheTier::Derived));

	cache.get_or_compute(k.clone(), CacheTier::Derived, Stability::Stable, || "v".to_string());
	assert_eq!(cache.tier_of(&k), Some(CacheTier::Permanent));
	assert_eq!(cache.stats().promotions, 1);
}

#[test]
fn volatile_derived_hits_stay_reclaimable() {
	let cache = cache(4);
	let k = key(1, "children.of-type");
	cache.get_or_compute(k.clone(), CacheTier::Derived, Stability::Volatile, || vec![1u32, 2]);
	cache.get_or_compute(k.clone(), CacheTier::Derived, Stability::Volatile, || vec![1u32, 2]);
	assert_eq!(cache.tier_of(&k), Some(CacheTier::Derived));
	assert_eq!(cache.stats().derived_hits, 1);
}

#[test]
fn derived_tier_is_bounded() {
	let cache = cache(2);
	for n in 0..5 {
		cache.get_or_compute(key(n, "op"), CacheTier::Derived, Stability::Volatile, || n);
	}
	let stats = cache.stats();
	assert_eq!(stats.derived_len, 2);
	assert_eq!(stats.evictions, 3);
	assert_eq!(cache.tier_of(&key(0, "op")), None);
}

#[test]
fn clearing_derived_only_forces_recompute() {
	let cache = cache(4);
	let calls = AtomicUsize::new(0);
	let compute = || {
		calls.fetch_add(1, Ordering::SeqCst);
		7u8
	};
	let first = cache.get_or_compute(key(3, "op"), CacheTier::Derived, Stability::Volatile, compute);
	cache.clear_derived();
	let second = cache.get_or_compute(key(3, "op"), CacheTier::Derived, Stability::Volatile, compute);
	assert_eq!(first, second);
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn clear_drops_both_tiers() {
	let cache = cache(4);
	cache.insert_permanent(key(1, "a"), 1u8);
	cache.get_or_compute(key(2, "b"), CacheTier::Derived, Stability::Volatile, || 2u8);
	cache.clear();
	let stats = cache.stats();
	assert_eq!((stats.permanent_len, stats.derived_len, stats.clears), (0, 0, 1));
	assert_eq!(cache.peek::<u8>(&key(1, "a")), None);
}

#[test]
fn keys_distinguish_operation_and_args() {
	let cache = cache(4);
	let a = cache.get_or_compute(CacheKey::node(NodeId(1), "op", "x"), CacheTier::Permanent, Stability::Stable, || 1u8);
	let b = cache.get_or_compute(CacheKey::node(NodeId(1), "op", "y"), CacheTier::Permanent, Stability::Stable, || 2u8);
	let c = cache.get_or_compute(CacheKey::node(NodeId(1), "other", "x"), CacheTier::Permanent, Stability::Stable, || 3u8);
	assert_eq!((*a, *b, *c), (1, 2, 3));
}

#[test]
fn retired_cache_never_pins_again() {
	let cache = cache(2);
	cache.insert_permanent(key(1, "a"), 1u8);
	cache.retire();
	assert!(cache.is_retired());
	assert_eq!(cache.stats().permanent_len, 0);

	cache.insert_permanent(key(1, "a"), 1u8);
	let v = cache.get_or_compute(key(2, "b"), CacheTier::Permanent, Stability::Stable, || 2u8);
	assert_eq!(*v, 2);
	// A stable derived hit is served but not promoted.
	cache.get_or_compute(key(2, "b"), CacheTier::Derived, Stability::Stable, || 2u8);
	assert_eq!(cache.tier_of(&key(2, "b")), Some(CacheTier::Derived));

	let stats = cache.stats();
	assert_eq!((stats.permanent_len, stats.derived_len, stats.promotions), (0, 2, 0));
}
