#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::test_fixtures::{field_base, field_string, object_children, object_pojo, person_registry};
use crate::constraints::{Constraint, NodeMatcher};
use crate::core::{RegistryError, RegistryOptions, Value};
use crate::lifecycle::{LifecycleState, MetaRegistry};
use crate::tree::{LoadSession, NodeRef};

/// Invariant: a rejected `attach` leaves the session exactly as it was.
pub(crate) fn inv_attach_atomicity() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(object_pojo()).unwrap();
	s.register_type(field_base()).unwrap();
	s.register_type(field_string()).unwrap();
	s.add_constraint(object_children()).unwrap();
	s.add_constraint(Constraint::regex("field-names", NodeMatcher::new("field", "*"), "[a-z][A-Za-z0-9]*").unwrap())
		.unwrap();

	let person = s.create_node("object", "pojo", "Person").unwrap();
	let good = s.create_node("field", "string", "email").unwrap();
	let bad_name = s.create_node("field", "string", "Email Address").unwrap();
	let misplaced = s.create_node("field", "string", "inner").unwrap();
	s.attach(person, good).unwrap();
	let nodes_before = s.node_count();

	// Name validation failure.
	assert!(matches!(s.attach(person, bad_name), Err(RegistryError::Validation(_))));
	// Placement failure.
	assert!(matches!(s.attach(good, misplaced), Err(RegistryError::Placement(_))));

	assert_eq!(s.node_count(), nodes_before);
	assert!(s.node(bad_name).unwrap().parent().is_none());
	assert!(s.node(misplaced).unwrap().parent().is_none());
	let children: Vec<_> = s.node(person).unwrap().children().map(|c| c.name()).collect();
	assert_eq!(children, ["email"]);
	assert_eq!(s.node(good).unwrap().children().count(), 0);
}

#[cfg_attr(test, test)]
pub(crate) fn test_attach_atomicity() {
	inv_attach_atomicity()
}

/// Invariant: dropping cached entries never changes what a query returns.
pub(crate) fn inv_cache_reclaim_transparency() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();
	let email = generation.find_child_by_name(person, "email").unwrap();

	let snapshot = |g: &super::Generation| {
		(
			g.find_child_by_name(person, "name"),
			g.resolve_attribute_value(email, "label"),
			g.children_of_type(person, "field.*").unwrap().as_ref().clone(),
			g.applicable_validations(email).len(),
		)
	};

	let warm = snapshot(&generation);
	assert_eq!(warm.1, Some(Value::from("People")));
	generation.cache().clear_derived();
	assert_eq!(snapshot(&generation), warm);
	generation.cache().clear();
	assert_eq!(snapshot(&generation), warm);
}

#[cfg_attr(test, test)]
pub(crate) fn test_cache_reclaim_transparency() {
	inv_cache_reclaim_transparency()
}

/// Invariant: readers observe either the old or the new generation in full, never a mix.
///
/// Each published generation `vN` holds a root labelled `vN` with exactly `N` fields.
pub(crate) fn inv_atomic_update_visibility() {
	const ROUNDS: usize = 24;

	let registry = person_registry();
	let done = AtomicBool::new(false);

	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				while !done.load(Ordering::Acquire) {
					let generation = registry.current().unwrap();
					let person = generation.root("Person").unwrap();
					let Some(Value::String(label)) = generation.get_attribute_value(person, "label") else {
						continue;
					};
					let Some(n) = label.strip_prefix('v').and_then(|n| n.parse::<usize>().ok()) else {
						continue;
					};
					assert_eq!(generation.stream_children(person, "field.*").unwrap().count(), n);
				}
			});
		}

		for n in 1..=ROUNDS {
			let mut update = registry.begin_update().unwrap();
			let person = update.create_node("object", "pojo", "Person").unwrap();
			update.set_attribute_value(person, "label", format!("v{n}")).unwrap();
			for i in 0..n {
				let field = update.create_node("field", "string", format!("f{i}")).unwrap();
				update.attach(person, field).unwrap();
			}
			registry.commit_update(update).unwrap();
		}
		done.store(true, Ordering::Release);
	});

	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();
	assert_eq!(generation.stream_children(person, "*").unwrap().count(), ROUNDS);
}

#[cfg_attr(test, test)]
pub(crate) fn test_atomic_update_visibility() {
	inv_atomic_update_visibility()
}

/// Invariant: once sealed, the producer API refuses every mutation.
pub(crate) fn inv_immutability_after_seal() {
	let registry = person_registry();
	let person = registry.current().unwrap().root("Person").unwrap();

	let expect_immutable = |registry: &MetaRegistry, state: LifecycleState| {
		let checks = [
			registry.create_node("field", "string", "extra").map(|_| ()),
			registry.attach(person, person),
			registry.set_attribute_value(person, "label", "x"),
			registry.register_type(object_pojo()),
			registry.add_constraint(object_children()),
		];
		for result in checks {
			match result {
				Err(RegistryError::ImmutableTree { state: s, .. }) => assert_eq!(s, state),
				other => panic!("expected ImmutableTree in {state}, got {other:?}"),
			}
		}
	};

	expect_immutable(&registry, LifecycleState::Active);
	let update = registry.begin_update().unwrap();
	expect_immutable(&registry, LifecycleState::Updating);
	registry.abort_update(update).unwrap();
	registry.retire().unwrap();
	expect_immutable(&registry, LifecycleState::Retired);
}

#[cfg_attr(test, test)]
pub(crate) fn test_immutability_after_seal() {
	inv_immutability_after_seal()
}

/// Invariant: weak handles upgrade while their generation is active and stop upgrading once
/// it is swapped out; strong handles keep reading the old generation regardless.
pub(crate) fn inv_weak_handle_liveness_across_swap() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();
	let strong = NodeRef::new(generation.clone(), person).unwrap();
	let weak = strong.downgrade();
	drop(generation);

	assert_eq!(weak.upgrade().as_ref(), Some(&strong));

	let update = registry.begin_update_from_current().unwrap();
	registry.commit_update(update).unwrap();

	assert!(weak.upgrade().is_none());
	assert!(strong.generation().is_retired());
	assert_eq!(strong.child("email").map(|c| c.path().to_string()).as_deref(), Some("object:Person(pojo)/field:email(string)"));
	assert_eq!(strong.attribute("label"), Some(&Value::from("People")));

	let fresh = registry.current().unwrap();
	assert!(!Arc::ptr_eq(&fresh, strong.generation()));
	assert!(fresh.root("Person").is_some());
}

#[cfg_attr(test, test)]
pub(crate) fn test_weak_handle_liveness_across_swap() {
	inv_weak_handle_liveness_across_swap()
}
