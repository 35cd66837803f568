use std::sync::Arc;

use super::test_fixtures::{field_base, field_string, loading_registry, object_children, object_pojo, person_registry};
use super::*;
use crate::cache::{CacheKey, CacheTier};
use crate::constraints::{Constraint, NodeMatcher};
use crate::core::{RegistryError, RegistryOptions, TreeError, TypeError, TypeKey, Value, ValueKind};
use crate::tree::{LoadSession, NodeRef};
use crate::types::{AttributeSpec, SchemaProvider, TypeDefinition};

#[test]
fn state_machine_walks_the_happy_path() {
	let registry = MetaRegistry::default();
	assert_eq!(registry.state(), LifecycleState::Empty);
	registry.register_type(object_pojo()).unwrap();

	let err = registry.create_node("object", "pojo", "Person").unwrap_err();
	assert_eq!(
		err,
		RegistryError::ImmutableTree {
			operation: "create a node",
			state: LifecycleState::Empty,
		}
	);

	registry.begin_loading().unwrap();
	registry.create_node("object", "pojo", "Person").unwrap();
	let id = registry.seal().unwrap();
	assert_eq!(id.get(), 1);
	assert_eq!(registry.state(), LifecycleState::Active);
	assert_eq!(registry.current_generation(), Some(id));
	assert!(registry.current().unwrap().root("Person").is_some());
}

#[test]
fn seal_requires_loading() {
	let registry = MetaRegistry::default();
	assert!(matches!(
		registry.seal(),
		Err(RegistryError::InvalidTransition {
			from: LifecycleState::Empty,
			to: LifecycleState::Active,
		})
	));
	assert_eq!(registry.current().unwrap_err(), RegistryError::NoActiveGeneration);
}

#[test]
fn failed_seal_returns_to_empty_with_fresh_session() {
	let registry = loading_registry();
	registry
		.register_type(TypeDefinition::new("object", "entity").attribute("table", AttributeSpec::required(ValueKind::String)))
		.unwrap();
	registry.create_node("object", "entity", "Order").unwrap();

	let err = registry.seal().unwrap_err();
	let RegistryError::SealFailed { problems } = &err else {
		panic!("expected seal failure, got {err:?}");
	};
	assert_eq!(problems.len(), 1);
	assert_eq!(registry.state(), LifecycleState::Empty);
	assert!(registry.current_generation().is_none());

	// The failed session's schema is gone.
	registry.register_type(object_pojo()).unwrap();
	registry.begin_loading().unwrap();
	let err = registry.create_node("object", "entity", "Order").unwrap_err();
	assert!(matches!(err, RegistryError::Type(TypeError::Unknown { .. })));
}

#[test]
fn full_update_replaces_the_tree_but_keeps_the_schema() {
	let registry = person_registry();
	let old = registry.current().unwrap();

	let mut update = registry.begin_update().unwrap();
	assert_eq!(registry.state(), LifecycleState::Updating);
	assert_eq!(update.base(), Some(old.id()));
	assert_eq!(update.node_count(), 0);
	let order = update.create_node("object", "pojo", "Order").unwrap();
	let total = update.create_node("field", "string", "total").unwrap();
	update.attach(order, total).unwrap();

	// Readers still see the old tree while the update is open.
	assert!(registry.current().unwrap().root("Order").is_none());

	let id = registry.commit_update(update).unwrap();
	assert_eq!(id.get(), 2);
	assert_eq!(registry.state(), LifecycleState::Active);

	let new = registry.current().unwrap();
	assert!(new.root("Person").is_none());
	assert!(new.find_by_path(&["Order", "total"]).is_some());
	assert!(old.is_retired());
	assert!(old.root("Person").is_some());
}

#[test]
fn partial_update_copies_the_current_tree() {
	let registry = person_registry();
	let old = registry.current().unwrap();
	let person = old.root("Person").unwrap();

	let mut update = registry.begin_update_from_current().unwrap();
	let age = update.create_node("field", "string", "age").unwrap();
	update.attach(person, age).unwrap();
	registry.commit_update(update).unwrap();

	let new = registry.current().unwrap();
	let names: Vec<_> = new.stream_children(person, "field.*").unwrap().map(|c| c.name().to_string()).collect();
	assert_eq!(names, ["email", "name", "age"]);
	assert_eq!(old.stream_children(person, "field.*").unwrap().count(), 2);
}

#[test]
fn only_one_update_in_flight() {
	let registry = person_registry();
	let first = registry.begin_update().unwrap();
	assert_eq!(registry.begin_update().unwrap_err(), RegistryError::UpdateInProgress);
	registry.abort_update(first).unwrap();
	assert_eq!(registry.state(), LifecycleState::Active);
	registry.begin_update().unwrap();
	registry.cancel_update().unwrap();
	assert_eq!(registry.state(), LifecycleState::Active);
}

#[test]
fn begin_update_requires_active() {
	let registry = MetaRegistry::default();
	assert!(matches!(
		registry.begin_update(),
		Err(RegistryError::InvalidTransition {
			from: LifecycleState::Empty,
			to: LifecycleState::Updating,
		})
	));
}

#[test]
fn failed_commit_keeps_old_generation() {
	let registry = person_registry();
	let before = registry.current_generation();

	let mut update = registry.begin_update_from_current().unwrap();
	update
		.register_type(TypeDefinition::new("object", "entity").attribute("table", AttributeSpec::required(ValueKind::String)))
		.unwrap();
	update.create_node("object", "entity", "Order").unwrap();

	let err = registry.commit_update(update).unwrap_err();
	assert!(matches!(err, RegistryError::SealFailed { .. }));
	assert_eq!(registry.state(), LifecycleState::Active);
	assert_eq!(registry.current_generation(), before);
	assert!(!registry.current().unwrap().is_retired());
	assert!(registry.resolve_type_definition("object", "entity").is_err());
}

#[test]
fn stale_update_is_refused() {
	let registry = person_registry();
	let stale = registry.begin_update().unwrap();
	registry.cancel_update().unwrap();

	let fresh = registry.begin_update_from_current().unwrap();
	let published = registry.commit_update(fresh).unwrap();

	let err = registry.commit_update(stale).unwrap_err();
	assert!(matches!(
		err,
		RegistryError::StaleUpdate { actual: Some(actual), .. } if actual == published
	));
	assert_eq!(registry.current_generation(), Some(published));
}

#[test]
fn retire_unpublishes_the_generation() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	registry.retire().unwrap();
	assert_eq!(registry.state(), LifecycleState::Retired);
	assert_eq!(registry.current().unwrap_err(), RegistryError::NoActiveGeneration);
	assert!(generation.is_retired());
	assert!(registry.begin_loading().is_err());
}

#[test]
fn retired_generation_reads_without_repinning() {
	let registry = person_registry();
	let old = registry.current().unwrap();
	let person = old.root("Person").unwrap();
	let update = registry.begin_update_from_current().unwrap();
	registry.commit_update(update).unwrap();
	assert!(old.is_retired());

	let email = old.find_child_by_name(person, "email").unwrap();
	assert_eq!(old.resolve_attribute_value(email, "label"), Some(Value::from("People")));
	assert_eq!(old.resolve_attribute_value(email, "label"), Some(Value::from("People")));
	assert_eq!(old.children_of_type(person, "field.*").unwrap().len(), 2);

	let stats = old.cache().stats();
	assert_eq!(stats.permanent_len, 0);
	assert!(stats.derived_len > 0);
	assert!(old.cache().is_retired());
}

#[test]
fn providers_install_through_the_registry() {
	#[derive(Debug)]
	struct Fields;

	impl SchemaProvider for Fields {
		fn id(&self) -> &str {
			"fields"
		}

		fn install(&self, session: &mut LoadSession) -> Result<(), RegistryError> {
			session.register_type(field_base())?;
			session.register_type(field_string())?;
			session.add_constraint(object_children())
		}
	}

	let registry = MetaRegistry::default();
	registry.register_type(object_pojo()).unwrap();
	let providers: Vec<Arc<dyn SchemaProvider>> = vec![Arc::new(Fields), Arc::new(Fields)];
	assert_eq!(registry.install_providers(&providers).unwrap(), 1);
	registry.begin_loading().unwrap();
	let person = registry.create_node("object", "pojo", "Person").unwrap();
	let email = registry.create_node("field", "string", "email").unwrap();
	registry.attach(person, email).unwrap();
	registry.seal().unwrap();

	let generation = registry.current().unwrap();
	assert_eq!(generation.installed_providers(), [Arc::<str>::from("fields")]);

	// Already installed providers are skipped in updates forked from this generation.
	let mut update = registry.begin_update().unwrap();
	assert_eq!(update.install_providers(&providers).unwrap(), 0);
	registry.abort_update(update).unwrap();
}

#[test]
fn require_child_by_name_reports_the_parent_path() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();

	assert_eq!(generation.require_child_by_name(person, "email").unwrap(), generation.find_child_by_name(person, "email").unwrap());
	let err = generation.require_child_by_name(person, "phone").unwrap_err();
	let TreeError::ChildNotFound { parent, name } = err else {
		panic!("expected missing child, got {err:?}");
	};
	assert_eq!(parent.to_string(), "object:Person(pojo)");
	assert_eq!(&*name, "phone");
}

#[test]
fn resolve_attribute_value_walks_ancestors() {
	let registry = loading_registry();
	let outer = registry.create_node("object", "pojo", "Outer").unwrap();
	let inner = registry.create_node("object", "pojo", "Inner").unwrap();
	let field = registry.create_node("field", "string", "code").unwrap();
	registry.attach(outer, inner).unwrap();
	registry.attach(inner, field).unwrap();
	registry.set_attribute_value(outer, "label", "outer").unwrap();
	registry.set_attribute_value(inner, "table", "inner_t").unwrap();
	registry.seal().unwrap();

	let generation = registry.current().unwrap();
	assert_eq!(generation.get_attribute_value(field, "label"), None);
	assert_eq!(generation.resolve_attribute_value(field, "label"), Some(Value::from("outer")));
	assert_eq!(generation.resolve_attribute_value(field, "table"), Some(Value::from("inner_t")));
	assert_eq!(generation.resolve_attribute_value(field, "missing"), None);
}

#[test]
fn stream_children_is_lazy_and_restartable() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();

	let mut stream = generation.stream_children(person, "field.string").unwrap();
	assert_eq!(stream.next().map(|c| c.name()), Some("email"));
	assert_eq!(stream.next().map(|c| c.name()), Some("name"));
	assert!(stream.next().is_none());
	stream.restart();
	assert_eq!(stream.count(), 2);

	assert_eq!(generation.stream_children(person, "object.*").unwrap().count(), 0);
	assert_eq!(generation.stream_children(person, "*:email").unwrap().count(), 1);
}

#[test]
fn malformed_child_filter_is_an_error() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();

	for filter in ["object.", "field:", ""] {
		let err = generation.stream_children(person, filter).map(|s| s.count()).unwrap_err();
		assert_eq!(err, TreeError::InvalidFilter { filter: filter.into() });
		assert!(generation.children_of_type(person, filter).is_err());
	}
	assert_eq!(generation.cache().tier_of(&CacheKey::node(person, "children.of-type", "object.")), None);
}

#[test]
fn children_of_type_is_served_from_derived_tier() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = generation.root("Person").unwrap();

	let first = generation.children_of_type(person, "field.*").unwrap();
	let second = generation.children_of_type(person, "field.*").unwrap();
	assert!(Arc::ptr_eq(&first, &second));
	assert_eq!(first.len(), 2);

	let key = CacheKey::node(person, "children.of-type", "field.*");
	assert_eq!(generation.cache().tier_of(&key), Some(CacheTier::Derived));
	assert_eq!(
		generation.cache().tier_of(&CacheKey::node(person, "children.by-name", "")),
		Some(CacheTier::Permanent)
	);
}

#[test]
fn applicable_validations_and_subtypes() {
	let registry = loading_registry();
	registry
		.add_constraint(Constraint::length("short-names", NodeMatcher::new("field", "*"), Some(1), Some(32)).unwrap())
		.unwrap();
	let person = registry.create_node("object", "pojo", "Person").unwrap();
	let email = registry.create_node("field", "string", "email").unwrap();
	registry.attach(person, email).unwrap();
	registry.seal().unwrap();

	let generation = registry.current().unwrap();
	let ids: Vec<_> = generation.applicable_validations(email).iter().map(|c| c.id().to_string()).collect();
	assert_eq!(ids, ["short-names"]);
	assert!(generation.applicable_validations(person).is_empty());

	let subtypes = generation.subtypes_of(&TypeKey::new("field", "base"));
	assert_eq!(subtypes.as_slice(), [TypeKey::new("field", "string")]);

	let resolved = registry.resolve_type_definition("field", "string").unwrap();
	assert!(resolved.is_subtype_of(&TypeKey::new("field", "base")));
}

#[test]
fn node_refs_navigate_the_generation() {
	let registry = person_registry();
	let generation = registry.current().unwrap();
	let person = NodeRef::new(generation.clone(), generation.root("Person").unwrap()).unwrap();

	let email = person.child("email").unwrap();
	assert_eq!(email.parent().as_ref(), Some(&person));
	assert_eq!(email.resolve_attribute("label"), Some(Value::from("People")));
	assert_eq!(email.key(), Some(&TypeKey::new("field", "string")));
	assert!(person.child("phone").is_none());
}

#[test]
fn generation_ids_increase_across_updates() {
	let registry = person_registry();
	let mut last = registry.current_generation().unwrap();
	for _ in 0..3 {
		let update = registry.begin_update_from_current().unwrap();
		let id = registry.commit_update(update).unwrap();
		assert!(id > last);
		last = id;
	}
	assert_eq!(last.to_string(), "gen-4");
}

#[test]
fn options_reach_the_session() {
	let registry = MetaRegistry::new(RegistryOptions::default().with_strict_attributes(true));
	registry.register_type(object_pojo()).unwrap();
	registry.begin_loading().unwrap();
	let person = registry.create_node("object", "pojo", "Person").unwrap();
	assert!(registry.set_attribute_value(person, "tabel", "people").is_err());
	assert!(matches!(registry.seal(), Err(RegistryError::SealFailed { .. })));
}

#[test]
#[cfg(any(debug_assertions, feature = "registry-contracts"))]
#[should_panic(expected = "broken parent link")]
fn generation_rejects_one_sided_links() {
	use crate::constraints::ConstraintEngine;
	use crate::tree::arena::{Arena, NodeKind};
	use crate::types::TypeStore;

	let mut arena = Arena::default();
	let key = TypeKey::new("object", "pojo");
	let parent = arena.push(key.clone(), Arc::from("Parent"), NodeKind::Element, None);
	let child = arena.push(key, Arc::from("Child"), NodeKind::Element, None);
	if let Some(data) = arena.get_mut(child) {
		data.parent = Some(parent);
	}

	let options = RegistryOptions::default();
	let catalog = TypeStore::new().freeze().unwrap();
	let constraints = ConstraintEngine::new(&options).freeze();
	Generation::new(GenerationId(1), arena, catalog, constraints, Vec::new(), &options);
}
