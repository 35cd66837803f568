#![allow(dead_code)]

use crate::constraints::{Constraint, NodeMatcher};
use crate::core::{RegistryOptions, ValueKind};
use crate::lifecycle::MetaRegistry;
use crate::types::{AttributeSpec, TypeDefinition};

pub(crate) fn field_base() -> TypeDefinition {
	TypeDefinition::new("field", "base")
		.abstract_type()
		.attribute("required", AttributeSpec::optional(ValueKind::Bool))
		.attribute("label", AttributeSpec::optional(ValueKind::String))
}

pub(crate) fn field_string() -> TypeDefinition {
	TypeDefinition::new("field", "string")
		.inherits("field", "base")
		.attribute("maxLength", AttributeSpec::optional(ValueKind::Int))
}

pub(crate) fn object_pojo() -> TypeDefinition {
	TypeDefinition::new("object", "pojo")
		.attribute("table", AttributeSpec::optional(ValueKind::String))
		.attribute("label", AttributeSpec::optional(ValueKind::String))
}

pub(crate) fn object_children() -> Constraint {
	Constraint::placement_any(
		"object-children",
		NodeMatcher::new("object", "*"),
		vec![NodeMatcher::new("field", "*"), NodeMatcher::new("object", "*")],
	)
}

/// Registry in `Loading` with the object/field schema installed.
pub(crate) fn loading_registry() -> MetaRegistry {
	let registry = MetaRegistry::new(RegistryOptions::default());
	registry.register_type(object_pojo()).unwrap();
	registry.register_type(field_base()).unwrap();
	registry.register_type(field_string()).unwrap();
	registry.add_constraint(object_children()).unwrap();
	registry.begin_loading().unwrap();
	registry
}

/// Active registry holding `object:Person(pojo)` with fields `email` and `name`.
pub(crate) fn person_registry() -> MetaRegistry {
	let registry = loading_registry();
	let person = registry.create_node("object", "pojo", "Person").unwrap();
	registry.set_attribute_value(person, "label", "People").unwrap();
	for name in ["email", "name"] {
		let field = registry.create_node("field", "string", name).unwrap();
		registry.attach(person, field).unwrap();
	}
	registry.seal().unwrap();
	registry
}
