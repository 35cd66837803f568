use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::constraints::{Constraint, NodeMatcher, UNCONSTRAINED_PLACEMENT_ID};
use crate::core::{RegistryError, RegistryOptions, RegistrySource, TreeError, TypeError, TypeKey, Value, ValueKind};
use crate::lifecycle::GenerationId;
use crate::types::{AttributeSpec, SchemaProvider, TypeDefinition};

fn field_base() -> TypeDefinition {
	TypeDefinition::new("field", "base")
		.abstract_type()
		.attribute("required", AttributeSpec::optional(ValueKind::Bool))
}

fn field_string() -> TypeDefinition {
	TypeDefinition::new("field", "string")
		.inherits("field", "base")
		.attribute("maxLength", AttributeSpec::optional(ValueKind::Int))
}

fn object_pojo() -> TypeDefinition {
	TypeDefinition::new("object", "pojo").attribute("table", AttributeSpec::optional(ValueKind::String))
}

fn object_children() -> Constraint {
	Constraint::placement_any(
		"object-children",
		NodeMatcher::parse("object.*").unwrap(),
		vec![NodeMatcher::parse("field.*").unwrap(), NodeMatcher::parse("object.*").unwrap()],
	)
}

fn session_with(options: RegistryOptions) -> LoadSession {
	let mut s = LoadSession::new(Arc::new(options));
	s.register_type(object_pojo()).unwrap();
	s.register_type(field_base()).unwrap();
	s.register_type(field_string()).unwrap();
	s.add_constraint(object_children()).unwrap();
	s
}

fn session() -> LoadSession {
	session_with(RegistryOptions::default())
}

#[test]
fn example_scenario() {
	let mut s = session();
	let resolved = s.types().resolve(&TypeKey::new("field", "string")).unwrap();
	assert!(resolved.attribute("required").is_some());
	assert!(resolved.attribute("maxLength").is_some());

	let err = s.create_node("field", "base", "id").unwrap_err();
	assert!(matches!(err, RegistryError::Type(TypeError::Abstract { .. })));

	let person = s.create_node("object", "pojo", "Person").unwrap();
	let email = s.create_node("field", "string", "email").unwrap();
	s.attach(person, email).unwrap();
	assert_eq!(s.path(email).to_string(), "object:Person(pojo)/field:email(string)");
}

#[test]
fn create_node_requires_registered_type() {
	let mut s = session();
	let err = s.create_node("field", "uuid", "id").unwrap_err();
	assert!(matches!(err, RegistryError::Type(TypeError::Unknown { .. })));
	let err = s.create_node("attr", "int", "x").unwrap_err();
	assert!(matches!(err, RegistryError::Tree(TreeError::NotAnElement { .. })));
}

#[test]
fn attach_without_rule_is_denied_by_default() {
	let mut s = session();
	let a = s.create_node("field", "string", "a").unwrap();
	let b = s.create_node("field", "string", "b").unwrap();
	let err = s.attach(a, b).unwrap_err();
	let RegistryError::Placement(v) = err else {
		panic!("expected placement violation, got {err:?}");
	};
	assert_eq!(&*v.constraint_id, UNCONSTRAINED_PLACEMENT_ID);
}

#[test]
fn attach_rejects_duplicate_sibling_names() {
	let mut s = session();
	let person = s.create_node("object", "pojo", "Person").unwrap();
	let first = s.create_node("field", "string", "email").unwrap();
	let second = s.create_node("field", "string", "email").unwrap();
	s.attach(person, first).unwrap();
	let err = s.attach(person, second).unwrap_err();
	assert!(matches!(err, RegistryError::Tree(TreeError::DuplicateChild { .. })));
	assert!(s.node(second).unwrap().parent().is_none());
}

#[test]
fn attach_rejects_cycles_and_reattachment() {
	let mut s = session();
	let a = s.create_node("object", "pojo", "A").unwrap();
	let b = s.create_node("object", "pojo", "B").unwrap();
	s.attach(a, b).unwrap();

	let err = s.attach(b, a).unwrap_err();
	assert!(matches!(err, RegistryError::Tree(TreeError::AttachCycle { .. })));
	let err = s.attach(a, a).unwrap_err();
	assert!(matches!(err, RegistryError::Tree(TreeError::AttachCycle { .. })));

	let c = s.create_node("object", "pojo", "C").unwrap();
	let err = s.attach(c, b).unwrap_err();
	assert!(matches!(err, RegistryError::Tree(TreeError::AlreadyAttached { .. })));
}

#[test]
fn attach_reports_placement_before_validation() {
	let mut s = session();
	s.add_constraint(Constraint::regex("lowercase-fields", NodeMatcher::parse("field.*").unwrap(), "[a-z]+").unwrap())
		.unwrap();
	let holder = s.create_node("field", "string", "holder").unwrap();
	let bad = s.create_node("field", "string", "BAD").unwrap();

	let err = s.attach(holder, bad).unwrap_err();
	assert!(matches!(err, RegistryError::Placement(_)), "got {err:?}");

	let person = s.create_node("object", "pojo", "Person").unwrap();
	let err = s.attach(person, bad).unwrap_err();
	let RegistryError::Validation(v) = err else {
		panic!("expected validation violation, got {err:?}");
	};
	assert_eq!(&*v.constraint_id, "lowercase-fields");
	assert_eq!(v.value, Some(Value::from("BAD")));
	assert!(s.node(person).unwrap().children().next().is_none());
}

#[test]
fn unknown_attribute_suggests_close_name() {
	let mut s = session();
	let email = s.create_node("field", "string", "email").unwrap();
	let err = s.set_attribute_value(email, "maxLenght", 5).unwrap_err();
	let RegistryError::Tree(TreeError::UnknownAttribute { suggestion, .. }) = err else {
		panic!("expected unknown attribute, got {err:?}");
	};
	assert_eq!(suggestion.as_deref(), Some("maxLength"));

	// Non-strict: only the call was rejected.
	s.set_attribute_value(email, "maxLength", 5).unwrap();
	let generation = s.seal(GenerationId(1)).unwrap();
	assert_eq!(generation.get_attribute_value(email, "maxLength"), Some(&Value::Int(5)));
}

#[test]
fn strict_mode_unknown_attribute_fails_seal() {
	let mut s = session_with(RegistryOptions::default().with_strict_attributes(true));
	let email = s.create_node("field", "string", "email").unwrap();
	assert!(s.set_attribute_value(email, "nope", 5).is_err());
	let err = s.seal(GenerationId(1)).unwrap_err();
	let RegistryError::SealFailed { problems } = err else {
		panic!("expected seal failure");
	};
	assert!(matches!(problems[0], RegistryError::Tree(TreeError::UnknownAttribute { .. })));
}

#[test]
fn value_kind_must_match_declaration() {
	let mut s = session();
	let email = s.create_node("field", "string", "email").unwrap();
	let err = s.set_attribute_value(email, "maxLength", "long").unwrap_err();
	let RegistryError::Validation(v) = err else {
		panic!("expected validation violation, got {err:?}");
	};
	assert_eq!(&*v.constraint_id, ATTRIBUTE_KIND_ID);
	assert_eq!(v.path.to_string(), "field:email(string)/attr:maxLength(int)");
}

#[test]
fn open_slot_accepts_any_name() {
	let mut s = session();
	s.register_type(
		TypeDefinition::new("view", "form")
			.open_attributes(ValueKind::String)
			.attribute("rows", AttributeSpec::optional(ValueKind::Int)),
	)
	.unwrap();
	let form = s.create_node("view", "form", "signup").unwrap();
	s.set_attribute_value(form, "anything", "x").unwrap();
	s.set_attribute_value(form, "rows", 3).unwrap();
	assert!(s.set_attribute_value(form, "other", 3).is_err());
}

#[test]
fn values_are_deferred_until_parent_type_arrives() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(object_pojo()).unwrap();
	s.add_constraint(object_children()).unwrap();
	s.register_type(field_string()).unwrap();

	let email = s.create_node("field", "string", "email").unwrap();
	s.set_attribute_value(email, "required", true).unwrap();
	s.set_attribute_value(email, "maxLength", 64).unwrap();

	s.register_type(field_base()).unwrap();
	let person = s.create_node("object", "pojo", "Person").unwrap();
	s.attach(person, email).unwrap();

	let generation = s.seal(GenerationId(1)).unwrap();
	assert_eq!(generation.get_attribute_value(email, "required"), Some(&Value::Bool(true)));
	assert_eq!(generation.get_attribute_value(email, "maxLength"), Some(&Value::Int(64)));
}

#[test]
fn direct_write_supersedes_parked_value() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(object_pojo()).unwrap();
	s.add_constraint(object_children()).unwrap();
	s.register_type(field_string()).unwrap();

	let email = s.create_node("field", "string", "email").unwrap();
	s.set_attribute_value(email, "maxLength", 16).unwrap();
	s.register_type(field_base()).unwrap();
	s.set_attribute_value(email, "maxLength", 255).unwrap();

	let person = s.create_node("object", "pojo", "Person").unwrap();
	s.attach(person, email).unwrap();
	let generation = s.seal(GenerationId(1)).unwrap();
	assert_eq!(generation.get_attribute_value(email, "maxLength"), Some(&Value::Int(255)));
}

#[test]
fn direct_write_on_root_survives_seal() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(field_string()).unwrap();
	let email = s.create_node("field", "string", "email").unwrap();
	s.set_attribute_value(email, "maxLength", 16).unwrap();
	s.register_type(field_base()).unwrap();
	s.set_attribute_value(email, "maxLength", 32).unwrap();

	let generation = s.seal(GenerationId(1)).unwrap();
	assert_eq!(generation.get_attribute_value(email, "maxLength"), Some(&Value::Int(32)));
}

#[test]
fn deferred_values_on_roots_are_checked_at_seal() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(field_string()).unwrap();
	let email = s.create_node("field", "string", "email").unwrap();
	s.set_attribute_value(email, "maxLength", "wide").unwrap();
	s.register_type(field_base()).unwrap();

	let err = s.seal(GenerationId(1)).unwrap_err();
	let RegistryError::SealFailed { problems } = err else {
		panic!("expected seal failure");
	};
	assert!(matches!(problems[0], RegistryError::Validation(_)));
}

#[test]
fn seal_fails_on_unresolved_parent() {
	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	s.register_type(field_string()).unwrap();
	let err = s.seal(GenerationId(1)).unwrap_err();
	let RegistryError::SealFailed { problems } = err else {
		panic!("expected seal failure");
	};
	assert!(problems.iter().any(|p| matches!(
		p,
		RegistryError::Type(TypeError::UnresolvedParent { missing, .. }) if *missing == TypeKey::new("field", "base")
	)));
}

#[test]
fn seal_revalidates_late_rules() {
	let mut s = session();
	let person = s.create_node("object", "pojo", "Person").unwrap();
	let email = s.create_node("field", "string", "email").unwrap();
	s.attach(person, email).unwrap();
	s.add_constraint(Constraint::length("short-field-names", NodeMatcher::parse("field.*").unwrap(), None, Some(3)).unwrap())
		.unwrap();

	let err = s.seal(GenerationId(1)).unwrap_err();
	let RegistryError::SealFailed { problems } = err else {
		panic!("expected seal failure");
	};
	assert!(problems.iter().any(|p| matches!(p, RegistryError::Validation(v) if &*v.constraint_id == "short-field-names")));
}

#[test]
fn required_attributes_are_enforced_at_seal() {
	let mut s = session();
	s.register_type(
		TypeDefinition::new("field", "key")
			.inherits("field", "base")
			.attribute("column", AttributeSpec::required(ValueKind::String)),
	)
	.unwrap();
	let person = s.create_node("object", "pojo", "Person").unwrap();
	let id = s.create_node("field", "key", "id").unwrap();
	s.attach(person, id).unwrap();

	let err = s.seal(GenerationId(1)).unwrap_err();
	let RegistryError::SealFailed { problems } = err else {
		panic!("expected seal failure");
	};
	assert!(matches!(
		&problems[0],
		RegistryError::Tree(TreeError::MissingRequiredAttribute { attribute, .. }) if &**attribute == "column"
	));
}

#[derive(Debug)]
struct Recording {
	id: &'static str,
	priority: i16,
	def: fn() -> TypeDefinition,
	log: Arc<Mutex<Vec<&'static str>>>,
}

impl SchemaProvider for Recording {
	fn id(&self) -> &str {
		self.id
	}

	fn priority(&self) -> i16 {
		self.priority
	}

	fn install(&self, session: &mut LoadSession) -> Result<(), RegistryError> {
		self.log.lock().push(self.id);
		session.register_type((self.def)())
	}
}

#[test]
fn providers_install_in_priority_order_once() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let provider = |id: &'static str, priority: i16, def: fn() -> TypeDefinition| -> Arc<dyn SchemaProvider> {
		Arc::new(Recording {
			id,
			priority,
			def,
			log: log.clone(),
		})
	};
	let providers = vec![
		provider("strings", 10, field_string),
		provider("base", -10, field_base),
		provider("strings", 10, field_string),
	];

	let mut s = LoadSession::new(Arc::new(RegistryOptions::default()));
	let installed = s.install_providers(&providers).unwrap();
	assert_eq!(installed, 2);
	assert_eq!(*log.lock(), vec!["base", "strings"]);
	assert!(s.types().pending_parents().is_empty());
	assert_eq!(
		s.types().provenance(&TypeKey::new("field", "base")).map(|p| p.source),
		Some(RegistrySource::Provider("base".into()))
	);
	assert_eq!(s.install_providers(&providers).unwrap(), 0);
}
