use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The value carried by an attribute node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// Boolean value.
	Bool(bool),
	/// Integer value.
	Int(i64),
	/// Floating point value.
	Double(f64),
	/// String value.
	String(String),
	/// Ordered list of strings.
	StringArray(Vec<String>),
	/// String-to-string property map.
	Properties(BTreeMap<String, String>),
}

impl Value {
	/// Returns the kind of this value.
	pub fn kind(&self) -> ValueKind {
		match self {
			Value::Bool(_) => ValueKind::Bool,
			Value::Int(_) => ValueKind::Int,
			Value::Double(_) => ValueKind::Double,
			Value::String(_) => ValueKind::String,
			Value::StringArray(_) => ValueKind::StringArray,
			Value::Properties(_) => ValueKind::Properties,
		}
	}

	/// Returns true if this value can be stored in a slot of the given kind.
	pub fn matches_kind(&self, kind: ValueKind) -> bool {
		kind == ValueKind::Any || self.kind() == kind
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the numeric value for `Int` and `Double` variants.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(v) => Some(*v as f64),
			Value::Double(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_string_array(&self) -> Option<&[String]> {
		match self {
			Value::StringArray(v) => Some(v),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Double(v) => write!(f, "{v}"),
			Value::String(v) => f.write_str(v),
			Value::StringArray(v) => write!(f, "[{}]", v.join(",")),
			Value::Properties(v) => {
				f.write_str("{")?;
				for (i, (k, val)) in v.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{k}={val}")?;
				}
				f.write_str("}")
			}
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v.into())
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Double(v)
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl From<Vec<String>> for Value {
	fn from(v: Vec<String>) -> Self {
		Value::StringArray(v)
	}
}

impl From<BTreeMap<String, String>> for Value {
	fn from(v: BTreeMap<String, String>) -> Self {
		Value::Properties(v)
	}
}

/// The declared kind of an attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
	Bool,
	Int,
	Double,
	String,
	StringArray,
	Properties,
	/// Accepts a value of any kind.
	Any,
}

impl ValueKind {
	pub const ALL: [ValueKind; 7] = [
		ValueKind::Bool,
		ValueKind::Int,
		ValueKind::Double,
		ValueKind::String,
		ValueKind::StringArray,
		ValueKind::Properties,
		ValueKind::Any,
	];

	/// Returns the subtype name used for attribute nodes of this kind.
	pub const fn name(self) -> &'static str {
		match self {
			ValueKind::Bool => "bool",
			ValueKind::Int => "int",
			ValueKind::Double => "double",
			ValueKind::String => "string",
			ValueKind::StringArray => "string-array",
			ValueKind::Properties => "properties",
			ValueKind::Any => "any",
		}
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
