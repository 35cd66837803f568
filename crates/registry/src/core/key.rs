//! Composite `(type, subtype)` keys and the wildcard pattern token.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::ValueKind;

/// Pattern token matching any type, subtype, or name.
pub const WILDCARD: &str = "*";

/// Type name used for attribute nodes.
pub const ATTR_TYPE: &str = "attr";

/// Composite key identifying a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
	#[serde(rename = "type")]
	type_name: Arc<str>,
	#[serde(rename = "subtype")]
	sub_type: Arc<str>,
}

impl TypeKey {
	pub fn new(type_name: impl Into<Arc<str>>, sub_type: impl Into<Arc<str>>) -> Self {
		Self {
			type_name: type_name.into(),
			sub_type: sub_type.into(),
		}
	}

	/// Key of the builtin attribute type carrying values of `kind`.
	pub fn attr(kind: ValueKind) -> Self {
		Self::new(ATTR_TYPE, kind.name())
	}

	/// Parses a qualified `type.subtype` name.
	///
	/// The split happens at the first `.`; a bare name gets the wildcard subtype.
	pub fn parse(qualified: &str) -> Option<Self> {
		let qualified = qualified.trim();
		if qualified.is_empty() {
			return None;
		}
		match qualified.split_once('.') {
			Some((ty, sub)) if !ty.is_empty() && !sub.is_empty() => Some(Self::new(ty, sub)),
			Some(_) => None,
			None => Some(Self::new(qualified, WILDCARD)),
		}
	}

	#[inline]
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	#[inline]
	pub fn sub_type(&self) -> &str {
		&self.sub_type
	}

	/// Returns true if this key names an attribute type.
	#[inline]
	pub fn is_attr(&self) -> bool {
		&*self.type_name == ATTR_TYPE
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.type_name, self.sub_type)
	}
}

impl From<(&str, &str)> for TypeKey {
	fn from((ty, sub): (&str, &str)) -> Self {
		Self::new(ty, sub)
	}
}

/// Matches a single pattern component against a value.
#[inline]
pub(crate) fn component_matches(pattern: &str, value: &str) -> bool {
	pattern == WILDCARD || pattern == value
}

/// Renders a chain of keys as `a.b -> c.d -> ...`.
pub(crate) fn display_chain(chain: &[TypeKey]) -> String {
	chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_qualified_names() {
		assert_eq!(TypeKey::parse("field.string"), Some(TypeKey::new("field", "string")));
		assert_eq!(TypeKey::parse("object"), Some(TypeKey::new("object", "*")));
		assert_eq!(TypeKey::parse(" object.pojo "), Some(TypeKey::new("object", "pojo")));
		assert_eq!(TypeKey::parse(""), None);
		assert_eq!(TypeKey::parse(".pojo"), None);
		assert_eq!(TypeKey::parse("object."), None);
	}

	#[test]
	fn attr_keys_use_kind_names() {
		let key = TypeKey::attr(ValueKind::StringArray);
		assert!(key.is_attr());
		assert_eq!(key.to_string(), "attr.string-array");
	}

	#[test]
	fn chain_rendering() {
		let chain = [TypeKey::new("a", "b"), TypeKey::new("c", "d")];
		assert_eq!(display_chain(&chain), "a.b -> c.d");
	}
}
