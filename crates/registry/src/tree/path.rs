use std::fmt;
use std::sync::Arc;

use crate::core::TypeKey;

/// One `(type, subtype, name)` step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
	pub key: TypeKey,
	pub name: Arc<str>,
}

impl fmt::Display for PathSegment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}({})", self.key.type_name(), self.name, self.key.sub_type())
	}
}

/// Root-to-node path used in diagnostics, e.g. `object:Person(pojo)/field:email(string)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
	segments: Vec<PathSegment>,
}

impl NodePath {
	pub fn new(segments: Vec<PathSegment>) -> Self {
		Self { segments }
	}

	pub fn segments(&self) -> &[PathSegment] {
		&self.segments
	}

	pub fn is_root(&self) -> bool {
		self.segments.is_empty()
	}

	/// Returns this path extended by one segment.
	pub fn child(&self, key: TypeKey, name: impl Into<Arc<str>>) -> Self {
		let mut segments = self.segments.clone();
		segments.push(PathSegment { key, name: name.into() });
		Self { segments }
	}

	pub fn last(&self) -> Option<&PathSegment> {
		self.segments.last()
	}
}

impl fmt::Display for NodePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.segments.is_empty() {
			return f.write_str("/");
		}
		for (i, seg) in self.segments.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			write!(f, "{seg}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_type_name_subtype() {
		let path = NodePath::default()
			.child(TypeKey::new("object", "pojo"), "Person")
			.child(TypeKey::new("field", "string"), "email");
		assert_eq!(path.to_string(), "object:Person(pojo)/field:email(string)");
		assert_eq!(NodePath::default().to_string(), "/");
	}
}
