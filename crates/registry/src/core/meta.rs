use std::fmt;
use std::sync::Arc;

/// Represents where a type definition or constraint was registered from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegistrySource {
	/// Built into the registry itself (attribute types).
	Builtin,
	/// Installed by a named schema provider.
	Provider(Arc<str>),
	/// Registered directly through the producer API.
	Runtime,
}

impl RegistrySource {
	/// Returns the precedence rank of the source (higher is applied later).
	pub const fn rank(&self) -> u8 {
		match self {
			Self::Builtin => 0,
			Self::Provider(_) => 1,
			Self::Runtime => 2,
		}
	}
}

impl fmt::Display for RegistrySource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Builtin => write!(f, "builtin"),
			Self::Provider(name) => write!(f, "provider:{name}"),
			Self::Runtime => write!(f, "runtime"),
		}
	}
}

/// Source and priority attached to every registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
	pub source: RegistrySource,
	/// Application order for providers (lower is applied first).
	pub priority: i16,
}

impl Provenance {
	pub const fn builtin() -> Self {
		Self {
			source: RegistrySource::Builtin,
			priority: i16::MIN,
		}
	}

	pub const fn runtime() -> Self {
		Self {
			source: RegistrySource::Runtime,
			priority: 0,
		}
	}

	pub fn provider(name: impl Into<Arc<str>>, priority: i16) -> Self {
		Self {
			source: RegistrySource::Provider(name.into()),
			priority,
		}
	}
}

impl Default for Provenance {
	fn default() -> Self {
		Self::runtime()
	}
}
