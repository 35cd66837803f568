//! Schema providers and their application order.
//!
//! # Role
//!
//! A provider bundles type definitions and constraints contributed by one collaborator.
//! Providers may be discovered more than once and in any order; the session sorts them by
//! the precedence rules below before installing and skips ids it has already installed.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::core::{Provenance, RegistryError, RegistrySource};
use crate::tree::LoadSession;

/// A bundle of registrations installed into a loading session.
pub trait SchemaProvider: Send + Sync {
	/// Stable identifier used to skip redundant installs.
	fn id(&self) -> &str;

	/// Application order: lower priorities install first.
	fn priority(&self) -> i16 {
		0
	}

	fn source(&self) -> RegistrySource {
		RegistrySource::Provider(Arc::from(self.id()))
	}

	/// Registers types and constraints through the session's producer API.
	fn install(&self, session: &mut LoadSession) -> Result<(), RegistryError>;
}

/// One provider's position in the install order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Party {
	pub source: RegistrySource,
	pub priority: i16,
	/// Stable ingest ordinal.
	pub ordinal: u32,
}

impl Party {
	pub(crate) fn of(provider: &dyn SchemaProvider, ordinal: u32) -> Self {
		Self {
			source: provider.source(),
			priority: provider.priority(),
			ordinal,
		}
	}

	pub(crate) fn provenance(&self) -> Provenance {
		Provenance {
			source: self.source.clone(),
			priority: self.priority,
		}
	}
}

/// Compares two parties by install order.
///
/// 1. Priority (lower first)
/// 2. Source (Builtin < Provider < Runtime)
/// 3. Ingest ordinal (earlier first)
pub(crate) fn cmp_party(a: &Party, b: &Party) -> Ordering {
	a.priority
		.cmp(&b.priority)
		.then_with(|| a.source.rank().cmp(&b.source.rank()))
		.then_with(|| a.ordinal.cmp(&b.ordinal))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn priority_dominates_source_and_ordinal() {
		let early = Party {
			source: RegistrySource::Runtime,
			priority: -5,
			ordinal: 9,
		};
		let late = Party {
			source: RegistrySource::Builtin,
			priority: 3,
			ordinal: 0,
		};
		assert_eq!(cmp_party(&early, &late), Ordering::Less);
	}

	#[test]
	fn source_rank_then_ordinal_break_ties() {
		let provider = Party {
			source: RegistrySource::Provider("a".into()),
			priority: 0,
			ordinal: 5,
		};
		let runtime = Party {
			source: RegistrySource::Runtime,
			priority: 0,
			ordinal: 1,
		};
		assert_eq!(cmp_party(&provider, &runtime), Ordering::Less);

		let second = Party { ordinal: 6, ..provider.clone() };
		assert_eq!(cmp_party(&provider, &second), Ordering::Less);
	}
}
