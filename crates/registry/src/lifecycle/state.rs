use std::fmt;

use crate::core::RegistryError;

/// Registry lifecycle: `Empty -> Loading -> Active -> (Updating -> Active)* -> Retired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
	/// No tree; only types and constraints may be registered.
	Empty,
	/// Building the first generation.
	Loading,
	/// Serving reads from a sealed generation.
	Active,
	/// Serving reads while a replacement generation is built in isolation.
	Updating,
	/// No longer serving.
	Retired,
}

impl LifecycleState {
	/// Returns true if `self -> to` is a legal transition.
	pub const fn can_transition(self, to: LifecycleState) -> bool {
		use LifecycleState::*;
		matches!(
			(self, to),
			(Empty, Loading)
				| (Loading, Active)
				| (Loading, Empty)
				| (Active, Updating)
				| (Updating, Active)
				| (Empty, Retired)
				| (Active, Retired)
		)
	}

	pub(crate) fn transition(&mut self, to: LifecycleState) -> Result<(), RegistryError> {
		if !self.can_transition(to) {
			return Err(RegistryError::InvalidTransition { from: *self, to });
		}
		tracing::info!(from = %self, to = %to, "lifecycle transition");
		*self = to;
		Ok(())
	}

	/// States in which type and constraint registration is open.
	pub const fn accepts_schema(self) -> bool {
		matches!(self, LifecycleState::Empty | LifecycleState::Loading)
	}
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LifecycleState::Empty => "empty",
			LifecycleState::Loading => "loading",
			LifecycleState::Active => "active",
			LifecycleState::Updating => "updating",
			LifecycleState::Retired => "retired",
		})
	}
}

/// Monotonic identifier of a sealed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationId(pub(crate) u64);

impl GenerationId {
	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for GenerationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "gen-{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transition_table() {
		use LifecycleState::*;
		let all = [Empty, Loading, Active, Updating, Retired];
		let legal: Vec<_> = all
			.iter()
			.flat_map(|a| all.iter().map(move |b| (*a, *b)))
			.filter(|(a, b)| a.can_transition(*b))
			.collect();
		assert_eq!(legal.len(), 7);
		assert!(!Retired.can_transition(Active));
		assert!(!Updating.can_transition(Updating));
	}

	#[test]
	fn illegal_transition_is_reported() {
		let mut state = LifecycleState::Active;
		let err = state.transition(LifecycleState::Loading).unwrap_err();
		assert_eq!(
			err,
			RegistryError::InvalidTransition {
				from: LifecycleState::Active,
				to: LifecycleState::Loading
			}
		);
		assert_eq!(state, LifecycleState::Active);
	}
}
