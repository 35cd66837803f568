//! Built-in constraint library.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::constraint::{Constraint, Placement, Validator};
use super::matcher::NodeMatcher;
use crate::core::{ConstraintError, Value};
use crate::tree::NodeView;

type NodePredicate = Box<dyn Fn(&NodeView<'_>) -> bool + Send + Sync>;
type ValueCheck = Box<dyn Fn(&NodeView<'_>, &Value) -> Result<(), String> + Send + Sync>;

impl Constraint {
	/// `parent accepts child`, e.g. `object.* accepts field.*`.
	pub fn pattern_placement(id: impl Into<Arc<str>>, parent: NodeMatcher, child: NodeMatcher) -> Self {
		Self::placement_any(id, parent, vec![child])
	}

	/// Parents matching `parent` accept a child matching any of `children`.
	pub fn placement_any(id: impl Into<Arc<str>>, parent: NodeMatcher, children: Vec<NodeMatcher>) -> Self {
		let accepted = children.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ");
		let description = format!("{parent} accepts {accepted}");
		Self::placement(id, description, PatternPlacement { parent, children })
	}

	pub fn placement_fn(
		id: impl Into<Arc<str>>,
		description: impl Into<Arc<str>>,
		applies: impl Fn(&NodeView<'_>) -> bool + Send + Sync + 'static,
		accepts: impl Fn(&NodeView<'_>) -> bool + Send + Sync + 'static,
	) -> Self {
		Self::placement(
			id,
			description,
			FnPlacement {
				applies: Box::new(applies),
				accepts: Box::new(accepts),
			},
		)
	}

	pub fn validation_fn(
		id: impl Into<Arc<str>>,
		description: impl Into<Arc<str>>,
		applies: NodeMatcher,
		check: impl Fn(&NodeView<'_>, &Value) -> Result<(), String> + Send + Sync + 'static,
	) -> Self {
		Self::validation(
			id,
			description,
			FnValidator {
				applies,
				check: Box::new(check),
			},
		)
	}

	/// Character count of strings (element count of arrays) must lie in `[min, max]`.
	pub fn length(id: impl Into<Arc<str>>, applies: NodeMatcher, min: Option<usize>, max: Option<usize>) -> Result<Self, ConstraintError> {
		let id = id.into();
		if let (Some(lo), Some(hi)) = (min, max)
			&& lo > hi
		{
			return Err(ConstraintError::Invalid {
				id,
				reason: format!("min length {lo} exceeds max length {hi}"),
			});
		}
		let description = match (min, max) {
			(Some(lo), Some(hi)) => format!("length must be between {lo} and {hi}"),
			(Some(lo), None) => format!("length must be at least {lo}"),
			(None, Some(hi)) => format!("length must be at most {hi}"),
			(None, None) => "length is unconstrained".to_string(),
		};
		Ok(Self::validation(id, description, Length { applies, min, max }))
	}

	/// String values must match `pattern` in full.
	pub fn regex(id: impl Into<Arc<str>>, applies: NodeMatcher, pattern: &str) -> Result<Self, ConstraintError> {
		let id = id.into();
		let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConstraintError::Invalid {
			id: id.clone(),
			reason: e.to_string(),
		})?;
		let description = format!("value must match /{pattern}/");
		Ok(Self::validation(id, description, Pattern { applies, regex }))
	}

	/// String values must be one of `allowed`.
	pub fn one_of<S: Into<String>>(
		id: impl Into<Arc<str>>,
		applies: NodeMatcher,
		allowed: impl IntoIterator<Item = S>,
		case_sensitive: bool,
	) -> Result<Self, ConstraintError> {
		let id = id.into();
		let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
		if allowed.is_empty() {
			return Err(ConstraintError::Invalid {
				id,
				reason: "allowed value set is empty".to_string(),
			});
		}
		let description = format!("value must be one of [{}]", allowed.join(", "));
		Ok(Self::validation(
			id,
			description,
			OneOf {
				applies,
				allowed,
				case_sensitive,
			},
		))
	}

	/// Numeric values (or numeric strings) must lie in `[min, max]`.
	pub fn range(id: impl Into<Arc<str>>, applies: NodeMatcher, min: Option<f64>, max: Option<f64>) -> Result<Self, ConstraintError> {
		let id = id.into();
		if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
			return Err(ConstraintError::Invalid {
				id,
				reason: "range bounds must be numbers".to_string(),
			});
		}
		if let (Some(lo), Some(hi)) = (min, max)
			&& lo > hi
		{
			return Err(ConstraintError::Invalid {
				id,
				reason: format!("min {lo} exceeds max {hi}"),
			});
		}
		let description = match (min, max) {
			(Some(lo), Some(hi)) => format!("value must be between {lo} and {hi}"),
			(Some(lo), None) => format!("value must be at least {lo}"),
			(None, Some(hi)) => format!("value must be at most {hi}"),
			(None, None) => "value must be numeric".to_string(),
		};
		Ok(Self::validation(id, description, Range { applies, min, max }))
	}

	/// Strings must contain non-whitespace; arrays and property maps must be non-empty.
	pub fn non_empty(id: impl Into<Arc<str>>, applies: NodeMatcher) -> Self {
		Self::validation(id, "value must not be empty", NonEmpty { applies })
	}
}

#[derive(Debug)]
struct PatternPlacement {
	parent: NodeMatcher,
	children: Vec<NodeMatcher>,
}

impl Placement for PatternPlacement {
	fn applies(&self, parent: &NodeView<'_>) -> bool {
		self.parent.matches(parent)
	}

	fn accepts(&self, child: &NodeView<'_>) -> bool {
		self.children.iter().any(|m| m.matches(child))
	}
}

struct FnPlacement {
	applies: NodePredicate,
	accepts: NodePredicate,
}

impl fmt::Debug for FnPlacement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnPlacement").finish_non_exhaustive()
	}
}

impl Placement for FnPlacement {
	fn applies(&self, parent: &NodeView<'_>) -> bool {
		(self.applies)(parent)
	}

	fn accepts(&self, child: &NodeView<'_>) -> bool {
		(self.accepts)(child)
	}
}

struct FnValidator {
	applies: NodeMatcher,
	check: ValueCheck,
}

impl fmt::Debug for FnValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnValidator")
			.field("applies", &self.applies)
			.finish_non_exhaustive()
	}
}

impl Validator for FnValidator {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		(self.check)(node, value)
	}
}

#[derive(Debug)]
struct Length {
	applies: NodeMatcher,
	min: Option<usize>,
	max: Option<usize>,
}

impl Validator for Length {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, _node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		let len = match value {
			Value::String(s) => s.chars().count(),
			Value::StringArray(items) => items.len(),
			Value::Properties(map) => map.len(),
			other => other.to_string().chars().count(),
		};
		if let Some(lo) = self.min
			&& len < lo
		{
			return Err(format!("length {len} is below minimum {lo}"));
		}
		if let Some(hi) = self.max
			&& len > hi
		{
			return Err(format!("length {len} exceeds maximum {hi}"));
		}
		Ok(())
	}
}

#[derive(Debug)]
struct Pattern {
	applies: NodeMatcher,
	regex: Regex,
}

impl Validator for Pattern {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, _node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		let bad = match value {
			Value::StringArray(items) => items.iter().find(|s| !self.regex.is_match(s)).cloned(),
			Value::String(s) => (!self.regex.is_match(s)).then(|| s.clone()),
			other => {
				let text = other.to_string();
				(!self.regex.is_match(&text)).then_some(text)
			}
		};
		match bad {
			Some(text) => Err(format!("{text:?} does not match {}", self.regex.as_str())),
			None => Ok(()),
		}
	}
}

#[derive(Debug)]
struct OneOf {
	applies: NodeMatcher,
	allowed: Vec<String>,
	case_sensitive: bool,
}

impl OneOf {
	fn permits(&self, candidate: &str) -> bool {
		if self.case_sensitive {
			self.allowed.iter().any(|a| a == candidate)
		} else {
			self.allowed.iter().any(|a| a.eq_ignore_ascii_case(candidate))
		}
	}
}

impl Validator for OneOf {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, _node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		let bad = match value {
			Value::StringArray(items) => items.iter().find(|s| !self.permits(s)).cloned(),
			other => {
				let text = other.to_string();
				(!self.permits(&text)).then_some(text)
			}
		};
		match bad {
			Some(text) => Err(format!("{text:?} is not one of [{}]", self.allowed.join(", "))),
			None => Ok(()),
		}
	}
}

#[derive(Debug)]
struct Range {
	applies: NodeMatcher,
	min: Option<f64>,
	max: Option<f64>,
}

impl Validator for Range {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, _node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		let number = match value {
			Value::String(s) => s.trim().parse::<f64>().ok(),
			other => other.as_f64(),
		};
		let Some(n) = number else {
			return Err(format!("{value} is not numeric"));
		};
		if let Some(lo) = self.min
			&& n < lo
		{
			return Err(format!("{n} is below minimum {lo}"));
		}
		if let Some(hi) = self.max
			&& n > hi
		{
			return Err(format!("{n} exceeds maximum {hi}"));
		}
		Ok(())
	}
}

#[derive(Debug)]
struct NonEmpty {
	applies: NodeMatcher,
}

impl Validator for NonEmpty {
	fn applies(&self, node: &NodeView<'_>) -> bool {
		self.applies.matches(node)
	}

	fn validate(&self, _node: &NodeView<'_>, value: &Value) -> Result<(), String> {
		let empty = match value {
			Value::String(s) => s.trim().is_empty(),
			Value::StringArray(items) => items.is_empty(),
			Value::Properties(map) => map.is_empty(),
			Value::Bool(_) | Value::Int(_) | Value::Double(_) => false,
		};
		if empty { Err("value is empty".to_string()) } else { Ok(()) }
	}
}
