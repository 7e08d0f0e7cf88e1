// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Targeting rules and their evaluation against user attributes.
//!
//! Rules arrive from the store as loosely typed JSON ([`RawRule`]). They are
//! validated once, when a configuration is loaded, into a [`TargetingRule`]:
//! either an active [`Rule`] whose value shape fits its operator, or a rejected
//! entry that keeps the configuration failing closed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlagsError, Result};
use crate::evaluation::UserAttributes;

/// Comparison applied between a user attribute and a rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
	Equals,
	NotEquals,
	Contains,
	NotContains,
	StartsWith,
	EndsWith,
	GreaterThan,
	LessThan,
	In,
	NotIn,
}

impl RuleOperator {
	pub fn as_str(&self) -> &'static str {
		match self {
			RuleOperator::Equals => "equals",
			RuleOperator::NotEquals => "not_equals",
			RuleOperator::Contains => "contains",
			RuleOperator::NotContains => "not_contains",
			RuleOperator::StartsWith => "starts_with",
			RuleOperator::EndsWith => "ends_with",
			RuleOperator::GreaterThan => "greater_than",
			RuleOperator::LessThan => "less_than",
			RuleOperator::In => "in",
			RuleOperator::NotIn => "not_in",
		}
	}
}

impl fmt::Display for RuleOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RuleOperator {
	type Err = FlagsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"equals" => Ok(RuleOperator::Equals),
			"not_equals" => Ok(RuleOperator::NotEquals),
			"contains" => Ok(RuleOperator::Contains),
			"not_contains" => Ok(RuleOperator::NotContains),
			"starts_with" => Ok(RuleOperator::StartsWith),
			"ends_with" => Ok(RuleOperator::EndsWith),
			"greater_than" => Ok(RuleOperator::GreaterThan),
			"less_than" => Ok(RuleOperator::LessThan),
			"in" => Ok(RuleOperator::In),
			"not_in" => Ok(RuleOperator::NotIn),
			other => Err(FlagsError::UnknownOperator(other.to_string())),
		}
	}
}

/// Comparand of a rule. Which variant is valid depends on the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleValue {
	String(String),
	Number(f64),
	StringSet(Vec<String>),
}

/// A validated targeting condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
	pub field: String,
	pub operator: RuleOperator,
	pub value: RuleValue,
}

/// A rule as stored by the dashboard: operator and value are untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
	pub field: String,
	pub operator: String,
	#[serde(default)]
	pub value: serde_json::Value,
}

/// A rule after load-time validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetingRule {
	Active(Rule),
	/// Never matches.
	Rejected { field: String, reason: String },
}

impl Rule {
	/// Builds a rule, checking that the value shape fits the operator.
	pub fn new(field: impl Into<String>, operator: RuleOperator, value: RuleValue) -> Result<Self> {
		let field = field.into();
		check_value_shape(&field, operator, &value)?;
		Ok(Self {
			field,
			operator,
			value,
		})
	}

	/// Validates a raw stored rule.
	pub fn parse(raw: &RawRule) -> Result<Self> {
		if raw.field.is_empty() {
			return Err(FlagsError::MalformedRule {
				field: String::new(),
				reason: "field must not be empty".to_string(),
			});
		}

		let operator: RuleOperator = raw.operator.parse()?;
		let value = coerce_value(&raw.field, operator, &raw.value)?;

		Ok(Self {
			field: raw.field.clone(),
			operator,
			value,
		})
	}

	/// Tests this rule against the user's attributes.
	///
	/// A missing or null attribute fails every operator, negated ones included.
	pub fn matches(&self, attributes: &UserAttributes) -> bool {
		let actual = match attributes.get(&self.field) {
			Some(serde_json::Value::Null) | None => return false,
			Some(v) => v,
		};

		match self.operator {
			RuleOperator::Equals => strict_eq(&self.value, actual).unwrap_or(false),
			RuleOperator::NotEquals => strict_eq(&self.value, actual).is_some_and(|eq| !eq),
			RuleOperator::Contains => self.text_test(actual, |a, e| a.contains(e)),
			RuleOperator::NotContains => self.text_test(actual, |a, e| !a.contains(e)),
			RuleOperator::StartsWith => self.text_test(actual, |a, e| a.starts_with(e)),
			RuleOperator::EndsWith => self.text_test(actual, |a, e| a.ends_with(e)),
			RuleOperator::GreaterThan => self.numeric_test(actual, |a, e| a > e),
			RuleOperator::LessThan => self.numeric_test(actual, |a, e| a < e),
			RuleOperator::In => self.membership(actual).unwrap_or(false),
			RuleOperator::NotIn => self.membership(actual).is_some_and(|found| !found),
		}
	}

	fn text_test(&self, actual: &serde_json::Value, test: impl Fn(&str, &str) -> bool) -> bool {
		let RuleValue::String(expected) = &self.value else {
			return false;
		};
		match coerce_to_string(actual) {
			Some(actual) => test(&actual, expected),
			None => false,
		}
	}

	fn numeric_test(&self, actual: &serde_json::Value, test: impl Fn(f64, f64) -> bool) -> bool {
		let RuleValue::Number(expected) = &self.value else {
			return false;
		};
		match coerce_to_number(actual) {
			Some(actual) => test(actual, *expected),
			None => false,
		}
	}

	fn membership(&self, actual: &serde_json::Value) -> Option<bool> {
		let RuleValue::StringSet(candidates) = &self.value else {
			return None;
		};
		let actual = match actual {
			serde_json::Value::Number(n) => number_text(n),
			other => coerce_to_string(other)?,
		};
		Some(candidates.iter().any(|c| *c == actual))
	}
}

impl TargetingRule {
	/// Validates one stored rule, turning any problem into a rejected entry.
	pub fn from_json(value: &serde_json::Value) -> Self {
		let raw: RawRule = match serde_json::from_value(value.clone()) {
			Ok(raw) => raw,
			Err(e) => {
				return TargetingRule::Rejected {
					field: value
						.get("field")
						.and_then(|f| f.as_str())
						.unwrap_or_default()
						.to_string(),
					reason: format!("invalid rule shape: {e}"),
				};
			}
		};

		match Rule::parse(&raw) {
			Ok(rule) => TargetingRule::Active(rule),
			Err(e) => TargetingRule::Rejected {
				field: raw.field,
				reason: e.to_string(),
			},
		}
	}

	pub fn field(&self) -> &str {
		match self {
			TargetingRule::Active(rule) => &rule.field,
			TargetingRule::Rejected { field, .. } => field,
		}
	}

	pub fn is_rejected(&self) -> bool {
		matches!(self, TargetingRule::Rejected { .. })
	}

	pub fn matches(&self, attributes: &UserAttributes) -> bool {
		match self {
			TargetingRule::Active(rule) => rule.matches(attributes),
			TargetingRule::Rejected { .. } => false,
		}
	}
}

impl From<Rule> for TargetingRule {
	fn from(rule: Rule) -> Self {
		TargetingRule::Active(rule)
	}
}

/// Evaluates all rules (AND logic). An empty list passes.
pub fn evaluate_rules(rules: &[TargetingRule], attributes: &UserAttributes) -> bool {
	rules.iter().all(|rule| rule.matches(attributes))
}

/// `None` when the rule value is not a scalar.
fn strict_eq(expected: &RuleValue, actual: &serde_json::Value) -> Option<bool> {
	match expected {
		RuleValue::String(e) => Some(actual.as_str() == Some(e.as_str())),
		RuleValue::Number(e) => Some(actual.is_number() && actual.as_f64() == Some(*e)),
		RuleValue::StringSet(_) => None,
	}
}

fn coerce_to_string(value: &serde_json::Value) -> Option<String> {
	match value {
		serde_json::Value::String(s) => Some(s.clone()),
		serde_json::Value::Number(n) => Some(n.to_string()),
		serde_json::Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

/// Integral floats print without a fraction so `1.0` and `1` share a set entry.
fn number_text(n: &serde_json::Number) -> String {
	match n.as_f64() {
		Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
		_ => n.to_string(),
	}
}

fn coerce_to_number(value: &serde_json::Value) -> Option<f64> {
	match value {
		serde_json::Value::Number(n) => n.as_f64(),
		serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
		_ => None,
	}
}

fn malformed(field: &str, operator: RuleOperator, expected: &str) -> FlagsError {
	FlagsError::MalformedRule {
		field: field.to_string(),
		reason: format!("operator '{operator}' expects {expected}"),
	}
}

fn check_value_shape(field: &str, operator: RuleOperator, value: &RuleValue) -> Result<()> {
	let ok = match operator {
		RuleOperator::Equals | RuleOperator::NotEquals => match value {
			RuleValue::String(_) => true,
			RuleValue::Number(n) => n.is_finite(),
			RuleValue::StringSet(_) => false,
		},
		RuleOperator::Contains
		| RuleOperator::NotContains
		| RuleOperator::StartsWith
		| RuleOperator::EndsWith => matches!(value, RuleValue::String(_)),
		RuleOperator::GreaterThan | RuleOperator::LessThan => {
			matches!(value, RuleValue::Number(n) if n.is_finite())
		}
		RuleOperator::In | RuleOperator::NotIn => matches!(value, RuleValue::StringSet(_)),
	};

	if ok {
		Ok(())
	} else {
		Err(malformed(field, operator, expected_shape(operator)))
	}
}

fn expected_shape(operator: RuleOperator) -> &'static str {
	match operator {
		RuleOperator::Equals | RuleOperator::NotEquals => "a string or number",
		RuleOperator::Contains
		| RuleOperator::NotContains
		| RuleOperator::StartsWith
		| RuleOperator::EndsWith => "a string",
		RuleOperator::GreaterThan | RuleOperator::LessThan => "a number",
		RuleOperator::In | RuleOperator::NotIn => "a list of strings or numbers",
	}
}

fn coerce_value(field: &str, operator: RuleOperator, raw: &serde_json::Value) -> Result<RuleValue> {
	let value = match operator {
		RuleOperator::Equals | RuleOperator::NotEquals => match raw {
			serde_json::Value::String(s) => Some(RuleValue::String(s.clone())),
			serde_json::Value::Number(n) => n.as_f64().map(RuleValue::Number),
			_ => None,
		},
		RuleOperator::Contains
		| RuleOperator::NotContains
		| RuleOperator::StartsWith
		| RuleOperator::EndsWith => raw.as_str().map(|s| RuleValue::String(s.to_string())),
		RuleOperator::GreaterThan | RuleOperator::LessThan => {
			coerce_to_number(raw).map(RuleValue::Number)
		}
		RuleOperator::In | RuleOperator::NotIn => raw.as_array().and_then(|items| {
			items
				.iter()
				.map(|item| match item {
					serde_json::Value::String(s) => Some(s.clone()),
					serde_json::Value::Number(n) => Some(number_text(n)),
					_ => None,
				})
				.collect::<Option<Vec<_>>>()
				.map(RuleValue::StringSet)
		}),
	};

	value.ok_or_else(|| malformed(field, operator, expected_shape(operator)))
}
