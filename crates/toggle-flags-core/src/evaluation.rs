// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// User attributes supplied by the SDK, keyed by attribute name.
pub type UserAttributes = HashMap<String, serde_json::Value>;

/// Attribute holding the bucketing key.
pub const SUBJECT_ID_ATTRIBUTE: &str = "id";

/// Inbound evaluation call from an SDK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
	pub api_key: String,
	pub feature_key: String,
	pub environment: String,
	#[serde(default, alias = "userAttributes", deserialize_with = "null_as_empty")]
	pub user: UserAttributes,
}

/// Anonymous callers may send `"user": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<UserAttributes, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<UserAttributes>::deserialize(deserializer)?.unwrap_or_default())
}

impl EvaluationRequest {
	pub fn new(
		api_key: impl Into<String>,
		feature_key: impl Into<String>,
		environment: impl Into<String>,
	) -> Self {
		Self {
			api_key: api_key.into(),
			feature_key: feature_key.into(),
			environment: environment.into(),
			user: UserAttributes::new(),
		}
	}

	pub fn with_user_id(self, id: impl Into<String>) -> Self {
		self.with_attribute(SUBJECT_ID_ATTRIBUTE, serde_json::Value::String(id.into()))
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.user.insert(key.into(), value);
		self
	}

	/// Bucketing key of the subject.
	///
	/// Strings are used as-is and numbers by their JSON text. Anything else,
	/// including a missing id, yields the empty string.
	pub fn subject_id(&self) -> String {
		match self.user.get(SUBJECT_ID_ATTRIBUTE) {
			Some(serde_json::Value::String(s)) => s.clone(),
			Some(serde_json::Value::Number(n)) => n.to_string(),
			_ => String::new(),
		}
	}
}

/// Response body returned to SDKs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
	pub enabled: bool,
}

impl EvaluationResponse {
	pub fn disabled() -> Self {
		Self { enabled: false }
	}
}

/// Terminal state an evaluation stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
	/// Unknown API key, feature key or environment.
	NotFound,
	/// Store unreachable or timed out.
	ResolutionFailed,
	Disabled,
	RuleMismatch,
	OutOfRollout,
	Enabled,
}

impl EvaluationReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			EvaluationReason::NotFound => "not_found",
			EvaluationReason::ResolutionFailed => "resolution_failed",
			EvaluationReason::Disabled => "disabled",
			EvaluationReason::RuleMismatch => "rule_mismatch",
			EvaluationReason::OutOfRollout => "out_of_rollout",
			EvaluationReason::Enabled => "enabled",
		}
	}
}

impl fmt::Display for EvaluationReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Decision plus the state that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
	pub enabled: bool,
	pub reason: EvaluationReason,
}

impl EvaluationOutcome {
	/// Only [`EvaluationReason::Enabled`] produces an enabled outcome.
	pub fn from_reason(reason: EvaluationReason) -> Self {
		Self {
			enabled: reason == EvaluationReason::Enabled,
			reason,
		}
	}
}

impl From<EvaluationOutcome> for EvaluationResponse {
	fn from(outcome: EvaluationOutcome) -> Self {
		Self {
			enabled: outcome.enabled,
		}
	}
}
