// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::rule::TargetingRule;

/// Resolved per-environment configuration of one flag.
///
/// This is the snapshot an evaluation works from and the value stored in the
/// cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagConfiguration {
	pub enabled: bool,
	pub rollout_percentage: i64,
	#[serde(default)]
	pub rules: Vec<TargetingRule>,
}

impl FlagConfiguration {
	pub fn new(enabled: bool, rollout_percentage: i64) -> Self {
		Self {
			enabled,
			rollout_percentage,
			rules: Vec::new(),
		}
	}

	pub fn with_rule(mut self, rule: impl Into<TargetingRule>) -> Self {
		self.rules.push(rule.into());
		self
	}

	/// Builds a configuration from stored values, validating each raw rule.
	///
	/// The percentage is clamped into `0..=100`. Rules that fail validation are
	/// kept as rejected entries and reported with a warning.
	pub fn from_stored(enabled: bool, rollout_percentage: i64, raw_rules: &[serde_json::Value]) -> Self {
		let rules: Vec<TargetingRule> = raw_rules.iter().map(TargetingRule::from_json).collect();

		for rule in rules.iter() {
			if let TargetingRule::Rejected { field, reason } = rule {
				tracing::warn!(field = %field, reason = %reason, "rejected malformed targeting rule");
			}
		}

		Self {
			enabled,
			rollout_percentage: rollout_percentage.clamp(0, 100),
			rules,
		}
	}

	/// Rollout percentage to bucket against; anything outside `0..=100` is 0.
	pub fn effective_rollout(&self) -> i64 {
		if (0..=100).contains(&self.rollout_percentage) {
			self.rollout_percentage
		} else {
			0
		}
	}

	pub fn has_rules(&self) -> bool {
		!self.rules.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_from_stored_clamps_percentage() {
		assert_eq!(FlagConfiguration::from_stored(true, 150, &[]).rollout_percentage, 100);
		assert_eq!(FlagConfiguration::from_stored(true, -3, &[]).rollout_percentage, 0);
		assert_eq!(FlagConfiguration::from_stored(true, 42, &[]).rollout_percentage, 42);
	}

	#[test]
	fn test_effective_rollout_fails_closed() {
		assert_eq!(FlagConfiguration::new(true, 101).effective_rollout(), 0);
		assert_eq!(FlagConfiguration::new(true, -1).effective_rollout(), 0);
		assert_eq!(FlagConfiguration::new(true, 100).effective_rollout(), 100);
		assert_eq!(FlagConfiguration::new(true, 0).effective_rollout(), 0);
	}

	#[test]
	fn test_from_stored_keeps_rule_order_and_rejections() {
		let config = FlagConfiguration::from_stored(
			true,
			50,
			&[
				json!({"field": "plan", "operator": "equals", "value": "premium"}),
				json!({"field": "beta", "operator": "matches", "value": "x"}),
				json!({"field": "country", "operator": "in", "value": ["US"]}),
			],
		);

		let fields: Vec<&str> = config.rules.iter().map(|r| r.field()).collect();
		assert_eq!(fields, vec!["plan", "beta", "country"]);
		assert!(!config.rules[0].is_rejected());
		assert!(config.rules[1].is_rejected());
		assert!(!config.rules[2].is_rejected());
	}

	#[test]
	fn test_cache_payload_round_trip() {
		let config = FlagConfiguration::from_stored(
			true,
			30,
			&[
				json!({"field": "age", "operator": "greater_than", "value": 18}),
				json!({"field": "x", "operator": "nope"}),
			],
		);
		let payload = serde_json::to_string(&config).unwrap();
		assert!(payload.contains("\"rolloutPercentage\":30"));

		let decoded: FlagConfiguration = serde_json::from_str(&payload).unwrap();
		assert_eq!(decoded, config);
	}
}
