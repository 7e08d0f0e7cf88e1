// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Toggle feature flag evaluator.
//!
//! This crate holds everything that is a pure function of its inputs: the
//! resolved [`FlagConfiguration`], targeting [`Rule`]s and their evaluation,
//! and the stable percentage bucketer. The server-side resolver and
//! orchestrator live in `toggle-server-flags`.
//!
//! # Fail-closed defaults
//!
//! A rule mismatch or a rollout miss always evaluates to disabled. Some earlier
//! versions of this evaluator returned enabled on a rule mismatch; that is not
//! the behavior here.
//!
//! # Example
//!
//! ```
//! use toggle_flags_core::{evaluate_rules, is_in_rollout, FlagConfiguration, UserAttributes};
//!
//! let config = FlagConfiguration::from_stored(
//!     true,
//!     100,
//!     &[serde_json::json!({"field": "plan", "operator": "equals", "value": "premium"})],
//! );
//!
//! let mut user = UserAttributes::new();
//! user.insert("id".to_string(), serde_json::json!("u1"));
//! user.insert("plan".to_string(), serde_json::json!("premium"));
//!
//! assert!(evaluate_rules(&config.rules, &user));
//! assert!(is_in_rollout("u1", config.effective_rollout()));
//! ```

pub mod bucket;
pub mod configuration;
pub mod error;
pub mod evaluation;
pub mod rule;

pub use bucket::{bucket_for, is_in_rollout, BUCKET_COUNT};
pub use configuration::FlagConfiguration;
pub use error::{FlagsError, Result};
pub use evaluation::{
	EvaluationOutcome, EvaluationReason, EvaluationRequest, EvaluationResponse, UserAttributes,
	SUBJECT_ID_ATTRIBUTE,
};
pub use rule::{evaluate_rules, RawRule, Rule, RuleOperator, RuleValue, TargetingRule};
