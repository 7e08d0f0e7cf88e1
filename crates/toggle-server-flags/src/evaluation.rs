// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use toggle_flags_core::{
	evaluate_rules, is_in_rollout, EvaluationOutcome, EvaluationReason, EvaluationRequest,
	FlagConfiguration,
};

use crate::error::FlagsServerError;
use crate::resolver::ConfigResolver;

/// Evaluates an already-resolved configuration for a request.
///
/// The evaluation order is:
/// 1. Disabled configurations stop here
/// 2. Targeting rules, all of which must match (skipped when there are none)
/// 3. Percentage rollout on the subject id
pub fn evaluate_configuration(
	config: &FlagConfiguration,
	request: &EvaluationRequest,
) -> EvaluationReason {
	if !config.enabled {
		return EvaluationReason::Disabled;
	}

	if config.has_rules() && !evaluate_rules(&config.rules, &request.user) {
		return EvaluationReason::RuleMismatch;
	}

	if !is_in_rollout(&request.subject_id(), config.effective_rollout()) {
		return EvaluationReason::OutOfRollout;
	}

	EvaluationReason::Enabled
}

/// Resolves configuration and evaluates requests against it.
///
/// Every path ends in a boolean; resolution failures are logged and reported
/// as disabled.
pub struct FlagEvaluator {
	resolver: Arc<ConfigResolver>,
}

impl FlagEvaluator {
	pub fn new(resolver: Arc<ConfigResolver>) -> Self {
		Self { resolver }
	}

	pub fn resolver(&self) -> &Arc<ConfigResolver> {
		&self.resolver
	}

	pub async fn evaluate(&self, request: &EvaluationRequest) -> bool {
		self.evaluate_detailed(request).await.enabled
	}

	#[instrument(
		skip(self, request),
		fields(feature_key = %request.feature_key, environment = %request.environment)
	)]
	pub async fn evaluate_detailed(&self, request: &EvaluationRequest) -> EvaluationOutcome {
		let resolved = self
			.resolver
			.resolve(&request.api_key, &request.feature_key, &request.environment)
			.await;

		let reason = match resolved {
			Ok(config) => evaluate_configuration(&config, request),
			Err(FlagsServerError::NotFound) => EvaluationReason::NotFound,
			Err(e) => {
				warn!(error = %e, "configuration resolution failed, reporting disabled");
				EvaluationReason::ResolutionFailed
			}
		};

		debug!(reason = %reason, "flag evaluated");
		EvaluationOutcome::from_reason(reason)
	}
}
