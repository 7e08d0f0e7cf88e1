// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag evaluation HTTP handler.

use axum::{body::Bytes, extract::State, Json};
use tracing::{debug, warn};

use toggle_server_flags::{EvaluationRequest, EvaluationResponse};

use crate::AppState;

/// POST /api/evaluate - Evaluate one flag for one user.
///
/// Always answers `200` with `{"enabled": bool}`. A body that cannot be read
/// as an evaluation request is answered with `{"enabled": false}`.
pub async fn evaluate(State(state): State<AppState>, body: Bytes) -> Json<EvaluationResponse> {
	let request: EvaluationRequest = match serde_json::from_slice(&body) {
		Ok(request) => request,
		Err(e) => {
			warn!(error = %e, "rejecting malformed evaluation request");
			return Json(EvaluationResponse::disabled());
		}
	};

	let outcome = state.evaluator.evaluate_detailed(&request).await;
	debug!(
		feature_key = %request.feature_key,
		environment = %request.environment,
		reason = %outcome.reason,
		"evaluation served"
	);

	Json(outcome.into())
}
