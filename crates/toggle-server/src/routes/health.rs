// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health HTTP handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tokio::time::Instant;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub duration_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// GET /health - Configuration store reachability.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let start = Instant::now();

	let error = match tokio::time::timeout(state.dependency_timeout, state.store.ping()).await {
		Ok(Ok(())) => None,
		Ok(Err(e)) => Some(e.to_string()),
		Err(_) => Some("configuration store did not respond".to_string()),
	};

	let status = if error.is_some() {
		tracing::warn!(error = ?error, "health check failed");
		HealthStatus::Unhealthy
	} else {
		HealthStatus::Healthy
	};

	let response = HealthResponse {
		status,
		duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
		error,
	};

	let http_status = match status {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(http_status, Json(response))
}
