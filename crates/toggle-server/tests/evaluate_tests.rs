// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP tests for the evaluate and health routes.
//!
//! Tests cover:
//! - The `{"enabled": bool}` contract for each evaluation outcome
//! - Malformed bodies answered with `{"enabled": false}`
//! - Cache population through the HTTP path
//! - Store reachability reporting on `/health`

use std::sync::Arc;
use std::time::Duration;

use axum::{
	body::Body,
	http::{header::CONTENT_TYPE, Request, StatusCode},
	Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use toggle_server::{create_app_state, create_router, AppState};
use toggle_server_config::ServerConfig;
use toggle_server_flags::testing::{create_test_pool, seed_flag};
use toggle_server_flags::{
	bucket_for, run_migrations, ConfigStore, FlagConfiguration, FlagsServerError,
	InMemoryConfigStore, InMemoryFlagCache, ResolverConfig,
};

async fn setup_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	run_migrations(&pool).await.unwrap();

	seed_flag(&pool, "key_live", "full_rollout", "production", true, 100, json!([])).await;
	seed_flag(&pool, "key_live", "switched_off", "production", false, 100, json!([])).await;
	seed_flag(
		&pool,
		"key_live",
		"premium_only",
		"production",
		true,
		100,
		json!([{"field": "plan", "operator": "equals", "value": "premium"}]),
	)
	.await;
	seed_flag(&pool, "key_live", "partial", "production", true, 30, json!([])).await;

	pool
}

async fn setup_app() -> Router {
	let pool = setup_pool().await;
	create_router(create_app_state(pool, &ServerConfig::default()))
}

async fn post_evaluate(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/evaluate")
				.header(CONTENT_TYPE, "application/json")
				.body(body.into())
				.unwrap(),
		)
		.await
		.unwrap();

	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	(status, serde_json::from_slice(&bytes).unwrap())
}

fn evaluate_body(feature_key: &str, user: Value) -> String {
	json!({
		"apiKey": "key_live",
		"featureKey": feature_key,
		"environment": "production",
		"user": user,
	})
	.to_string()
}

#[tokio::test]
async fn test_full_rollout_is_enabled() {
	let app = setup_app().await;
	let (status, body) = post_evaluate(app, evaluate_body("full_rollout", json!({"id": "u1"}))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"enabled": true}));
}

#[tokio::test]
async fn test_disabled_flag_is_off() {
	let app = setup_app().await;
	let (status, body) = post_evaluate(app, evaluate_body("switched_off", json!({"id": "u1"}))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"enabled": false}));
}

#[tokio::test]
async fn test_targeting_rule_gates_users() {
	let app = setup_app().await;

	let (_, free) = post_evaluate(
		app.clone(),
		evaluate_body("premium_only", json!({"id": "u1", "plan": "free"})),
	)
	.await;
	assert_eq!(free, json!({"enabled": false}));

	let (_, premium) = post_evaluate(
		app,
		evaluate_body("premium_only", json!({"id": "u1", "plan": "premium"})),
	)
	.await;
	assert_eq!(premium, json!({"enabled": true}));
}

#[tokio::test]
async fn test_partial_rollout_follows_bucket() {
	let app = setup_app().await;
	let (_, body) = post_evaluate(app, evaluate_body("partial", json!({"id": "u1"}))).await;

	assert_eq!(body, json!({"enabled": bucket_for("u1") < 30}));
}

#[tokio::test]
async fn test_unknown_api_key_is_off() {
	let app = setup_app().await;
	let body = json!({
		"apiKey": "key_unknown",
		"featureKey": "full_rollout",
		"environment": "production",
		"user": {"id": "u1"},
	})
	.to_string();

	let (status, body) = post_evaluate(app, body).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"enabled": false}));
}

#[tokio::test]
async fn test_unknown_environment_is_off() {
	let app = setup_app().await;
	let body = json!({
		"apiKey": "key_live",
		"featureKey": "full_rollout",
		"environment": "staging",
	})
	.to_string();

	let (_, body) = post_evaluate(app, body).await;
	assert_eq!(body, json!({"enabled": false}));
}

#[tokio::test]
async fn test_null_user_is_evaluated_as_anonymous() {
	let app = setup_app().await;

	let (status, body) = post_evaluate(app.clone(), evaluate_body("full_rollout", Value::Null)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"enabled": true}));

	let (_, body) = post_evaluate(app, evaluate_body("partial", Value::Null)).await;
	assert_eq!(body, json!({"enabled": bucket_for("") < 30}));
}

#[tokio::test]
async fn test_malformed_bodies_are_off() {
	for raw in [
		"",
		"not json",
		"[]",
		r#"{"apiKey": "key_live"}"#,
		r#"{"apiKey": 7, "featureKey": "full_rollout", "environment": "production"}"#,
	] {
		let app = setup_app().await;
		let (status, body) = post_evaluate(app, raw.to_string()).await;
		assert_eq!(status, StatusCode::OK, "body {raw:?}");
		assert_eq!(body, json!({"enabled": false}), "body {raw:?}");
	}
}

#[tokio::test]
async fn test_repeated_requests_use_cache() {
	let store = Arc::new(InMemoryConfigStore::new());
	store
		.insert(
			"key_live",
			"full_rollout",
			"production",
			FlagConfiguration::new(true, 100),
		)
		.await;
	let cache = Arc::new(InMemoryFlagCache::new());
	let state = AppState::new(store.clone(), cache.clone(), ResolverConfig::default());
	let app = create_router(state);

	for _ in 0..3 {
		let (_, body) =
			post_evaluate(app.clone(), evaluate_body("full_rollout", json!({"id": "u1"}))).await;
		assert_eq!(body, json!({"enabled": true}));
	}

	assert_eq!(store.lookup_count(), 1);
	assert_eq!(cache.len().await, 1);
}

async fn get_health(app: Router) -> (StatusCode, Value) {
	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
		.await
		.unwrap();
	let status = response.status();
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	(status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_healthy_store() {
	let app = setup_app().await;
	let (status, body) = get_health(app).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert!(body.get("error").is_none());
}

struct UnreachableStore;

#[async_trait::async_trait]
impl ConfigStore for UnreachableStore {
	async fn lookup(
		&self,
		_: &str,
		_: &str,
		_: &str,
	) -> toggle_server_flags::Result<Option<FlagConfiguration>> {
		Err(FlagsServerError::DependencyUnavailable("store".to_string()))
	}

	async fn ping(&self) -> toggle_server_flags::Result<()> {
		Err(FlagsServerError::DependencyUnavailable("store".to_string()))
	}
}

#[tokio::test]
async fn test_unreachable_store_fails_closed() {
	let state = AppState::new(
		Arc::new(UnreachableStore),
		Arc::new(InMemoryFlagCache::new()),
		ResolverConfig {
			cache_ttl: Duration::from_secs(120),
			dependency_timeout: Duration::from_millis(50),
		},
	);
	let app = create_router(state);

	let (status, body) =
		post_evaluate(app.clone(), evaluate_body("full_rollout", json!({"id": "u1"}))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"enabled": false}));

	let (status, body) = get_health(app).await;
	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_file_backed_database() {
	let dir = tempfile::tempdir().unwrap();
	let url = format!("sqlite:{}", dir.path().join("toggle.db").display());
	let pool = toggle_server_flags::create_pool(&url).await.unwrap();
	run_migrations(&pool).await.unwrap();
	seed_flag(&pool, "key_file", "beta", "dev", true, 100, json!(null)).await;

	let app = create_router(create_app_state(pool, &ServerConfig::default()));
	let body = json!({
		"apiKey": "key_file",
		"featureKey": "beta",
		"environment": "dev",
		"user": {"id": "anyone"},
	})
	.to_string();

	let (_, body) = post_evaluate(app, body).await;
	assert_eq!(body, json!({"enabled": true}));
}
