// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP surface of the Toggle flag evaluator.
//!
//! Routes:
//! - `POST /api/evaluate` - evaluates one flag for one user, always `200 {"enabled": bool}`
//! - `GET /health` - configuration store reachability

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
	routing::{get, post},
	Router,
};
use sqlx::SqlitePool;

use toggle_server_config::ServerConfig;
use toggle_server_flags::{
	ConfigResolver, ConfigStore, FlagCache, FlagEvaluator, InMemoryFlagCache, ResolverConfig,
	SqliteConfigStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub evaluator: Arc<FlagEvaluator>,
	pub store: Arc<dyn ConfigStore>,
	pub dependency_timeout: Duration,
}

impl AppState {
	pub fn new(
		store: Arc<dyn ConfigStore>,
		cache: Arc<dyn FlagCache>,
		resolver_config: ResolverConfig,
	) -> Self {
		let resolver = ConfigResolver::with_config(Arc::clone(&store), cache, resolver_config);
		Self {
			evaluator: Arc::new(FlagEvaluator::new(Arc::new(resolver))),
			store,
			dependency_timeout: resolver_config.dependency_timeout,
		}
	}
}

/// Builds the production state: SQLite store and an in-process cache.
pub fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	let store: Arc<dyn ConfigStore> = Arc::new(SqliteConfigStore::new(pool));
	let cache: Arc<dyn FlagCache> =
		Arc::new(InMemoryFlagCache::with_max_entries(config.cache.max_entries));

	AppState::new(
		store,
		cache,
		ResolverConfig {
			cache_ttl: config.cache.ttl(),
			dependency_timeout: config.evaluation.dependency_timeout(),
		},
	)
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/evaluate", post(routes::evaluate::evaluate))
		.route("/health", get(routes::health::health_check))
		.with_state(state)
}
