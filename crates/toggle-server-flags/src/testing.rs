// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests that need a populated flag database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Single-connection in-memory pool; every connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.create_if_missing(true);

	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool")
}

/// Inserts a project, feature and environment row, reusing existing parents.
pub async fn seed_flag(
	pool: &SqlitePool,
	api_key: &str,
	feature_key: &str,
	environment: &str,
	enabled: bool,
	rollout_percentage: i64,
	rules: serde_json::Value,
) {
	sqlx::query("INSERT OR IGNORE INTO projects (id, name, api_key) VALUES (?, ?, ?)")
		.bind(format!("project-{api_key}"))
		.bind(api_key)
		.bind(api_key)
		.execute(pool)
		.await
		.unwrap();

	sqlx::query("INSERT OR IGNORE INTO features (id, project_id, key) VALUES (?, ?, ?)")
		.bind(format!("feature-{api_key}-{feature_key}"))
		.bind(format!("project-{api_key}"))
		.bind(feature_key)
		.execute(pool)
		.await
		.unwrap();

	sqlx::query(
		"INSERT OR REPLACE INTO feature_environments \
		 (id, feature_id, environment, status, rollout_percentage, rules) VALUES (?, ?, ?, ?, ?, ?)",
	)
	.bind(format!("env-{api_key}-{feature_key}-{environment}"))
	.bind(format!("feature-{api_key}-{feature_key}"))
	.bind(environment)
	.bind(enabled)
	.bind(rollout_percentage)
	.bind(rules.to_string())
	.execute(pool)
	.await
	.unwrap();
}
