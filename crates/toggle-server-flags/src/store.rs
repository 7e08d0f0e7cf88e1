// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration store: the source of truth for flag configuration.
//!
//! The store is written by the management dashboard and only ever read here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::instrument;

use toggle_flags_core::{FlagConfiguration, TargetingRule};

use crate::error::Result;

/// Read access to per-environment flag configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
	/// Follows api key → project → feature (by key) → environment config.
	///
	/// Returns `Ok(None)` when any link of that chain is missing.
	async fn lookup(
		&self,
		api_key: &str,
		feature_key: &str,
		environment: &str,
	) -> Result<Option<FlagConfiguration>>;

	/// Cheap connectivity probe used by health checks.
	async fn ping(&self) -> Result<()> {
		Ok(())
	}
}

/// SQLite implementation of the configuration store.
#[derive(Clone)]
pub struct SqliteConfigStore {
	pool: SqlitePool,
}

impl SqliteConfigStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
	#[instrument(skip(self, api_key), fields(feature_key = %feature_key, environment = %environment))]
	async fn lookup(
		&self,
		api_key: &str,
		feature_key: &str,
		environment: &str,
	) -> Result<Option<FlagConfiguration>> {
		let row = sqlx::query_as::<_, FeatureEnvironmentRow>(
			r#"
			SELECT fe.status, fe.rollout_percentage, fe.rules
			FROM projects p
			JOIN features f ON f.project_id = p.id
			JOIN feature_environments fe ON fe.feature_id = f.id
			WHERE p.api_key = ? AND f.key = ? AND fe.environment = ?
			LIMIT 1
			"#,
		)
		.bind(api_key)
		.bind(feature_key)
		.bind(environment)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(FeatureEnvironmentRow::into_configuration))
	}

	async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}
}

#[derive(sqlx::FromRow)]
struct FeatureEnvironmentRow {
	status: Option<bool>,
	rollout_percentage: Option<i64>,
	rules: Option<String>,
}

impl FeatureEnvironmentRow {
	fn into_configuration(self) -> FlagConfiguration {
		let enabled = self.status.unwrap_or(false);
		let rollout = self.rollout_percentage.unwrap_or(0);

		let raw_rules = match self
			.rules
			.as_deref()
			.map(|raw| serde_json::from_str::<serde_json::Value>(raw))
		{
			None => Ok(Vec::new()),
			Some(Ok(serde_json::Value::Null)) => Ok(Vec::new()),
			Some(Ok(serde_json::Value::Array(items))) => Ok(items),
			Some(Ok(other)) => Err(format!("rules column holds a JSON {}", json_kind(&other))),
			Some(Err(e)) => Err(format!("rules column is not valid JSON: {e}")),
		};

		match raw_rules {
			Ok(items) => FlagConfiguration::from_stored(enabled, rollout, &items),
			Err(reason) => {
				tracing::warn!(reason = %reason, "rejecting stored rule set");
				let mut config = FlagConfiguration::from_stored(enabled, rollout, &[]);
				config.rules.push(TargetingRule::Rejected {
					field: String::new(),
					reason,
				});
				config
			}
		}
	}
}

fn json_kind(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "boolean",
		serde_json::Value::Number(_) => "number",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
}

type StoreKey = (String, String, String);

/// In-process store, for embedding and tests.
///
/// Counts lookups so callers can assert how often the store was consulted.
#[derive(Default)]
pub struct InMemoryConfigStore {
	entries: RwLock<HashMap<StoreKey, FlagConfiguration>>,
	lookups: AtomicUsize,
}

impl InMemoryConfigStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert(
		&self,
		api_key: impl Into<String>,
		feature_key: impl Into<String>,
		environment: impl Into<String>,
		config: FlagConfiguration,
	) {
		self
			.entries
			.write()
			.await
			.insert((api_key.into(), feature_key.into(), environment.into()), config);
	}

	pub async fn remove(&self, api_key: &str, feature_key: &str, environment: &str) -> bool {
		self
			.entries
			.write()
			.await
			.remove(&(
				api_key.to_string(),
				feature_key.to_string(),
				environment.to_string(),
			))
			.is_some()
	}

	pub fn lookup_count(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
	async fn lookup(
		&self,
		api_key: &str,
		feature_key: &str,
		environment: &str,
	) -> Result<Option<FlagConfiguration>> {
		self.lookups.fetch_add(1, Ordering::SeqCst);
		let key = (
			api_key.to_string(),
			feature_key.to_string(),
			environment.to_string(),
		);
		Ok(self.entries.read().await.get(&key).cloned())
	}
}
