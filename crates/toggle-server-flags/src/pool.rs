// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::{FlagsServerError, Result};

/// Tables read by [`crate::SqliteConfigStore`]. The dashboard owns the writes.
const MIGRATIONS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS projects (
		id TEXT PRIMARY KEY,
		name TEXT NOT NULL,
		api_key TEXT NOT NULL UNIQUE,
		created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS features (
		id TEXT PRIMARY KEY,
		project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
		key TEXT NOT NULL,
		name TEXT,
		description TEXT,
		created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
		UNIQUE (project_id, key)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS feature_environments (
		id TEXT PRIMARY KEY,
		feature_id TEXT NOT NULL REFERENCES features(id) ON DELETE CASCADE,
		environment TEXT NOT NULL,
		status INTEGER,
		rollout_percentage INTEGER DEFAULT 0,
		rules TEXT,
		UNIQUE (feature_id, environment)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_features_project_key ON features (project_id, key)",
];

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Errors
/// Returns `FlagsServerError::Internal` if the URL is invalid, or
/// `FlagsServerError::Database` if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| FlagsServerError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Creates the flag tables if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for statement in MIGRATIONS {
		sqlx::query(statement).execute(pool).await?;
	}

	tracing::debug!(statements = MIGRATIONS.len(), "flag schema ready");
	Ok(())
}
