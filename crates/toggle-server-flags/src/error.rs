// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagsServerError {
	#[error("flag configuration not found")]
	NotFound,

	#[error("{dependency} did not respond within {timeout_ms}ms")]
	DependencyTimeout {
		dependency: &'static str,
		timeout_ms: u64,
	},

	#[error("{0} unavailable")]
	DependencyUnavailable(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl FlagsServerError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, FlagsServerError::NotFound)
	}
}

pub type Result<T> = std::result::Result<T, FlagsServerError>;
