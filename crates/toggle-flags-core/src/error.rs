// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised while loading flag configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlagsError {
	#[error("malformed rule on field '{field}': {reason}")]
	MalformedRule { field: String, reason: String },

	#[error("unknown rule operator '{0}'")]
	UnknownOperator(String),
}

pub type Result<T> = std::result::Result<T, FlagsError>;
