// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation path tuning.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_DEPENDENCY_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
	/// Upper bound on each cache or store call.
	pub dependency_timeout_ms: u64,
}

impl EvaluationConfig {
	pub fn dependency_timeout(&self) -> Duration {
		Duration::from_millis(self.dependency_timeout_ms)
	}
}

impl Default for EvaluationConfig {
	fn default() -> Self {
		Self {
			dependency_timeout_ms: DEFAULT_DEPENDENCY_TIMEOUT_MS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationConfigLayer {
	#[serde(default)]
	pub dependency_timeout_ms: Option<u64>,
}

impl EvaluationConfigLayer {
	pub fn merge(&mut self, other: EvaluationConfigLayer) {
		if other.dependency_timeout_ms.is_some() {
			self.dependency_timeout_ms = other.dependency_timeout_ms;
		}
	}

	pub fn finalize(self) -> EvaluationConfig {
		EvaluationConfig {
			dependency_timeout_ms: self
				.dependency_timeout_ms
				.unwrap_or(DEFAULT_DEPENDENCY_TIMEOUT_MS),
		}
	}
}
