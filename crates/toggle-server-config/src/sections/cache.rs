// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag configuration cache.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 120;
const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
	pub ttl_secs: u64,
	pub max_entries: usize,
}

impl CacheConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			ttl_secs: DEFAULT_TTL_SECS,
			max_entries: DEFAULT_MAX_ENTRIES,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub ttl_secs: Option<u64>,
	#[serde(default)]
	pub max_entries: Option<usize>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.ttl_secs.is_some() {
			self.ttl_secs = other.ttl_secs;
		}
		if other.max_entries.is_some() {
			self.max_entries = other.max_entries;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			ttl_secs: self.ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
			max_entries: self.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
		}
	}
}
