// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache layer consulted before the configuration store.
//!
//! The cache is shared and externally owned in production deployments; the
//! resolver only reads from it and writes entries after a store hit. Entries
//! are never invalidated explicitly, so configuration changes become visible
//! once the TTL runs out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::Result;

/// Prefix of every key written by the resolver.
pub const CACHE_KEY_PREFIX: &str = "flags:v1:";

/// Default time-to-live of a cached configuration.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);

/// Longest time-to-live an entry can be stored with; longer TTLs are clamped.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Key-value cache with per-entry expiry.
#[async_trait]
pub trait FlagCache: Send + Sync {
	/// Returns the serialized value, or `None` on a miss or expired entry.
	async fn get(&self, key: &str) -> Result<Option<String>>;

	/// Stores `value` unconditionally, replacing any existing entry.
	async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

/// Builds the cache key for a (api key, feature key, environment) triple.
///
/// Each part is length-prefixed before hashing, so no choice of delimiter
/// inside a field can make two triples collide. Hashing also keeps raw API
/// keys out of the shared cache.
pub fn cache_key(api_key: &str, feature_key: &str, environment: &str) -> String {
	let mut hasher = Sha256::new();
	for part in [api_key, feature_key, environment] {
		hasher.update(part.len().to_string().as_bytes());
		hasher.update(b":");
		hasher.update(part.as_bytes());
	}
	format!("{CACHE_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone)]
struct CacheEntry {
	value: String,
	expires_at: Instant,
}

/// Process-local [`FlagCache`].
///
/// Expired entries are dropped lazily on read or by [`purge_expired`]. When
/// full, expired entries are purged first and then the entry closest to
/// expiry is evicted.
///
/// [`purge_expired`]: InMemoryFlagCache::purge_expired
#[derive(Debug)]
pub struct InMemoryFlagCache {
	entries: RwLock<HashMap<String, CacheEntry>>,
	max_entries: usize,
}

impl Default for InMemoryFlagCache {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryFlagCache {
	pub fn new() -> Self {
		Self::with_max_entries(DEFAULT_MAX_ENTRIES)
	}

	pub fn with_max_entries(max_entries: usize) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			max_entries: max_entries.max(1),
		}
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	/// Drops every expired entry and returns how many were removed.
	pub async fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, entry| entry.expires_at > now);
		before - entries.len()
	}
}

#[async_trait]
impl FlagCache for InMemoryFlagCache {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		let now = Instant::now();

		{
			let entries = self.entries.read().await;
			match entries.get(key) {
				Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
				Some(_) => {}
				None => return Ok(None),
			}
		}

		let mut entries = self.entries.write().await;
		if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
			entries.remove(key);
		}
		Ok(None)
	}

	async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		let now = Instant::now();
		let ttl = ttl.min(MAX_CACHE_TTL);
		let mut entries = self.entries.write().await;

		if !entries.contains_key(key) && entries.len() >= self.max_entries {
			entries.retain(|_, entry| entry.expires_at > now);
			if entries.len() >= self.max_entries {
				if let Some(victim) = entries
					.iter()
					.min_by_key(|(_, entry)| entry.expires_at)
					.map(|(k, _)| k.clone())
				{
					entries.remove(&victim);
				}
			}
		}

		entries.insert(
			key.to_string(),
			CacheEntry {
				value,
				expires_at: now + ttl,
			},
		);
		Ok(())
	}
}
