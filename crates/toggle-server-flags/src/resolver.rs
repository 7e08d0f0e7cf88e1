// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-through resolution of flag configuration.
//!
//! Order of operations:
//! 1. Cache lookup. Errors, timeouts and undecodable payloads count as a miss.
//! 2. Store lookup. A missing project, feature or environment is `NotFound`.
//! 3. Best-effort cache write of the resolved configuration.
//!
//! Concurrent misses for the same key each query the store; there is no
//! in-flight coalescing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use toggle_flags_core::FlagConfiguration;

use crate::cache::{cache_key, FlagCache, DEFAULT_CACHE_TTL};
use crate::error::{FlagsServerError, Result};
use crate::store::ConfigStore;

/// Default bound on each cache or store call.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_millis(250);

/// Tuning for [`ConfigResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
	pub cache_ttl: Duration,
	pub dependency_timeout: Duration,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			cache_ttl: DEFAULT_CACHE_TTL,
			dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
		}
	}
}

pub struct ConfigResolver {
	store: Arc<dyn ConfigStore>,
	cache: Arc<dyn FlagCache>,
	config: ResolverConfig,
}

impl ConfigResolver {
	pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<dyn FlagCache>) -> Self {
		Self::with_config(store, cache, ResolverConfig::default())
	}

	pub fn with_config(
		store: Arc<dyn ConfigStore>,
		cache: Arc<dyn FlagCache>,
		config: ResolverConfig,
	) -> Self {
		Self {
			store,
			cache,
			config,
		}
	}

	pub fn config(&self) -> ResolverConfig {
		self.config
	}

	pub fn store(&self) -> &Arc<dyn ConfigStore> {
		&self.store
	}

	/// Resolves the configuration for one flag in one environment.
	#[instrument(skip(self, api_key), fields(feature_key = %feature_key, environment = %environment))]
	pub async fn resolve(
		&self,
		api_key: &str,
		feature_key: &str,
		environment: &str,
	) -> Result<FlagConfiguration> {
		let key = cache_key(api_key, feature_key, environment);

		if let Some(config) = self.read_cache(&key).await {
			return Ok(config);
		}

		let config = self.read_store(api_key, feature_key, environment).await?;
		self.write_cache(&key, &config).await;
		Ok(config)
	}

	fn timeout_ms(&self) -> u64 {
		u64::try_from(self.config.dependency_timeout.as_millis()).unwrap_or(u64::MAX)
	}

	async fn read_cache(&self, key: &str) -> Option<FlagConfiguration> {
		match timeout(self.config.dependency_timeout, self.cache.get(key)).await {
			Ok(Ok(Some(payload))) => match decode_cached(&payload) {
				Ok(config) => {
					debug!("cache hit");
					Some(config)
				}
				Err(e) => {
					warn!(error = %e, "undecodable cache entry, treating as miss");
					None
				}
			},
			Ok(Ok(None)) => {
				debug!("cache miss");
				None
			}
			Ok(Err(e)) => {
				warn!(error = %e, "cache read failed, treating as miss");
				None
			}
			Err(_) => {
				warn!(timeout_ms = self.timeout_ms(), "cache read timed out, treating as miss");
				None
			}
		}
	}

	async fn read_store(
		&self,
		api_key: &str,
		feature_key: &str,
		environment: &str,
	) -> Result<FlagConfiguration> {
		let lookup = self.store.lookup(api_key, feature_key, environment);
		match timeout(self.config.dependency_timeout, lookup).await {
			Ok(Ok(Some(config))) => Ok(config),
			Ok(Ok(None)) => {
				debug!("no configuration in store");
				Err(FlagsServerError::NotFound)
			}
			Ok(Err(e)) => {
				warn!(error = %e, "configuration store lookup failed");
				Err(FlagsServerError::DependencyUnavailable(format!(
					"configuration store: {e}"
				)))
			}
			Err(_) => {
				warn!(timeout_ms = self.timeout_ms(), "configuration store lookup timed out");
				Err(FlagsServerError::DependencyTimeout {
					dependency: "configuration store",
					timeout_ms: self.timeout_ms(),
				})
			}
		}
	}

	async fn write_cache(&self, key: &str, config: &FlagConfiguration) {
		let payload = match encode_for_cache(config) {
			Ok(payload) => payload,
			Err(e) => {
				warn!(error = %e, "failed to serialize configuration for cache");
				return;
			}
		};

		let write = self.cache.set_with_ttl(key, payload, self.config.cache_ttl);
		match timeout(self.config.dependency_timeout, write).await {
			Ok(Ok(())) => debug!(ttl_secs = self.config.cache_ttl.as_secs(), "cached configuration"),
			Ok(Err(e)) => warn!(error = %e, "cache write failed"),
			Err(_) => warn!(timeout_ms = self.timeout_ms(), "cache write timed out"),
		}
	}
}

fn encode_for_cache(config: &FlagConfiguration) -> Result<String> {
	Ok(serde_json::to_string(config)?)
}

fn decode_cached(payload: &str) -> Result<FlagConfiguration> {
	Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InMemoryFlagCache;
	use crate::store::InMemoryConfigStore;
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct FailingCache {
		sets: AtomicUsize,
	}

	#[async_trait]
	impl FlagCache for FailingCache {
		async fn get(&self, _key: &str) -> Result<Option<String>> {
			Err(FlagsServerError::DependencyUnavailable("cache".to_string()))
		}

		async fn set_with_ttl(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
			self.sets.fetch_add(1, Ordering::SeqCst);
			Err(FlagsServerError::DependencyUnavailable("cache".to_string()))
		}
	}

	struct HangingCache;

	#[async_trait]
	impl FlagCache for HangingCache {
		async fn get(&self, _key: &str) -> Result<Option<String>> {
			tokio::time::sleep(Duration::from_secs(3600)).await;
			Ok(None)
		}

		async fn set_with_ttl(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
			tokio::time::sleep(Duration::from_secs(3600)).await;
			Ok(())
		}
	}

	struct SlowStore;

	#[async_trait]
	impl ConfigStore for SlowStore {
		async fn lookup(&self, _: &str, _: &str, _: &str) -> Result<Option<FlagConfiguration>> {
			tokio::time::sleep(Duration::from_secs(10)).await;
			Ok(Some(FlagConfiguration::new(true, 100)))
		}
	}

	struct BrokenStore;

	#[async_trait]
	impl ConfigStore for BrokenStore {
		async fn lookup(&self, _: &str, _: &str, _: &str) -> Result<Option<FlagConfiguration>> {
			Err(FlagsServerError::Internal("connection reset".to_string()))
		}
	}

	async fn store_with_flag() -> Arc<InMemoryConfigStore> {
		let store = Arc::new(InMemoryConfigStore::new());
		store
			.insert(
				"key_live",
				"new_checkout",
				"production",
				FlagConfiguration::from_stored(
					true,
					40,
					&[json!({"field": "plan", "operator": "equals", "value": "premium"})],
				),
			)
			.await;
		store
	}

	#[tokio::test]
	async fn test_second_resolution_is_served_from_cache() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::new(store.clone(), cache.clone());

		let first = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		let second = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();

		assert_eq!(first, second);
		assert_eq!(store.lookup_count(), 1);
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn test_not_found_is_not_cached() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::new(store.clone(), cache.clone());

		let err = resolver
			.resolve("key_unknown", "new_checkout", "production")
			.await
			.unwrap_err();
		assert!(err.is_not_found());
		assert_eq!(store.lookup_count(), 1);
		assert!(cache.is_empty().await);

		resolver
			.resolve("key_unknown", "new_checkout", "production")
			.await
			.unwrap_err();
		assert_eq!(store.lookup_count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_store_is_queried_again_after_ttl() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::new(store.clone(), cache);

		resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		tokio::time::advance(Duration::from_secs(121)).await;
		resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();

		assert_eq!(store.lookup_count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_changes_are_stale_until_ttl_expires() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::new(store.clone(), cache);

		let before = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		assert!(before.enabled);

		store
			.insert(
				"key_live",
				"new_checkout",
				"production",
				FlagConfiguration::new(false, 40),
			)
			.await;

		tokio::time::advance(Duration::from_secs(60)).await;
		let stale = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		assert!(stale.enabled);

		tokio::time::advance(Duration::from_secs(61)).await;
		let fresh = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		assert!(!fresh.enabled);
	}

	#[tokio::test]
	async fn test_cache_failures_fall_back_to_store() {
		let store = store_with_flag().await;
		let cache = Arc::new(FailingCache {
			sets: AtomicUsize::new(0),
		});
		let resolver = ConfigResolver::new(store.clone(), cache.clone());

		let config = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		assert!(config.enabled);
		assert_eq!(store.lookup_count(), 1);
		assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_hanging_cache_is_bounded() {
		let store = store_with_flag().await;
		let resolver = ConfigResolver::new(store.clone(), Arc::new(HangingCache));

		let config = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();
		assert_eq!(config.rollout_percentage, 40);
		assert_eq!(store.lookup_count(), 1);
	}

	#[tokio::test]
	async fn test_undecodable_cache_entry_is_a_miss() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let key = cache_key("key_live", "new_checkout", "production");
		cache
			.set_with_ttl(&key, "{not json".to_string(), Duration::from_secs(60))
			.await
			.unwrap();

		let resolver = ConfigResolver::new(store.clone(), cache.clone());
		let config = resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.unwrap();

		assert!(config.enabled);
		assert_eq!(store.lookup_count(), 1);
		let repaired = cache.get(&key).await.unwrap().unwrap();
		assert!(serde_json::from_str::<FlagConfiguration>(&repaired).is_ok());
	}

	#[test]
	fn test_cache_payload_errors_are_serialization_errors() {
		let err = decode_cached("{not json").unwrap_err();
		assert!(matches!(err, FlagsServerError::Serialization(_)));

		let config = FlagConfiguration::new(true, 25);
		let payload = encode_for_cache(&config).unwrap();
		assert_eq!(decode_cached(&payload).unwrap(), config);
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_store_times_out() {
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::new(Arc::new(SlowStore), cache.clone());

		let err = resolver.resolve("k", "f", "dev").await.unwrap_err();
		assert!(matches!(
			err,
			FlagsServerError::DependencyTimeout { timeout_ms: 250, .. }
		));
		assert!(cache.is_empty().await);
	}

	#[tokio::test]
	async fn test_store_error_is_unavailable() {
		let resolver = ConfigResolver::new(Arc::new(BrokenStore), Arc::new(InMemoryFlagCache::new()));
		let err = resolver.resolve("k", "f", "dev").await.unwrap_err();
		assert!(matches!(err, FlagsServerError::DependencyUnavailable(_)));
	}

	#[tokio::test]
	async fn test_custom_ttl_is_used() {
		let store = store_with_flag().await;
		let cache = Arc::new(InMemoryFlagCache::new());
		let resolver = ConfigResolver::with_config(
			store,
			cache,
			ResolverConfig {
				cache_ttl: Duration::from_secs(5),
				dependency_timeout: Duration::from_millis(100),
			},
		);
		assert_eq!(resolver.config().cache_ttl, Duration::from_secs(5));
		assert!(resolver
			.resolve("key_live", "new_checkout", "production")
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn test_concurrent_misses_all_resolve() {
		let store = store_with_flag().await;
		let resolver = Arc::new(ConfigResolver::new(
			store.clone(),
			Arc::new(InMemoryFlagCache::new()),
		));

		let handles: Vec<_> = (0..16)
			.map(|_| {
				let resolver = Arc::clone(&resolver);
				tokio::spawn(async move {
					resolver
						.resolve("key_live", "new_checkout", "production")
						.await
				})
			})
			.collect();

		for handle in handles {
			assert!(handle.await.unwrap().is_ok());
		}
		let lookups = store.lookup_count();
		assert!((1..=16).contains(&lookups), "lookups {lookups}");
	}
}
