// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side feature flag evaluation for Toggle.
//!
//! # Architecture
//!
//! - `store` - Configuration store (SQLite and in-memory)
//! - `cache` - TTL cache consulted before the store
//! - `resolver` - Read-through resolution with bounded dependency calls
//! - `evaluation` - Orchestrates resolution, rules and rollout into a boolean
//! - `pool` - Connection pool and schema
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use toggle_server_flags::{
//!     ConfigResolver, EvaluationRequest, FlagEvaluator, InMemoryFlagCache, SqliteConfigStore,
//! };
//!
//! let store = Arc::new(SqliteConfigStore::new(pool));
//! let resolver = ConfigResolver::new(store, Arc::new(InMemoryFlagCache::new()));
//! let evaluator = FlagEvaluator::new(Arc::new(resolver));
//!
//! let request = EvaluationRequest::new("key_live", "new_checkout", "production")
//!     .with_user_id("u1");
//! let enabled = evaluator.evaluate(&request).await;
//! ```

pub mod cache;
pub mod error;
pub mod evaluation;
pub mod pool;
pub mod resolver;
pub mod store;
pub mod testing;

pub use cache::{
	cache_key, FlagCache, InMemoryFlagCache, CACHE_KEY_PREFIX, DEFAULT_CACHE_TTL, MAX_CACHE_TTL,
};
pub use error::{FlagsServerError, Result};
pub use evaluation::{evaluate_configuration, FlagEvaluator};
pub use pool::{create_pool, run_migrations};
pub use resolver::{ConfigResolver, ResolverConfig, DEFAULT_DEPENDENCY_TIMEOUT};
pub use store::{ConfigStore, InMemoryConfigStore, SqliteConfigStore};

// Re-export core types for convenience
pub use toggle_flags_core::*;
