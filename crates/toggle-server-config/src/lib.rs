// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Toggle server.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML config file (`/etc/toggle/server.toml` unless overridden)
//! 3. Environment variables (`TOGGLE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use toggle_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub cache: CacheConfig,
	pub evaluation: EvaluationConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Loads configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Loads configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Loads configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(EnvSource)];
	load_from_sources(sources)
}

/// Merges `sources` in precedence order and finalizes the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolves a merged layer into a validated configuration.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		cache: layer.cache.unwrap_or_default().finalize(),
		evaluation: layer.evaluation.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		cache_ttl_secs = config.cache.ttl_secs,
		cache_max_entries = config.cache.max_entries,
		dependency_timeout_ms = config.evaluation.dependency_timeout_ms,
		log_format = %config.logging.format,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Longest accepted cache TTL (one day).
pub const MAX_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Longest accepted dependency timeout.
pub const MAX_DEPENDENCY_TIMEOUT_MS: u64 = 60_000;

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.cache.ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"cache.ttl_secs must be greater than zero".to_string(),
		));
	}
	if config.cache.ttl_secs > MAX_CACHE_TTL_SECS {
		return Err(ConfigError::Validation(format!(
			"cache.ttl_secs must be at most {MAX_CACHE_TTL_SECS}"
		)));
	}
	if config.cache.max_entries == 0 {
		return Err(ConfigError::Validation(
			"cache.max_entries must be greater than zero".to_string(),
		));
	}
	if config.evaluation.dependency_timeout_ms == 0 {
		return Err(ConfigError::Validation(
			"evaluation.dependency_timeout_ms must be greater than zero".to_string(),
		));
	}
	if config.evaluation.dependency_timeout_ms > MAX_DEPENDENCY_TIMEOUT_MS {
		return Err(ConfigError::Validation(format!(
			"evaluation.dependency_timeout_ms must be at most {MAX_DEPENDENCY_TIMEOUT_MS}"
		)));
	}
	Ok(())
}
