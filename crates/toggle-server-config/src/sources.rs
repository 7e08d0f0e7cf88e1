// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	CacheConfigLayer, DatabaseConfigLayer, EvaluationConfigLayer, HttpConfigLayer, LogFormat,
	LoggingConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/toggle/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TOGGLE_SERVER_<FIELD>, with the section name where the field
/// alone would be ambiguous.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_vars(&|name| std::env::var(name).ok())
	}
}

type VarLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn layer_from_vars(lookup: &VarLookup<'_>) -> Result<ServerConfigLayer, ConfigError> {
	let format = match var(lookup, "TOGGLE_SERVER_LOG_FORMAT") {
		Some(v) => Some(
			LogFormat::from_str(&v).map_err(|message| ConfigError::InvalidValue {
				key: "TOGGLE_SERVER_LOG_FORMAT".to_string(),
				message,
			})?,
		),
		None => None,
	};

	Ok(ServerConfigLayer {
		http: Some(HttpConfigLayer {
			host: var(lookup, "TOGGLE_SERVER_HOST"),
			port: parsed_var(lookup, "TOGGLE_SERVER_PORT", "u16")?,
		}),
		database: Some(DatabaseConfigLayer {
			url: var(lookup, "TOGGLE_SERVER_DATABASE_URL"),
		}),
		cache: Some(CacheConfigLayer {
			ttl_secs: parsed_var(lookup, "TOGGLE_SERVER_CACHE_TTL_SECS", "u64")?,
			max_entries: parsed_var(lookup, "TOGGLE_SERVER_CACHE_MAX_ENTRIES", "usize")?,
		}),
		evaluation: Some(EvaluationConfigLayer {
			dependency_timeout_ms: parsed_var(lookup, "TOGGLE_SERVER_DEPENDENCY_TIMEOUT_MS", "u64")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: var(lookup, "TOGGLE_SERVER_LOG_LEVEL"),
			format,
		}),
	})
}

fn var(lookup: &VarLookup<'_>, name: &str) -> Option<String> {
	lookup(name).filter(|s| !s.is_empty())
}

fn parsed_var<T: FromStr>(
	lookup: &VarLookup<'_>,
	name: &str,
	kind: &str,
) -> Result<Option<T>, ConfigError> {
	match var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}
