// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered client configuration: defaults, then a TOML file, then environment.
//!
//! Environment convention: `CUBECRAFT_ANALYTICS_<FIELD>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::batch::BatchConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ROUTE_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "CUBECRAFT_ANALYTICS_";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("invalid configuration: {0}")]
	Validation(String),
}

/// Partial configuration; every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfigLayer {
	pub api_url: Option<String>,
	pub session_timeout_secs: Option<u64>,
	pub batch_size: Option<usize>,
	pub flush_interval_ms: Option<u64>,
	pub route_settle_ms: Option<u64>,
	pub request_timeout_secs: Option<u64>,
}

impl AnalyticsConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: AnalyticsConfigLayer) {
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.session_timeout_secs.is_some() {
			self.session_timeout_secs = other.session_timeout_secs;
		}
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.route_settle_ms.is_some() {
			self.route_settle_ms = other.route_settle_ms;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> AnalyticsConfig {
		AnalyticsConfig {
			api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
			session_timeout: self
				.session_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_SESSION_TIMEOUT),
			batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
			flush_interval: self
				.flush_interval_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_FLUSH_INTERVAL),
			route_settle_delay: self
				.route_settle_ms
				.map(Duration::from_millis)
				.unwrap_or(DEFAULT_ROUTE_SETTLE_DELAY),
			request_timeout: self
				.request_timeout_secs
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
		}
	}
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsConfig {
	/// Base URL the ingestion paths are appended to.
	pub api_url: String,
	/// A session older than this is replaced on next use.
	pub session_timeout: Duration,
	pub batch_size: usize,
	pub flush_interval: Duration,
	/// Delay between a route change and its page view.
	pub route_settle_delay: Duration,
	pub request_timeout: Duration,
}

impl Default for AnalyticsConfig {
	fn default() -> Self {
		AnalyticsConfigLayer::default().finalize()
	}
}

impl AnalyticsConfig {
	/// Loads defaults, then `path` if given and present, then the environment.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut merged = AnalyticsConfigLayer::default();
		if let Some(path) = path {
			merged.merge(TomlSource::new(path).load()?);
		}
		merged.merge(EnvSource::new().load()?);

		let config = merged.finalize();
		config.validate()?;
		debug!(api_url = %config.api_url, batch_size = config.batch_size, "analytics configuration loaded");
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"api_url must be an http(s) URL, got '{}'",
				self.api_url
			)));
		}
		if self.batch_size == 0 {
			return Err(ConfigError::Validation("batch_size must be at least 1".to_string()));
		}
		if self.flush_interval.is_zero() {
			return Err(ConfigError::Validation("flush_interval must be non-zero".to_string()));
		}
		if self.session_timeout.is_zero() {
			return Err(ConfigError::Validation("session_timeout must be non-zero".to_string()));
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::Validation("request_timeout must be non-zero".to_string()));
		}
		Ok(())
	}

	pub fn batch_config(&self) -> BatchConfig {
		BatchConfig {
			batch_size: self.batch_size,
			flush_interval: self.flush_interval,
		}
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

	pub fn load(&self) -> Result<AnalyticsConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AnalyticsConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(path = %self.path.display(), "parsed analytics config file");
		Ok(layer)
	}
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
pub struct EnvSource {
	lookup: EnvLookup,
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl EnvSource {
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads variables through `lookup` instead of the process environment.
	pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, field: &str) -> Option<(String, String)> {
		let name = format!("{ENV_PREFIX}{field}");
		(self.lookup)(&name)
			.filter(|v| !v.trim().is_empty())
			.map(|v| (name, v.trim().to_string()))
	}

	fn number<T: std::str::FromStr>(&self, field: &str) -> Result<Option<T>, ConfigError> {
		match self.var(field) {
			Some((name, value)) => value.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name,
				message: format!("invalid number '{value}'"),
			}),
			None => Ok(None),
		}
	}

	pub fn load(&self) -> Result<AnalyticsConfigLayer, ConfigError> {
		trace!("loading analytics configuration from environment");
		Ok(AnalyticsConfigLayer {
			api_url: self.var("API_URL").map(|(_, v)| v),
			session_timeout_secs: self.number("SESSION_TIMEOUT_SECS")?,
			batch_size: self.number("BATCH_SIZE")?,
			flush_interval_ms: self.number("FLUSH_INTERVAL_MS")?,
			route_settle_ms: self.number("ROUTE_SETTLE_MS")?,
			request_timeout_secs: self.number("REQUEST_TIMEOUT_SECS")?,
		})
	}
}
