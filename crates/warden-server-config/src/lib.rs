// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for Warden authorization.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Policies stored in {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::AuthzConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub guard: GuardConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_*`)
/// 2. Config file (`/etc/warden/authz.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<AuthzConfig, ConfigError> {
	let mut merged = AuthzConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<std::path::PathBuf>) -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge sources in precedence order and finalize the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: AuthzConfigLayer) -> Result<AuthzConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let guard = layer.guard.unwrap_or_default().finalize();

	let config = AuthzConfig {
		database,
		logging,
		guard,
	};
	validate_config(&config)?;

	info!(
		database = %config.database.url,
		log_level = %config.logging.level,
		enforce_residency = config.guard.enforce_residency,
		default_zone = config.guard.default_zone.as_deref(),
		"Authorization configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &AuthzConfig) -> Result<(), ConfigError> {
	if config.database.url.trim().is_empty() {
		return Err(ConfigError::Validation("database.url must not be empty".to_string()));
	}

	if !config.logging.is_valid_level() {
		return Err(ConfigError::Validation(format!(
			"logging.level '{}' is not one of {}",
			config.logging.level,
			LOG_LEVELS.join(", ")
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	struct FixedSource(Precedence, &'static str);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
			Ok(toml::from_str(self.1).unwrap())
		}
	}

	#[test]
	fn test_defaults() {
		let config = finalize(AuthzConfigLayer::default()).unwrap();
		assert_eq!(config, AuthzConfig::default());
		assert_eq!(config.database.url, "sqlite:./warden.db");
		assert!(config.guard.enforce_residency);
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(FixedSource(Precedence::Environment, "[logging]\nlevel = \"warn\"")),
			Box::new(FixedSource(Precedence::ConfigFile, "[logging]\nlevel = \"debug\"")),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.logging.level, "warn");
	}

	#[test]
	fn test_empty_database_url_rejected() {
		let layer: AuthzConfigLayer = toml::from_str("[database]\nurl = \"  \"").unwrap();
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("database.url"));
	}

	#[test]
	fn test_unknown_log_level_rejected() {
		let layer: AuthzConfigLayer = toml::from_str("[logging]\nlevel = \"chatty\"").unwrap();
		let err = finalize(layer).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(err.to_string().contains("chatty"));
	}
}
