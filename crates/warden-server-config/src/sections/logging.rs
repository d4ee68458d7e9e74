// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration.

use serde::Deserialize;

/// Accepted values for `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	/// Default filter directive used when `RUST_LOG` is unset.
	pub level: String,
	/// Emit JSON lines instead of human-readable output.
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json: false,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub json: Option<bool>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.json.is_some() {
			self.json = other.json;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let defaults = LoggingConfig::default();
		LoggingConfig {
			level: self
				.level
				.map(|l| l.trim().to_ascii_lowercase())
				.unwrap_or(defaults.level),
			json: self.json.unwrap_or(defaults.json),
		}
	}
}

impl LoggingConfig {
	pub fn is_valid_level(&self) -> bool {
		LOG_LEVELS.contains(&self.level.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn known_levels_survive_case_and_padding(
			index in 0..LOG_LEVELS.len(),
			upper in any::<bool>(),
			pad in " {0,3}",
		) {
			let level = if upper { LOG_LEVELS[index].to_uppercase() } else { LOG_LEVELS[index].to_string() };
			let layer = LoggingConfigLayer {
				level: Some(format!("{pad}{level}{pad}")),
				json: None,
			};
			let config = layer.finalize();
			prop_assert_eq!(config.level.as_str(), LOG_LEVELS[index]);
			prop_assert!(config.is_valid_level());
		}
	}

	#[test]
	fn test_defaults() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config.level, "info");
		assert!(!config.json);
		assert!(config.is_valid_level());
	}

	#[test]
	fn test_level_is_normalized() {
		let layer = LoggingConfigLayer {
			level: Some(" DEBUG ".to_string()),
			json: Some(true),
		};
		let config = layer.finalize();
		assert_eq!(config.level, "debug");
		assert!(config.json);
	}

	#[test]
	fn test_unknown_level_is_invalid() {
		let layer = LoggingConfigLayer {
			level: Some("verbose".to_string()),
			json: None,
		};
		assert!(!layer.finalize().is_valid_level());
	}
}
