// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization guard behaviour.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
	/// Compare data-residency zones before role and policy checks.
	pub enforce_residency: bool,
	/// Zone assumed for subjects that carry none.
	pub default_zone: Option<String>,
}

impl Default for GuardConfig {
	fn default() -> Self {
		Self {
			enforce_residency: true,
			default_zone: None,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardConfigLayer {
	#[serde(default)]
	pub enforce_residency: Option<bool>,
	#[serde(default)]
	pub default_zone: Option<String>,
}

impl GuardConfigLayer {
	pub fn merge(&mut self, other: GuardConfigLayer) {
		if other.enforce_residency.is_some() {
			self.enforce_residency = other.enforce_residency;
		}
		if other.default_zone.is_some() {
			self.default_zone = other.default_zone;
		}
	}

	pub fn finalize(self) -> GuardConfig {
		GuardConfig {
			enforce_residency: self.enforce_residency.unwrap_or(true),
			default_zone: self
				.default_zone
				.map(|z| z.trim().to_string())
				.filter(|z| !z.is_empty()),
		}
	}
}
