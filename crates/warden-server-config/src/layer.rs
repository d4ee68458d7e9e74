// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration each source produces.

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, GuardConfigLayer, LoggingConfigLayer};

/// Every section is optional so that later sources only override what they set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub guard: Option<GuardConfigLayer>,
}

fn merge_section<T, F>(base: &mut Option<T>, other: Option<T>, merge: F)
where
	F: FnOnce(&mut T, T),
{
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.guard, other.guard, GuardConfigLayer::merge);
	}
}
