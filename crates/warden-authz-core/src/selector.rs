// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Action and resource selector matching.
//!
//! A selector is one of:
//!
//! - `"*"`: matches every value
//! - `"prefix*"`: matches values starting with `prefix` (prefix must be non-empty)
//! - anything else: exact match
//!
//! There are no regex or substring semantics.

/// The universal selector.
pub const WILDCARD: &str = "*";

/// Returns true if `value` is matched by any of `patterns`.
pub fn matches<S: AsRef<str>>(value: &str, patterns: &[S]) -> bool {
	patterns
		.iter()
		.any(|pattern| matches_one(value, pattern.as_ref()))
}

/// Returns true if `value` is matched by a single selector.
pub fn matches_one(value: &str, pattern: &str) -> bool {
	if pattern == WILDCARD {
		return true;
	}

	if let Some(prefix) = pattern.strip_suffix('*') {
		if !prefix.is_empty() && value.starts_with(prefix) {
			return true;
		}
	}

	pattern == value
}
