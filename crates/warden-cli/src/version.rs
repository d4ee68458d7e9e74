// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information and version utilities.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"warden-authz version: {}\n\
         Platform:             {}-{}",
		VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_info_names_the_binary() {
		let info = format_version_info();
		assert!(info.starts_with("warden-authz version: "));
		assert!(info.contains(VERSION));
	}
}
