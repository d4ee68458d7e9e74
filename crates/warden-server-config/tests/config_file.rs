// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;
use warden_server_config::{load_from_sources, ConfigError, DefaultsSource, TomlSource};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(contents.as_bytes()).unwrap();
	file
}

#[test]
fn file_values_override_defaults() {
	let file = write_config(
		r#"
[database]
url = "sqlite:/var/lib/warden/authz.db"

[logging]
level = "debug"
json = true

[guard]
enforce_residency = false
default_zone = "eu-west"
"#,
	);

	let config = load_from_sources(vec![Box::new(DefaultsSource), Box::new(TomlSource::new(file.path()))]).unwrap();

	assert_eq!(config.database.url, "sqlite:/var/lib/warden/authz.db");
	assert_eq!(config.logging.level, "debug");
	assert!(config.logging.json);
	assert!(!config.guard.enforce_residency);
	assert_eq!(config.guard.default_zone.as_deref(), Some("eu-west"));
}

#[test]
fn partial_file_keeps_other_defaults() {
	let file = write_config("[guard]\ndefault_zone = \"us\"\n");

	let config = load_from_sources(vec![Box::new(TomlSource::new(file.path())), Box::new(DefaultsSource)]).unwrap();

	assert_eq!(config.database.url, "sqlite:./warden.db");
	assert_eq!(config.logging.level, "info");
	assert!(config.guard.enforce_residency);
}

#[test]
fn invalid_file_is_reported_with_path() {
	let file = write_config("[logging]\nlevel = 3\n");

	let err = load_from_sources(vec![Box::new(TomlSource::new(file.path()))]).unwrap_err();
	match err {
		ConfigError::TomlParse { path, .. } => assert_eq!(path, file.path()),
		other => panic!("unexpected error: {other}"),
	}
}

#[test]
fn invalid_level_in_file_fails_validation() {
	let file = write_config("[logging]\nlevel = \"loud\"\n");

	let err = load_from_sources(vec![Box::new(TomlSource::new(file.path()))]).unwrap_err();
	assert!(matches!(err, ConfigError::Validation(_)));
}
