// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `warden-authz`: evaluate and inspect tenant authorization policies.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_server_config::AuthzConfig;

mod commands;
mod version;

use commands::CheckArgs;

#[derive(Parser, Debug)]
#[command(name = "warden-authz", about = "Warden authorization policy tool", version)]
struct Args {
	/// Configuration file (defaults to /etc/warden/authz.toml)
	#[arg(long, global = true, env = "WARDEN_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Decide whether a subject may perform an action on a resource type
	Check(CheckArgs),
	/// Print the effective, priority-sorted policy set for a JSON policy file
	Normalize {
		/// JSON file containing an array of policy records
		path: PathBuf,
	},
	/// Show version and build information
	Version,
}

fn init_tracing(config: &AuthzConfig) {
	let json = config.logging.json;
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
		.with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(ExitCode::SUCCESS);
	}

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path)?,
		None => warden_server_config::load_config()?,
	};
	init_tracing(&config);

	match args.command {
		Command::Check(check) => {
			let report = commands::run_check(&check, &config).await?;
			println!("{}", report.render(check.json));
			Ok(if report.allowed {
				ExitCode::SUCCESS
			} else {
				ExitCode::from(1)
			})
		}
		Command::Normalize { path } => {
			println!("{}", commands::run_normalize(&path)?);
			Ok(ExitCode::SUCCESS)
		}
		Command::Version => Ok(ExitCode::SUCCESS),
	}
}
