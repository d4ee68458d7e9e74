// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_authz_core::{resolve_policy_set, Attributes, OrgId, ResidencyZone, UserId};
use warden_server_authz::{
	AuthorizationGuard, AuthzError, GuardOptions, GuardRequest, InMemoryPolicyRepository,
	PolicyResolutionService, SqliteRepositoryFactory,
};
use warden_server_config::AuthzConfig;

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
	/// Organization (tenant) the request is made in
	#[arg(long)]
	pub org: String,

	/// Acting user id
	#[arg(long, default_value = "cli")]
	pub user: String,

	/// Role held by the subject (repeatable)
	#[arg(long = "role")]
	pub roles: Vec<String>,

	/// Action to check, e.g. `read`
	#[arg(long)]
	pub action: String,

	/// Resource type to check, e.g. `leaveRequest`
	#[arg(long = "resource-type")]
	pub resource_type: String,

	/// Subject attributes as a JSON object
	#[arg(long)]
	pub subject: Option<String>,

	/// Resource attributes as a JSON object
	#[arg(long)]
	pub resource: Option<String>,

	/// JSON file with the tenant's policy records; the configured database is used otherwise
	#[arg(long)]
	pub policies: Option<PathBuf>,

	/// Print the result as JSON
	#[arg(long)]
	pub json: bool,
}

/// Result of a `check` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
	pub allowed: bool,
	pub matched_policy: Option<String>,
	/// Internal deny category; printed locally only.
	pub deny_reason: Option<String>,
}

impl CheckReport {
	pub fn render(&self, as_json: bool) -> String {
		if as_json {
			return json!({
				"allowed": self.allowed,
				"matchedPolicy": self.matched_policy,
				"denyReason": self.deny_reason,
			})
			.to_string();
		}

		match (self.allowed, &self.matched_policy, &self.deny_reason) {
			(true, Some(policy), _) => format!("allow (policy: {policy})"),
			(true, None, _) => "allow".to_string(),
			(false, _, Some(reason)) => format!("deny ({reason})"),
			(false, _, None) => "deny".to_string(),
		}
	}
}

fn parse_attributes(raw: Option<&str>, flag: &str) -> Result<Attributes> {
	match raw {
		None => Ok(Attributes::new()),
		Some(raw) => serde_json::from_str(raw).with_context(|| format!("--{flag} must be a JSON object")),
	}
}

/// Reads a JSON array of raw policy records.
pub fn read_policy_file(path: &Path) -> Result<Vec<Value>> {
	let content =
		std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
	let value: Value =
		serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))?;
	match value {
		Value::Array(records) => Ok(records),
		_ => bail!("{} must contain a JSON array of policy records", path.display()),
	}
}

fn guard_options(config: &AuthzConfig) -> GuardOptions {
	GuardOptions {
		enforce_residency: config.guard.enforce_residency,
		default_zone: config.guard.default_zone.as_deref().map(ResidencyZone::new),
	}
}

pub async fn run_check(args: &CheckArgs, config: &AuthzConfig) -> Result<CheckReport> {
	let org_id = OrgId::new(args.org.clone());

	let service = match &args.policies {
		Some(path) => {
			let records = read_policy_file(path)?;
			let repo = InMemoryPolicyRepository::new().with_policies(org_id.clone(), records);
			PolicyResolutionService::with_repository(Arc::new(repo))
		}
		None => PolicyResolutionService::new(Arc::new(SqliteRepositoryFactory::new(config.database.url.clone()))),
	};
	let guard = AuthorizationGuard::with_options(Arc::new(service), guard_options(config));

	let mut request = GuardRequest::new(org_id, UserId::new(args.user.clone()))
		.with_action(args.action.clone(), args.resource_type.clone())
		.with_subject(parse_attributes(args.subject.as_deref(), "subject")?)
		.with_resource(parse_attributes(args.resource.as_deref(), "resource")?);
	for role in &args.roles {
		request = request.with_role(role.clone());
	}

	match guard.authorize(&request).await {
		Ok(outcome) => Ok(CheckReport {
			allowed: true,
			matched_policy: outcome.matched_policy,
			deny_reason: None,
		}),
		Err(AuthzError::Forbidden(reason)) => Ok(CheckReport {
			allowed: false,
			matched_policy: None,
			deny_reason: Some(reason.to_string()),
		}),
		Err(e) => Err(e).context("policy evaluation failed"),
	}
}

/// Normalizes a policy file and renders the effective, sorted set.
pub fn run_normalize(path: &Path) -> Result<String> {
	let records = read_policy_file(path)?;
	let policies = resolve_policy_set(&records);
	tracing::info!(
		records = records.len(),
		policies = policies.len(),
		"normalized policy file"
	);
	serde_json::to_string_pretty(&policies).context("failed to render policies")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn policy_file(records: Value) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(records.to_string().as_bytes()).unwrap();
		file
	}

	fn check_args(path: Option<PathBuf>) -> CheckArgs {
		CheckArgs {
			org: "org-1".to_string(),
			user: "u-1".to_string(),
			roles: vec!["member".to_string()],
			action: "read".to_string(),
			resource_type: "leaveRequest".to_string(),
			subject: None,
			resource: None,
			policies: path,
			json: false,
		}
	}

	mod check {
		use super::*;

		#[tokio::test]
		async fn empty_policy_file_uses_bootstrap() {
			let file = policy_file(json!([]));
			let report = run_check(&check_args(Some(file.path().to_path_buf())), &AuthzConfig::default())
				.await
				.unwrap();
			assert!(report.allowed);
			assert_eq!(report.matched_policy.as_deref(), Some("bootstrap-member-read"));
			assert_eq!(report.render(false), "allow (policy: bootstrap-member-read)");
		}

		#[tokio::test]
		async fn denial_is_reported_not_raised() {
			let file = policy_file(json!([]));
			let mut args = check_args(Some(file.path().to_path_buf()));
			args.action = "delete".to_string();

			let report = run_check(&args, &AuthzConfig::default()).await.unwrap();
			assert!(!report.allowed);
			assert_eq!(report.render(false), "deny (policy)");
			let rendered: Value = serde_json::from_str(&report.render(true)).unwrap();
			assert_eq!(rendered["allowed"], false);
		}

		#[tokio::test]
		async fn resource_attributes_feed_conditions() {
			let file = policy_file(json!([{
				"id": "own-only",
				"description": "",
				"effect": "allow",
				"actions": ["read"],
				"resources": ["leaveRequest"],
				"condition": { "resource": { "ownerId": "$subject.userId" } },
				"priority": 1,
			}]));
			let mut args = check_args(Some(file.path().to_path_buf()));
			args.resource = Some(r#"{"ownerId": "u-1"}"#.to_string());
			assert!(run_check(&args, &AuthzConfig::default()).await.unwrap().allowed);

			args.resource = Some(r#"{"ownerId": "u-2"}"#.to_string());
			assert!(!run_check(&args, &AuthzConfig::default()).await.unwrap().allowed);
		}

		#[tokio::test]
		async fn malformed_attributes_are_an_error() {
			let file = policy_file(json!([]));
			let mut args = check_args(Some(file.path().to_path_buf()));
			args.subject = Some("[1, 2]".to_string());
			let err = run_check(&args, &AuthzConfig::default()).await.unwrap_err();
			assert!(err.to_string().contains("--subject"));
		}
	}

	mod normalize {
		use super::*;

		#[test]
		fn renders_sorted_policies() {
			let file = policy_file(json!([
				{ "id": "low", "effect": "allow", "actions": ["read"], "resources": ["*"], "priority": 1 },
				{ "id": "high", "effect": "deny", "actions": ["*"], "resources": ["*"], "priority": 9 },
				{ "id": 3 },
			]));
			let rendered: Value = serde_json::from_str(&run_normalize(file.path()).unwrap()).unwrap();
			let ids: Vec<&str> = rendered
				.as_array()
				.unwrap()
				.iter()
				.map(|p| p["id"].as_str().unwrap())
				.collect();
			assert_eq!(ids, ["high", "low"]);
		}

		#[test]
		fn non_array_file_is_rejected() {
			let file = policy_file(json!({ "id": "x" }));
			assert!(run_normalize(file.path()).is_err());
		}
	}
}
