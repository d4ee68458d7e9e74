// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static role-based access checks with time-bounded delegated scopes.
//!
//! Each [`OrgRole`] maps to a fixed list of [`RoleStatement`]s. A requirement
//! may name acceptable roles and required permissions; when the role alone
//! does not meet it, unexpired [`DelegatedAdminScope`]s are consulted in order.
//!
//! This layer matches resource keys exactly. Alias resolution belongs to the
//! dynamic permission-map layer in [`crate::permissions::permissions_satisfy`].

use crate::permissions::{permissions_satisfy_exact, PermissionMap};
use crate::selector::WILDCARD;
use crate::types::OrgRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resources and actions granted together by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStatement {
	pub resources: &'static [&'static str],
	pub actions: &'static [&'static str],
}

const HR_CASE_RESOURCES: &[&str] = &[
	"leaveRequest",
	"absenceCase",
	"onboardingCase",
	"complianceItem",
	"employeeProfile",
	"timeEntry",
	"hrDocument",
];

const OWNER_STATEMENTS: &[RoleStatement] = &[RoleStatement {
	resources: &[WILDCARD],
	actions: &[WILDCARD],
}];

const ORG_ADMIN_STATEMENTS: &[RoleStatement] = &[
	RoleStatement {
		resources: &["organization", "orgSettings", "orgMember", "hrSettings"],
		actions: &["read", "list", "create", "update", "invite", "remove"],
	},
	RoleStatement {
		resources: HR_CASE_RESOURCES,
		actions: &["read", "list"],
	},
];

const HR_ADMIN_STATEMENTS: &[RoleStatement] = &[
	RoleStatement {
		resources: HR_CASE_RESOURCES,
		actions: &["read", "list", "create", "update", "approve", "reject", "delete"],
	},
	RoleStatement {
		resources: &["hrSettings"],
		actions: &["read", "update"],
	},
	RoleStatement {
		resources: &["organization", "orgMember"],
		actions: &["read", "list"],
	},
];

const MANAGER_STATEMENTS: &[RoleStatement] = &[
	RoleStatement {
		resources: &["leaveRequest", "absenceCase", "timeEntry"],
		actions: &["read", "list", "approve", "reject"],
	},
	RoleStatement {
		resources: &["employeeProfile", "organization", "orgMember"],
		actions: &["read", "list"],
	},
];

const MEMBER_STATEMENTS: &[RoleStatement] = &[
	RoleStatement {
		resources: &["leaveRequest", "absenceCase", "timeEntry"],
		actions: &["read", "list", "create"],
	},
	RoleStatement {
		resources: &["employeeProfile", "organization", "hrDocument"],
		actions: &["read"],
	},
];

/// The fixed statements granted by a role.
pub fn role_statements(role: OrgRole) -> &'static [RoleStatement] {
	match role {
		OrgRole::Owner => OWNER_STATEMENTS,
		OrgRole::OrgAdmin => ORG_ADMIN_STATEMENTS,
		OrgRole::HrAdmin => HR_ADMIN_STATEMENTS,
		OrgRole::Manager => MANAGER_STATEMENTS,
		OrgRole::Member => MEMBER_STATEMENTS,
	}
}

/// Combines a role's statements into one permission map.
pub fn granted_permissions(role: OrgRole) -> PermissionMap {
	let mut granted = PermissionMap::new();
	for statement in role_statements(role) {
		for resource in statement.resources {
			granted.grant(*resource, statement.actions.iter().copied());
		}
	}
	granted
}

/// A temporary permission override independent of the subject's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedAdminScope {
	pub module: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowed_resources: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowed_actions: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audit_source: Option<String>,
}

impl DelegatedAdminScope {
	/// A scope for a module with no expiry and no resource restriction.
	pub fn new(module: impl Into<String>) -> Self {
		Self {
			module: module.into(),
			expires_at: None,
			allowed_resources: None,
			allowed_actions: None,
			audit_source: None,
		}
	}

	/// Builder: set the expiry.
	pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
		self.expires_at = Some(expires_at);
		self
	}

	/// Builder: restrict the scope to resources.
	pub fn with_resources<I, S>(mut self, resources: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_resources = Some(resources.into_iter().map(Into::into).collect());
		self
	}

	/// Builder: restrict the scope to actions.
	pub fn with_actions<I, S>(mut self, actions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_actions = Some(actions.into_iter().map(Into::into).collect());
		self
	}

	/// Builder: record where the delegation came from.
	pub fn with_audit_source(mut self, source: impl Into<String>) -> Self {
		self.audit_source = Some(source.into());
		self
	}

	/// A scope is active while it has no expiry or the expiry is in the future.
	pub fn is_active(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.map_or(true, |expires_at| expires_at > now)
	}

	/// The resource/action pairs this scope grants, or `None` when the scope
	/// names no resources and therefore overrides every requirement.
	///
	/// Without `allowed_actions` every action on the listed resources is granted.
	pub fn permissions(&self) -> Option<PermissionMap> {
		let resources = self.allowed_resources.as_ref().filter(|r| !r.is_empty())?;
		let actions: Vec<String> = match &self.allowed_actions {
			Some(actions) => actions.clone(),
			None => vec![WILDCARD.to_string()],
		};

		Some(
			resources
				.iter()
				.map(|resource| (resource.clone(), actions.clone()))
				.collect(),
		)
	}
}

/// What the static role layer requires of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacRequirement {
	#[serde(default)]
	pub required_roles: Vec<OrgRole>,
	#[serde(default)]
	pub required_permissions: PermissionMap,
	#[serde(default)]
	pub delegated_scopes: Vec<DelegatedAdminScope>,
}

impl RbacRequirement {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: accept a role.
	pub fn with_role(mut self, role: OrgRole) -> Self {
		self.required_roles.push(role);
		self
	}

	/// Builder: require actions on a resource.
	pub fn with_permission<I, S>(mut self, resource: impl Into<String>, actions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_permissions.grant(resource, actions);
		self
	}

	/// Builder: offer a delegated scope.
	pub fn with_scope(mut self, scope: DelegatedAdminScope) -> Self {
		self.delegated_scopes.push(scope);
		self
	}
}

/// Outcome of an RBAC check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacDecision {
	pub allowed: bool,
	/// Human-readable reasons collected while deciding. For internal logs only.
	pub reasons: Vec<String>,
	/// The delegated scope that granted access, if the role alone did not.
	pub matched_scope: Option<DelegatedAdminScope>,
}

impl RbacDecision {
	fn allowed(reasons: Vec<String>, matched_scope: Option<DelegatedAdminScope>) -> Self {
		Self {
			allowed: true,
			reasons,
			matched_scope,
		}
	}
}

fn describe(permissions: &PermissionMap) -> String {
	permissions
		.iter()
		.flat_map(|(resource, actions)| actions.iter().map(move |a| format!("{resource}:{a}")))
		.collect::<Vec<_>>()
		.join(", ")
}

/// Checks a role against a requirement, falling back to delegated scopes.
pub fn evaluate(role: OrgRole, requirement: &RbacRequirement, now: DateTime<Utc>) -> RbacDecision {
	let granted = granted_permissions(role);
	let required = &requirement.required_permissions;
	let mut reasons = Vec::new();

	if !requirement.required_roles.is_empty() && !requirement.required_roles.contains(&role) {
		reasons.push(format!("role `{role}` is not among the required roles"));
	}
	if !permissions_satisfy_exact(&granted, required) {
		reasons.push(format!(
			"role `{role}` lacks required permissions [{}]",
			describe(required)
		));
	}
	if reasons.is_empty() {
		return RbacDecision::allowed(reasons, None);
	}

	for scope in &requirement.delegated_scopes {
		if !scope.is_active(now) {
			reasons.push(format!("delegated scope `{}` has expired", scope.module));
			continue;
		}

		match scope.permissions() {
			None => return RbacDecision::allowed(reasons, Some(scope.clone())),
			Some(scoped) if permissions_satisfy_exact(&scoped, required) => {
				return RbacDecision::allowed(reasons, Some(scope.clone()));
			}
			Some(_) => reasons.push(format!(
				"delegated scope `{}` does not cover the required permissions",
				scope.module
			)),
		}
	}

	RbacDecision {
		allowed: false,
		reasons,
		matched_scope: None,
	}
}
