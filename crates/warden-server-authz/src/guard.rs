// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authorization entrypoint used by call sites.
//!
//! [`AuthorizationGuard::authorize`] runs, in order:
//! 1. tenant isolation on the resource's `orgId`
//! 2. residency and classification clearance
//! 3. the static role check, when the request carries an [`RbacRequirement`]
//! 4. permission profiles, when the request names any
//! 5. tenant policy evaluation, when the request names an action and resource type
//!
//! The first failing step ends evaluation with [`AuthzError::Forbidden`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use warden_authz_core::rbac::{self, granted_permissions};
use warden_authz_core::{
	check_clearance, keys, satisfies_any_profile, Attributes, ClearanceRequirement, DelegatedAdminScope,
	OrgId, OrgRole, PermissionMap, RbacRequirement, ResidencyZone, SubjectClearance, UserId,
};

use crate::error::{AuthzError, DenyReason, Result};
use crate::service::PolicyResolutionService;

/// Deployment-level guard behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOptions {
	/// Compare residency zones. When false only classification is checked.
	pub enforce_residency: bool,
	/// Zone assumed for subjects that carry none.
	pub default_zone: Option<ResidencyZone>,
}

impl Default for GuardOptions {
	fn default() -> Self {
		Self {
			enforce_residency: true,
			default_zone: None,
		}
	}
}

/// Everything the guard needs to decide one request.
#[derive(Debug, Clone)]
pub struct GuardRequest {
	pub org_id: OrgId,
	pub user_id: UserId,
	pub action: Option<String>,
	pub resource_type: Option<String>,
	/// Role names held by the subject. Unknown names are ignored by RBAC but
	/// still exposed to policy conditions.
	pub subject_roles: Vec<String>,
	pub subject_attributes: Attributes,
	pub resource_attributes: Attributes,
	/// Explicit clearance requirement. Read from the resource attributes when absent.
	pub clearance: Option<ClearanceRequirement>,
	pub rbac: Option<RbacRequirement>,
	/// Any one of these must be satisfied by the subject's permissions.
	pub permission_profiles: Vec<PermissionMap>,
	/// Permissions granted outside the fixed roles, e.g. by custom tenant roles.
	pub granted_permissions: PermissionMap,
}

impl GuardRequest {
	pub fn new(org_id: OrgId, user_id: UserId) -> Self {
		Self {
			org_id,
			user_id,
			action: None,
			resource_type: None,
			subject_roles: Vec::new(),
			subject_attributes: Attributes::new(),
			resource_attributes: Attributes::new(),
			clearance: None,
			rbac: None,
			permission_profiles: Vec::new(),
			granted_permissions: PermissionMap::new(),
		}
	}

	/// Builder: evaluate tenant policies for this action on this resource type.
	pub fn with_action(mut self, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self.resource_type = Some(resource_type.into());
		self
	}

	pub fn with_role(mut self, role: impl Into<String>) -> Self {
		self.subject_roles.push(role.into());
		self
	}

	pub fn with_subject(mut self, attributes: Attributes) -> Self {
		self.subject_attributes = attributes;
		self
	}

	pub fn with_resource(mut self, attributes: Attributes) -> Self {
		self.resource_attributes = attributes;
		self
	}

	pub fn with_clearance(mut self, clearance: ClearanceRequirement) -> Self {
		self.clearance = Some(clearance);
		self
	}

	pub fn with_rbac(mut self, requirement: RbacRequirement) -> Self {
		self.rbac = Some(requirement);
		self
	}

	pub fn with_profile(mut self, profile: PermissionMap) -> Self {
		self.permission_profiles.push(profile);
		self
	}

	pub fn with_granted(mut self, granted: PermissionMap) -> Self {
		self.granted_permissions = granted;
		self
	}

	/// Fixed roles named by `subject_roles`, most privileged first.
	pub fn known_roles(&self) -> Vec<OrgRole> {
		OrgRole::all()
			.iter()
			.copied()
			.filter(|role| self.subject_roles.iter().any(|r| r == role.as_str()))
			.collect()
	}

	/// Subject attributes as seen by conditions: the supplied map plus
	/// `userId`, `orgId`, `roles` and `role` when not already present.
	pub fn effective_subject(&self) -> Attributes {
		let mut subject = self.subject_attributes.clone();
		if !subject.contains_key(keys::USER_ID) {
			subject.insert(keys::USER_ID, self.user_id.as_str());
		}
		if !subject.contains_key(keys::ORG_ID) {
			subject.insert(keys::ORG_ID, self.org_id.as_str());
		}
		if !self.subject_roles.is_empty() {
			if !subject.contains_key(keys::ROLES) {
				let roles: Vec<Value> = self.subject_roles.iter().map(|r| Value::from(r.as_str())).collect();
				subject.insert(keys::ROLES, roles);
			}
			if !subject.contains_key(keys::ROLE) {
				let primary = self
					.known_roles()
					.first()
					.map(|r| r.as_str().to_string())
					.or_else(|| self.subject_roles.first().cloned());
				if let Some(primary) = primary {
					subject.insert(keys::ROLE, primary);
				}
			}
		}
		subject
	}
}

/// What allowed a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardOutcome {
	/// Delegated scope that satisfied the role check, if the role alone did not.
	pub matched_scope: Option<DelegatedAdminScope>,
	/// Tenant policy that allowed the request. `None` for owner bypass or when
	/// no action was evaluated.
	pub matched_policy: Option<String>,
	pub policy_evaluated: bool,
}

pub struct AuthorizationGuard {
	service: Arc<PolicyResolutionService>,
	options: GuardOptions,
}

fn forbidden(reason: DenyReason) -> AuthzError {
	tracing::debug!(reason = %reason, "request denied");
	AuthzError::Forbidden(reason)
}

impl AuthorizationGuard {
	pub fn new(service: Arc<PolicyResolutionService>) -> Self {
		Self::with_options(service, GuardOptions::default())
	}

	pub fn with_options(service: Arc<PolicyResolutionService>, options: GuardOptions) -> Self {
		Self { service, options }
	}

	pub fn service(&self) -> &Arc<PolicyResolutionService> {
		&self.service
	}

	/// Runs every check, failing with [`AuthzError::Forbidden`] on the first denial.
	pub async fn authorize(&self, request: &GuardRequest) -> Result<GuardOutcome> {
		self.authorize_at(request, Utc::now()).await
	}

	/// [`authorize`](Self::authorize) with an explicit clock for scope expiry.
	#[instrument(skip(self, request), fields(org_id = %request.org_id, user_id = %request.user_id, action = ?request.action, resource_type = ?request.resource_type))]
	pub async fn authorize_at(&self, request: &GuardRequest, now: DateTime<Utc>) -> Result<GuardOutcome> {
		self.check_tenant(request)?;
		self.check_clearance(request)?;

		let mut outcome = GuardOutcome::default();
		let roles = request.known_roles();

		if let Some(requirement) = &request.rbac {
			outcome.matched_scope = Self::check_rbac(&roles, requirement, now)?;
		}

		if !request.permission_profiles.is_empty() {
			let mut granted = request.granted_permissions.clone();
			for role in &roles {
				granted.merge(&granted_permissions(*role));
			}
			if !satisfies_any_profile(&granted, &request.permission_profiles) {
				return Err(forbidden(DenyReason::Permission));
			}
		}

		if let (Some(action), Some(resource_type)) = (&request.action, &request.resource_type) {
			let decision = self
				.service
				.decide(
					&request.org_id,
					action,
					resource_type,
					&request.effective_subject(),
					&request.resource_attributes,
				)
				.await?;
			if !decision.allowed {
				return Err(forbidden(DenyReason::Policy));
			}
			outcome.matched_policy = decision.matched_policy;
			outcome.policy_evaluated = true;
		}

		tracing::debug!(matched_policy = outcome.matched_policy.as_deref(), "request authorized");
		Ok(outcome)
	}

	/// Like [`authorize`](Self::authorize) but reports denial as `false`.
	/// Infrastructure errors still propagate.
	pub async fn is_allowed(&self, request: &GuardRequest) -> Result<bool> {
		match self.authorize(request).await {
			Ok(_) => Ok(true),
			Err(AuthzError::Forbidden(_)) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn check_tenant(&self, request: &GuardRequest) -> Result<()> {
		match request.resource_attributes.get(keys::ORG_ID) {
			None | Some(Value::Null) => Ok(()),
			Some(value) if value.as_str() == Some(request.org_id.as_str()) => Ok(()),
			Some(_) => Err(forbidden(DenyReason::Tenant)),
		}
	}

	fn check_clearance(&self, request: &GuardRequest) -> Result<()> {
		let requirement = request
			.clearance
			.clone()
			.unwrap_or_else(|| ClearanceRequirement::from_attributes(&request.resource_attributes));
		if requirement.is_empty() {
			return Ok(());
		}

		let mut subject = SubjectClearance::from_attributes(&request.subject_attributes);
		if subject.residency_zone.is_none() {
			subject.residency_zone = self.options.default_zone.clone();
		}

		check_clearance(&subject, &requirement, self.options.enforce_residency)
			.map_err(|denial| forbidden(DenyReason::Clearance(denial)))
	}

	fn check_rbac(
		roles: &[OrgRole],
		requirement: &RbacRequirement,
		now: DateTime<Utc>,
	) -> Result<Option<DelegatedAdminScope>> {
		if roles.is_empty() {
			return Err(forbidden(DenyReason::Role {
				reasons: vec!["subject holds no recognised role".to_string()],
			}));
		}

		let mut reasons = Vec::new();
		for role in roles {
			let decision = rbac::evaluate(*role, requirement, now);
			if decision.allowed {
				return Ok(decision.matched_scope);
			}
			reasons.extend(decision.reasons);
		}

		Err(forbidden(DenyReason::Role { reasons }))
	}
}
