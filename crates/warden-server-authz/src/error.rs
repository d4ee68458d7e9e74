// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use warden_authz_core::ClearanceDenial;

/// Failures of the policy store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Repository initialization failed: {0}")]
	Initialization(String),
}

/// Which guard step denied a request.
///
/// Never rendered to end users; [`AuthzError::Forbidden`] displays a generic
/// message regardless of the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
	/// The resource belongs to a different organization.
	Tenant,
	Clearance(ClearanceDenial),
	/// The static role check failed and no delegated scope applied.
	Role { reasons: Vec<String> },
	/// No permission profile was satisfied.
	Permission,
	/// The tenant policy set denied the request or nothing matched.
	Policy,
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DenyReason::Tenant => write!(f, "tenant"),
			DenyReason::Clearance(denial) => write!(f, "clearance: {denial}"),
			DenyReason::Role { .. } => write!(f, "role"),
			DenyReason::Permission => write!(f, "permission"),
			DenyReason::Policy => write!(f, "policy"),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
	#[error("not authorized")]
	Forbidden(DenyReason),

	#[error(transparent)]
	Repository(#[from] RepositoryError),
}

impl AuthzError {
	pub fn is_forbidden(&self) -> bool {
		matches!(self, AuthzError::Forbidden(_))
	}

	pub fn deny_reason(&self) -> Option<&DenyReason> {
		match self {
			AuthzError::Forbidden(reason) => Some(reason),
			AuthzError::Repository(_) => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthzError>;
