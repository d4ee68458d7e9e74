// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core authorization engine for Warden.
//!
//! This crate is pure and synchronous. It provides:
//! - Wildcard selector matching for actions and resource types
//! - Attribute conditions with dynamic `$subject.*` / `$resource.*` references
//! - Tolerant normalization of stored policy records
//! - The priority-ordered first-match decision loop and bootstrap defaults
//! - Permission-map composition with legacy resource aliases
//! - Static role checks with delegated admin scopes
//! - Residency and classification clearance
//!
//! Repository access and guard orchestration live in `warden-server-authz`.

pub mod bootstrap;
pub mod clearance;
pub mod condition;
pub mod normalize;
pub mod permissions;
pub mod policy;
pub mod rbac;
pub mod selector;
pub mod types;

pub use bootstrap::bootstrap_policies;
pub use clearance::{check_clearance, ClearanceDenial, ClearanceRequirement, SubjectClearance};
pub use condition::{Condition, ConditionError, Operand, Operator, Rule};
pub use normalize::{resolve_policy_set, PolicyValidationError};
pub use permissions::{
	permissions_satisfy, permissions_satisfy_exact, resource_aliases, satisfies_any_profile,
	PermissionMap, ResourceAliases,
};
pub use policy::{decide, sort_by_priority, Effect, Policy, PolicyDecision};
pub use rbac::{DelegatedAdminScope, RbacDecision, RbacRequirement, RoleStatement};
pub use types::{
	keys, Attributes, DataClassification, OrgId, OrgRole, ParseEnumError, ResidencyZone, UserId,
};
