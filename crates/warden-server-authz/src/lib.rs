// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side authorization for Warden.
//!
//! Wraps the pure engine in `warden-authz-core` with tenant policy storage,
//! lazy repository acquisition, and the [`AuthorizationGuard`] entrypoint.

pub mod error;
pub mod guard;
pub mod repository;
pub mod service;

pub use error::{AuthzError, DenyReason, RepositoryError, Result};
pub use guard::{AuthorizationGuard, GuardOptions, GuardOutcome, GuardRequest};
pub use repository::{
	create_pool, ensure_schema, InMemoryPolicyRepository, PolicyRepository, SqlitePolicyRepository,
};
pub use service::{PolicyResolutionService, RepositoryFactory, SqliteRepositoryFactory};
