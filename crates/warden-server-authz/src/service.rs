// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant policy resolution.
//!
//! [`PolicyResolutionService`] loads a tenant's stored records, substitutes the
//! bootstrap set when none exist, normalizes and sorts them, and runs the
//! first-match decision loop. Owners bypass all of this.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::instrument;
use warden_authz_core::{bootstrap_policies, decide, resolve_policy_set, Attributes, OrgId, Policy, PolicyDecision};

use crate::error::RepositoryError;
use crate::repository::{create_pool, ensure_schema, PolicyRepository, SqlitePolicyRepository};

/// Builds the repository on first use.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
	async fn create(&self) -> Result<Arc<dyn PolicyRepository>, RepositoryError>;
}

/// Opens a SQLite pool and ensures the policy table exists.
pub struct SqliteRepositoryFactory {
	database_url: String,
}

impl SqliteRepositoryFactory {
	pub fn new(database_url: impl Into<String>) -> Self {
		Self {
			database_url: database_url.into(),
		}
	}
}

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
	async fn create(&self) -> Result<Arc<dyn PolicyRepository>, RepositoryError> {
		let pool = create_pool(&self.database_url).await?;
		ensure_schema(&pool).await?;
		Ok(Arc::new(SqlitePolicyRepository::new(pool)))
	}
}

type RepositoryCell = Arc<OnceCell<Arc<dyn PolicyRepository>>>;

pub struct PolicyResolutionService {
	factory: Option<Arc<dyn RepositoryFactory>>,
	slot: Mutex<RepositoryCell>,
}

impl PolicyResolutionService {
	/// A service that builds its repository lazily on first use.
	pub fn new(factory: Arc<dyn RepositoryFactory>) -> Self {
		Self {
			factory: Some(factory),
			slot: Mutex::new(Arc::new(OnceCell::new())),
		}
	}

	/// A service bound to an existing repository.
	pub fn with_repository(repository: Arc<dyn PolicyRepository>) -> Self {
		Self {
			factory: None,
			slot: Mutex::new(Arc::new(OnceCell::new_with(Some(repository)))),
		}
	}

	/// Replaces the repository. Initializations already in flight complete
	/// against the old slot; every later call sees `repository`.
	pub fn set_repository(&self, repository: Arc<dyn PolicyRepository>) {
		let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
		*slot = Arc::new(OnceCell::new_with(Some(repository)));
		tracing::debug!("policy repository replaced");
	}

	async fn repository(&self) -> Result<Arc<dyn PolicyRepository>, RepositoryError> {
		let cell = self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone();

		let repository = cell
			.get_or_try_init(|| async {
				let factory = self
					.factory
					.as_ref()
					.ok_or_else(|| RepositoryError::Initialization("no repository configured".to_string()))?;
				tracing::debug!("initializing policy repository");
				factory.create().await
			})
			.await?;

		Ok(Arc::clone(repository))
	}

	/// The tenant's effective policy set, sorted by descending priority.
	///
	/// An empty store yields the bootstrap set. A repository error is returned
	/// as-is and never replaced by the bootstrap set.
	#[instrument(skip(self), fields(org_id = %org_id))]
	pub async fn get_policies(&self, org_id: &OrgId) -> Result<Vec<Policy>, RepositoryError> {
		let raw = self.repository().await?.get_policies_for_org(org_id).await?;

		if raw.is_empty() {
			tracing::debug!("no stored policies, using bootstrap set");
			return Ok(bootstrap_policies());
		}

		let policies = resolve_policy_set(&raw);
		if policies.is_empty() {
			tracing::warn!(stored = raw.len(), "no stored policy survived normalization");
		}
		Ok(policies)
	}

	/// Decides a request and reports which policy decided it.
	#[instrument(skip(self, subject, resource), fields(org_id = %org_id))]
	pub async fn decide(
		&self,
		org_id: &OrgId,
		action: &str,
		resource_type: &str,
		subject: &Attributes,
		resource: &Attributes,
	) -> Result<PolicyDecision, RepositoryError> {
		if subject.is_owner() {
			tracing::debug!(action, resource_type, "owner bypass");
			return Ok(PolicyDecision {
				allowed: true,
				matched_policy: None,
			});
		}

		let policies = self.get_policies(org_id).await?;
		let decision = decide(&policies, action, resource_type, subject, resource);

		tracing::debug!(
			action,
			resource_type,
			allowed = decision.allowed,
			matched_policy = decision.matched_policy.as_deref(),
			"policy decision"
		);
		Ok(decision)
	}

	/// Returns whether the request is allowed.
	pub async fn evaluate(
		&self,
		org_id: &OrgId,
		action: &str,
		resource_type: &str,
		subject: &Attributes,
		resource: &Attributes,
	) -> Result<bool, RepositoryError> {
		Ok(self
			.decide(org_id, action, resource_type, subject, resource)
			.await?
			.allowed)
	}
}
