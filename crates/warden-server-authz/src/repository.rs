// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage of raw tenant policy records.
//!
//! Repositories return records exactly as stored. Validation happens later in
//! [`warden_authz_core::normalize`], so a repository only fails for
//! infrastructure reasons. An empty vector means the tenant has no policies;
//! a row whose JSON cannot be parsed is returned as a JSON string, which
//! normalization rejects, so it still counts as a stored record.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::instrument;
use warden_authz_core::OrgId;

use crate::error::RepositoryError;

/// Source of raw policy records for a tenant.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
	/// Returns the tenant's stored records in their stored order.
	async fn get_policies_for_org(&self, org_id: &OrgId) -> Result<Vec<Value>, RepositoryError>;
}

// =============================================================================
// SQLite
// =============================================================================

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Errors
/// Returns `RepositoryError::Initialization` if the URL is invalid, or
/// `RepositoryError::Sqlx` if the connection fails.
#[instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, RepositoryError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| RepositoryError::Initialization(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Creates the `tenant_policies` table if it does not exist.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), RepositoryError> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS tenant_policies (
			org_id TEXT NOT NULL,
			position INTEGER NOT NULL,
			policy_json TEXT NOT NULL,
			PRIMARY KEY (org_id, position)
		)
		"#,
	)
	.execute(pool)
	.await?;

	Ok(())
}

pub struct SqlitePolicyRepository {
	pool: SqlitePool,
}

impl SqlitePolicyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Replaces every stored record for a tenant, preserving slice order.
	#[instrument(skip(self, policies), fields(org_id = %org_id, count = policies.len()))]
	pub async fn replace_policies(&self, org_id: &OrgId, policies: &[Value]) -> Result<(), RepositoryError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM tenant_policies WHERE org_id = ?")
			.bind(org_id.as_str())
			.execute(&mut *tx)
			.await?;

		for (position, policy) in policies.iter().enumerate() {
			sqlx::query(
				r#"
				INSERT INTO tenant_policies (org_id, position, policy_json)
				VALUES (?, ?, ?)
				"#,
			)
			.bind(org_id.as_str())
			.bind(position as i64)
			.bind(serde_json::to_string(policy)?)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}
}

#[async_trait]
impl PolicyRepository for SqlitePolicyRepository {
	#[instrument(skip(self), fields(org_id = %org_id))]
	async fn get_policies_for_org(&self, org_id: &OrgId) -> Result<Vec<Value>, RepositoryError> {
		let rows: Vec<(i64, String)> = sqlx::query_as(
			r#"
			SELECT position, policy_json
			FROM tenant_policies
			WHERE org_id = ?
			ORDER BY position ASC
			"#,
		)
		.bind(org_id.as_str())
		.fetch_all(&self.pool)
		.await?;

		let mut policies = Vec::with_capacity(rows.len());
		for (position, json) in rows {
			match serde_json::from_str(&json) {
				Ok(value) => policies.push(value),
				Err(e) => {
					tracing::warn!(position, error = %e, "unparseable policy row kept as raw text");
					policies.push(Value::String(json));
				}
			}
		}

		tracing::debug!(count = policies.len(), "loaded tenant policies");
		Ok(policies)
	}
}

// =============================================================================
// In-memory
// =============================================================================

/// Repository backed by a map, for tests and the CLI.
#[derive(Default)]
pub struct InMemoryPolicyRepository {
	policies: RwLock<HashMap<OrgId, Vec<Value>>>,
}

impl InMemoryPolicyRepository {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: seed a tenant's records.
	pub fn with_policies(mut self, org_id: OrgId, policies: Vec<Value>) -> Self {
		self.policies.get_mut().insert(org_id, policies);
		self
	}

	pub async fn set_policies(&self, org_id: OrgId, policies: Vec<Value>) {
		self.policies.write().await.insert(org_id, policies);
	}

	pub async fn clear(&self, org_id: &OrgId) {
		self.policies.write().await.remove(org_id);
	}
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
	async fn get_policies_for_org(&self, org_id: &OrgId) -> Result<Vec<Value>, RepositoryError> {
		Ok(self.policies.read().await.get(org_id).cloned().unwrap_or_default())
	}
}
