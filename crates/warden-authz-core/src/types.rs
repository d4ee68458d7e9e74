// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions shared by every evaluation layer.
//!
//! - **ID newtypes**: [`OrgId`] and [`UserId`] keep tenant and actor identifiers
//!   from being mixed up at call sites
//! - **Attributes**: [`Attributes`] is the subject/resource attribute map that
//!   conditions are evaluated against
//! - **Roles**: [`OrgRole`] is the fixed set of tenant roles known to RBAC
//! - **Clearance**: [`DataClassification`] ranks and [`ResidencyZone`]s

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a new ID from any string-like value.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Borrow the ID as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}

			/// Get the inner string value.
			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(OrgId, "Identifier of an organization (tenant).");
define_id_type!(UserId, "Identifier of an acting user.");

// =============================================================================
// Attributes
// =============================================================================

/// Well-known attribute keys used by the guard and the bootstrap policies.
pub mod keys {
	pub const USER_ID: &str = "userId";
	pub const ORG_ID: &str = "orgId";
	pub const ROLE: &str = "role";
	pub const ROLES: &str = "roles";
	pub const OWNER_ID: &str = "ownerId";
	pub const CLASSIFICATION: &str = "classification";
	pub const RESIDENCY_ZONE: &str = "residencyZone";
}

/// A subject or resource attribute map.
///
/// Values are arbitrary JSON so that tenant policies can reference attributes
/// this crate knows nothing about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: set an attribute.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.0.insert(key.into(), value.into());
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.0.insert(key.into(), value.into())
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Returns the attribute as a string slice when it is a JSON string.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(Value::as_str)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.0.iter()
	}

	/// Returns true if the `role` attribute equals `role` or the `roles`
	/// attribute is an array containing it.
	pub fn has_role(&self, role: &str) -> bool {
		if self.get_str(keys::ROLE) == Some(role) {
			return true;
		}
		match self.get(keys::ROLES) {
			Some(Value::Array(roles)) => roles.iter().any(|r| r.as_str() == Some(role)),
			_ => false,
		}
	}

	/// Returns true if the subject holds the tenant owner role.
	pub fn is_owner(&self) -> bool {
		self.has_role(OrgRole::Owner.as_str())
	}
}

impl FromIterator<(String, Value)> for Attributes {
	fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl From<serde_json::Map<String, Value>> for Attributes {
	fn from(map: serde_json::Map<String, Value>) -> Self {
		map.into_iter().collect()
	}
}

// =============================================================================
// Organization Roles
// =============================================================================

/// Fixed roles within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
	/// Full tenant control; bypasses policy evaluation.
	Owner,
	/// Manages organization settings and members.
	OrgAdmin,
	/// Manages HR resources and settings.
	HrAdmin,
	/// Approves requests for their reports.
	Manager,
	/// Standard member access.
	Member,
}

impl OrgRole {
	/// Returns all available organization roles.
	pub fn all() -> &'static [OrgRole] {
		&[
			OrgRole::Owner,
			OrgRole::OrgAdmin,
			OrgRole::HrAdmin,
			OrgRole::Manager,
			OrgRole::Member,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			OrgRole::Owner => "owner",
			OrgRole::OrgAdmin => "org_admin",
			OrgRole::HrAdmin => "hr_admin",
			OrgRole::Manager => "manager",
			OrgRole::Member => "member",
		}
	}
}

impl fmt::Display for OrgRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a string does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

impl FromStr for OrgRole {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrgRole::all()
			.iter()
			.copied()
			.find(|r| r.as_str() == s)
			.ok_or_else(|| ParseEnumError {
				kind: "role",
				value: s.to_string(),
			})
	}
}

// =============================================================================
// Clearance
// =============================================================================

/// Data classification levels, ordered from least to most sensitive.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
	#[default]
	Public,
	Internal,
	Confidential,
	Restricted,
}

impl DataClassification {
	pub fn rank(&self) -> u8 {
		match self {
			DataClassification::Public => 0,
			DataClassification::Internal => 1,
			DataClassification::Confidential => 2,
			DataClassification::Restricted => 3,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			DataClassification::Public => "public",
			DataClassification::Internal => "internal",
			DataClassification::Confidential => "confidential",
			DataClassification::Restricted => "restricted",
		}
	}
}

impl fmt::Display for DataClassification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DataClassification {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"public" => Ok(DataClassification::Public),
			"internal" => Ok(DataClassification::Internal),
			"confidential" => Ok(DataClassification::Confidential),
			"restricted" => Ok(DataClassification::Restricted),
			_ => Err(ParseEnumError {
				kind: "classification",
				value: s.to_string(),
			}),
		}
	}
}

/// A data-residency zone such as `eu` or `us-east`. Compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidencyZone(String);

impl ResidencyZone {
	pub fn new(zone: impl Into<String>) -> Self {
		Self(zone.into().trim().to_ascii_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ResidencyZone {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn has_role_reads_single_role() {
		let attrs = Attributes::new().with(keys::ROLE, "member");
		assert!(attrs.has_role("member"));
		assert!(!attrs.has_role("owner"));
	}

	#[test]
	fn has_role_reads_role_array() {
		let attrs = Attributes::new().with(keys::ROLES, json!(["manager", "owner"]));
		assert!(attrs.is_owner());
		assert!(attrs.has_role("manager"));
		assert!(!attrs.has_role("member"));
	}

	#[test]
	fn non_string_role_is_ignored() {
		let attrs = Attributes::new().with(keys::ROLE, json!(["owner"]));
		assert!(!attrs.is_owner());
	}

	#[test]
	fn org_role_roundtrips_through_str() {
		for role in OrgRole::all() {
			assert_eq!(role.as_str().parse::<OrgRole>().unwrap(), *role);
		}
		assert!("superuser".parse::<OrgRole>().is_err());
	}

	#[test]
	fn classification_ranks_are_ordered() {
		assert!(DataClassification::Restricted > DataClassification::Confidential);
		assert!(DataClassification::Internal.rank() > DataClassification::Public.rank());
		assert_eq!(
			"Confidential".parse::<DataClassification>().unwrap(),
			DataClassification::Confidential
		);
	}

	#[test]
	fn residency_zone_is_normalized() {
		assert_eq!(ResidencyZone::new(" EU "), ResidencyZone::new("eu"));
	}

	#[test]
	fn ids_display_their_inner_value() {
		let org = OrgId::from("org-1");
		assert_eq!(org.to_string(), "org-1");
		assert_eq!(UserId::new("u-1").as_str(), "u-1");
		assert_eq!(org.into_inner(), "org-1");
	}
}
