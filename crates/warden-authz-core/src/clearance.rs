// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Data-residency and classification clearance checks.

use crate::types::{keys, Attributes, DataClassification, ResidencyZone};
use serde::{Deserialize, Serialize};

/// What a resource demands of the subject before any role or policy check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceRequirement {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub residency_zone: Option<ResidencyZone>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub classification: Option<DataClassification>,
}

impl ClearanceRequirement {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
		self.residency_zone = Some(ResidencyZone::new(zone));
		self
	}

	pub fn with_classification(mut self, classification: DataClassification) -> Self {
		self.classification = Some(classification);
		self
	}

	/// Reads `residencyZone` and `classification` from resource attributes.
	/// Unrecognised classification strings are treated as `restricted`.
	pub fn from_attributes(resource: &Attributes) -> Self {
		Self {
			residency_zone: resource.get_str(keys::RESIDENCY_ZONE).map(ResidencyZone::new),
			classification: resource
				.get_str(keys::CLASSIFICATION)
				.map(|c| c.parse().unwrap_or(DataClassification::Restricted)),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.residency_zone.is_none() && self.classification.is_none()
	}
}

/// The clearance a subject holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectClearance {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub residency_zone: Option<ResidencyZone>,
	#[serde(default)]
	pub classification: DataClassification,
}

impl SubjectClearance {
	pub fn new(classification: DataClassification) -> Self {
		Self {
			residency_zone: None,
			classification,
		}
	}

	pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
		self.residency_zone = Some(ResidencyZone::new(zone));
		self
	}

	/// Reads clearance from subject attributes. Unrecognised classification
	/// strings grant only `public`.
	pub fn from_attributes(subject: &Attributes) -> Self {
		Self {
			residency_zone: subject.get_str(keys::RESIDENCY_ZONE).map(ResidencyZone::new),
			classification: subject
				.get_str(keys::CLASSIFICATION)
				.and_then(|c| c.parse().ok())
				.unwrap_or_default(),
		}
	}
}

/// Why a clearance check failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClearanceDenial {
	#[error("residency zone mismatch")]
	ResidencyMismatch {
		required: ResidencyZone,
		actual: Option<ResidencyZone>,
	},

	#[error("insufficient classification clearance")]
	InsufficientClassification {
		required: DataClassification,
		actual: DataClassification,
	},
}

/// Checks a subject's clearance against a requirement.
///
/// Residency is compared only when `enforce_residency` is set; a subject with
/// no zone never satisfies a zone requirement.
pub fn check_clearance(
	subject: &SubjectClearance,
	requirement: &ClearanceRequirement,
	enforce_residency: bool,
) -> Result<(), ClearanceDenial> {
	if enforce_residency {
		if let Some(required) = &requirement.residency_zone {
			let matches = subject
				.residency_zone
				.as_ref()
				.is_some_and(|zone| zone.as_str().eq_ignore_ascii_case(required.as_str()));
			if !matches {
				return Err(ClearanceDenial::ResidencyMismatch {
					required: required.clone(),
					actual: subject.residency_zone.clone(),
				});
			}
		}
	}

	if let Some(required) = requirement.classification {
		if subject.classification.rank() < required.rank() {
			return Err(ClearanceDenial::InsufficientClassification {
				required,
				actual: subject.classification,
			});
		}
	}

	Ok(())
}
