// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission maps and permission-profile composition.
//!
//! A [`PermissionMap`] maps a resource key to the set of actions allowed on it.
//! Required permissions are checked against a granted map either exactly
//! ([`permissions_satisfy_exact`], used by the static role layer) or through
//! the resource alias table ([`permissions_satisfy`]), which makes maps written
//! with canonical dotted keys (`hr.leave.request`) and maps written with legacy
//! short keys (`hrLeave`) interchangeable.
//!
//! In a granted map the key `"*"` stands for every resource and the action
//! `"*"` for every action.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::selector::WILDCARD;

/// Canonical resource keys and the legacy keys that name the same resource.
const RESOURCE_ALIAS_TABLE: &[(&str, &[&str])] = &[
	("hr.leave.request", &["hrLeave", "leaveRequest"]),
	("hr.absence.case", &["hrAbsence", "absenceCase"]),
	("hr.onboarding.case", &["hrOnboarding", "onboardingCase"]),
	("hr.compliance.item", &["hrCompliance", "complianceItem"]),
	("hr.employee.profile", &["hrEmployee", "employeeProfile"]),
	("hr.time.entry", &["hrTimeEntry", "timeEntry"]),
	("hr.document", &["hrDocument"]),
	("hr.settings", &["hrSettings"]),
	("org.settings", &["orgSettings"]),
	("org.member", &["orgMember", "organizationMember"]),
];

// =============================================================================
// PermissionMap
// =============================================================================

/// Resource key → allowed actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, BTreeSet<String>>);

impl PermissionMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: grant actions on a resource.
	pub fn with<I, S>(mut self, resource: impl Into<String>, actions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.grant(resource, actions);
		self
	}

	/// Adds actions to a resource, merging with any already present.
	pub fn grant<I, S>(&mut self, resource: impl Into<String>, actions: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.0
			.entry(resource.into())
			.or_default()
			.extend(actions.into_iter().map(Into::into));
	}

	/// Merges every entry of `other` into this map.
	pub fn merge(&mut self, other: &PermissionMap) {
		for (resource, actions) in &other.0 {
			self.grant(resource.clone(), actions.iter().cloned());
		}
	}

	pub fn actions(&self, resource: &str) -> Option<&BTreeSet<String>> {
		self.0.get(resource)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
		self.0.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if `action` on `resource` is granted, honouring wildcards
	/// but not aliases.
	pub fn allows(&self, resource: &str, action: &str) -> bool {
		granted_actions(self, &[resource]).allows(action)
	}
}

impl<K, I, S> FromIterator<(K, I)> for PermissionMap
where
	K: Into<String>,
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	fn from_iter<T: IntoIterator<Item = (K, I)>>(iter: T) -> Self {
		let mut map = PermissionMap::new();
		for (resource, actions) in iter {
			map.grant(resource, actions);
		}
		map
	}
}

// =============================================================================
// Alias table
// =============================================================================

/// Forward (canonical → legacy) and reverse (legacy → canonical) lookups over
/// the resource alias table.
#[derive(Debug)]
pub struct ResourceAliases {
	forward: HashMap<&'static str, Vec<&'static str>>,
	reverse: HashMap<&'static str, Vec<&'static str>>,
}

impl ResourceAliases {
	fn build(table: &[(&'static str, &'static [&'static str])]) -> Self {
		let mut forward: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
		let mut reverse: HashMap<&'static str, Vec<&'static str>> = HashMap::new();

		for &(canonical, legacy_keys) in table {
			for &legacy in legacy_keys {
				forward.entry(canonical).or_default().push(legacy);
				reverse.entry(legacy).or_default().push(canonical);
			}
		}

		Self { forward, reverse }
	}

	/// Legacy keys for a canonical key.
	pub fn aliases_of(&self, canonical: &str) -> &[&'static str] {
		self.forward.get(canonical).map(Vec::as_slice).unwrap_or_default()
	}

	/// Canonical keys a legacy key aliases.
	pub fn canonicals_of(&self, legacy: &str) -> &[&'static str] {
		self.reverse.get(legacy).map(Vec::as_slice).unwrap_or_default()
	}

	/// Every key naming the same resource as `key`, starting with `key` itself.
	pub fn equivalents<'a>(&self, key: &'a str) -> Vec<&'a str> {
		let mut keys = vec![key];
		let mut push = |k: &'static str| {
			if !keys.contains(&k) {
				keys.push(k);
			}
		};

		for &legacy in self.aliases_of(key) {
			push(legacy);
		}
		for &canonical in self.canonicals_of(key) {
			push(canonical);
			for &sibling in self.aliases_of(canonical) {
				push(sibling);
			}
		}

		keys
	}
}

/// The process-wide alias lookup, built on first use.
pub fn resource_aliases() -> &'static ResourceAliases {
	static ALIASES: OnceLock<ResourceAliases> = OnceLock::new();
	ALIASES.get_or_init(|| ResourceAliases::build(RESOURCE_ALIAS_TABLE))
}

// =============================================================================
// Satisfaction checks
// =============================================================================

/// Union of the granted actions found under a set of resource keys.
struct GrantedActions<'a> {
	actions: BTreeSet<&'a str>,
}

impl GrantedActions<'_> {
	fn allows(&self, action: &str) -> bool {
		self.actions.contains(WILDCARD) || self.actions.contains(action)
	}
}

fn granted_actions<'a>(granted: &'a PermissionMap, keys: &[&str]) -> GrantedActions<'a> {
	let actions = keys
		.iter()
		.copied()
		.chain(std::iter::once(WILDCARD))
		.filter_map(|key| granted.actions(key))
		.flat_map(|set| set.iter().map(String::as_str))
		.collect();
	GrantedActions { actions }
}

fn satisfy_with<F>(granted: &PermissionMap, required: &PermissionMap, keys_for: F) -> bool
where
	F: for<'k> Fn(&'k str) -> Vec<&'k str>,
{
	required
		.iter()
		.filter(|(_, actions)| !actions.is_empty())
		.all(|(resource, actions)| {
			let available = granted_actions(granted, &keys_for(resource.as_str()));
			actions.iter().all(|action| available.allows(action))
		})
}

/// Returns true if every required `(resource, action)` pair is granted,
/// resolving resource keys through the alias table.
pub fn permissions_satisfy(granted: &PermissionMap, required: &PermissionMap) -> bool {
	let aliases = resource_aliases();
	satisfy_with(granted, required, |key| aliases.equivalents(key))
}

/// Returns true if every required `(resource, action)` pair is granted under
/// the identical resource key.
pub fn permissions_satisfy_exact(granted: &PermissionMap, required: &PermissionMap) -> bool {
	satisfy_with(granted, required, |key| vec![key])
}

/// Returns true if any profile is satisfied. No profiles means no restriction.
pub fn satisfies_any_profile(granted: &PermissionMap, profiles: &[PermissionMap]) -> bool {
	profiles.is_empty()
		|| profiles
			.iter()
			.any(|profile| permissions_satisfy(granted, profile))
}
