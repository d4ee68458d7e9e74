// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turning untrusted policy records into [`Policy`] values.
//!
//! Records arrive from the repository as raw JSON and may be partially
//! malformed. Three validators run in sequence, each with a fixed guarantee:
//!
//! 1. [`validate_policy`]: the full schema. Records failing it are dropped by
//!    [`normalize`] and logged, never raised.
//! 2. [`validate_minimal`]: `id`, `effect`, and non-empty string `actions` and
//!    `resources`. [`rescue`] appends records passing this tier whose id is not
//!    already present, filling defaults for everything else.
//! 3. [`validate_fallback`]: used by [`fallback`] only when the first two tiers
//!    produced nothing at all. Non-string selector entries are discarded
//!    instead of disqualifying the record.
//!
//! Conditions are parsed strictly by tier 1 and leniently by tiers 2 and 3, where
//! malformed rules never match.

use crate::condition::{Condition, ConditionError};
use crate::policy::{sort_by_priority, Effect, Policy};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Reasons a record fails the full schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyValidationError {
	#[error("policy record must be an object")]
	NotAnObject,

	#[error("field `{0}` is missing")]
	MissingField(&'static str),

	#[error("field `{field}` is invalid: {message}")]
	InvalidField { field: &'static str, message: String },

	#[error("invalid condition: {0}")]
	Condition(#[from] ConditionError),
}

fn invalid(field: &'static str, message: impl Into<String>) -> PolicyValidationError {
	PolicyValidationError::InvalidField {
		field,
		message: message.into(),
	}
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, PolicyValidationError> {
	match obj.get(field) {
		None | Some(Value::Null) => Err(PolicyValidationError::MissingField(field)),
		Some(value) => Ok(value),
	}
}

fn parse_id(obj: &Map<String, Value>) -> Result<String, PolicyValidationError> {
	let id = required(obj, "id")?
		.as_str()
		.ok_or_else(|| invalid("id", "must be a string"))?;
	if id.trim().is_empty() {
		return Err(invalid("id", "must not be empty"));
	}
	Ok(id.to_string())
}

fn parse_effect(obj: &Map<String, Value>) -> Result<Effect, PolicyValidationError> {
	let effect = required(obj, "effect")?
		.as_str()
		.ok_or_else(|| invalid("effect", "must be a string"))?;
	Effect::parse(effect).ok_or_else(|| invalid("effect", format!("unknown effect `{effect}`")))
}

fn parse_selectors(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, PolicyValidationError> {
	let Value::Array(items) = required(obj, field)? else {
		return Err(invalid(field, "must be an array"));
	};
	if items.is_empty() {
		return Err(invalid(field, "must not be empty"));
	}
	items
		.iter()
		.map(|item| match item.as_str() {
			Some(s) if !s.is_empty() => Ok(s.to_string()),
			_ => Err(invalid(field, "selectors must be non-empty strings")),
		})
		.collect()
}

fn lenient_priority(value: Option<&Value>) -> i64 {
	match value {
		Some(Value::Number(n)) => n
			.as_i64()
			.or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
			.unwrap_or(0),
		Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
		_ => 0,
	}
}

fn lenient_description(obj: &Map<String, Value>) -> String {
	obj
		.get("description")
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string()
}

fn lenient_condition(obj: &Map<String, Value>) -> Option<Condition> {
	match obj.get("condition") {
		None | Some(Value::Null) => None,
		Some(raw) => Some(Condition::from_value_lenient(raw)),
	}
}

/// Validates a record against the full policy schema.
pub fn validate_policy(raw: &Value) -> Result<Policy, PolicyValidationError> {
	let Value::Object(obj) = raw else {
		return Err(PolicyValidationError::NotAnObject);
	};

	let id = parse_id(obj)?;
	let description = required(obj, "description")?
		.as_str()
		.ok_or_else(|| invalid("description", "must be a string"))?
		.to_string();
	let effect = parse_effect(obj)?;
	let actions = parse_selectors(obj, "actions")?;
	let resources = parse_selectors(obj, "resources")?;
	let condition = match obj.get("condition") {
		None | Some(Value::Null) => None,
		Some(raw) => Some(Condition::from_value(raw)?),
	};
	let priority = required(obj, "priority")?
		.as_i64()
		.ok_or_else(|| invalid("priority", "must be an integer"))?;

	Ok(Policy {
		id,
		description,
		effect,
		actions,
		resources,
		condition,
		priority,
	})
}

/// Validates only the minimal policy shape, filling defaults for the rest.
pub fn validate_minimal(raw: &Value) -> Option<Policy> {
	let Value::Object(obj) = raw else {
		return None;
	};

	Some(Policy {
		id: parse_id(obj).ok()?,
		description: lenient_description(obj),
		effect: parse_effect(obj).ok()?,
		actions: parse_selectors(obj, "actions").ok()?,
		resources: parse_selectors(obj, "resources").ok()?,
		condition: lenient_condition(obj),
		priority: lenient_priority(obj.get("priority")),
	})
}

fn usable_selectors(value: Option<&Value>) -> Vec<String> {
	match value {
		Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect(),
		_ => Vec::new(),
	}
}

/// Best-effort validation used when no record survived the other tiers.
pub fn validate_fallback(raw: &Value) -> Option<Policy> {
	let Value::Object(obj) = raw else {
		return None;
	};

	let actions = usable_selectors(obj.get("actions"));
	let resources = usable_selectors(obj.get("resources"));
	if actions.is_empty() || resources.is_empty() {
		return None;
	}

	Some(Policy {
		id: parse_id(obj).ok()?,
		description: lenient_description(obj),
		effect: parse_effect(obj).ok()?,
		actions,
		resources,
		condition: lenient_condition(obj),
		priority: lenient_priority(obj.get("priority")),
	})
}

/// Keeps every record passing the full schema. Duplicate ids keep the first.
pub fn normalize(raw: &[Value]) -> Vec<Policy> {
	let mut seen = HashSet::new();
	let mut policies = Vec::with_capacity(raw.len());

	for (index, record) in raw.iter().enumerate() {
		match validate_policy(record) {
			Ok(policy) => {
				if seen.insert(policy.id.clone()) {
					policies.push(policy);
				} else {
					warn!(index, policy_id = %policy.id, "dropping policy with duplicate id");
				}
			}
			Err(e) => debug!(index, error = %e, "policy record failed full validation"),
		}
	}

	policies
}

/// Appends records that pass the minimal shape check and are not yet present.
///
/// Returns the number of rescued records.
pub fn rescue(raw: &[Value], policies: &mut Vec<Policy>) -> usize {
	let mut seen: HashSet<String> = policies.iter().map(|p| p.id.clone()).collect();
	let before = policies.len();

	for (index, record) in raw.iter().enumerate() {
		let Some(policy) = validate_minimal(record) else {
			warn!(index, "dropping malformed policy record");
			continue;
		};
		if seen.insert(policy.id.clone()) {
			debug!(index, policy_id = %policy.id, "rescued policy record");
			policies.push(policy);
		}
	}

	policies.len() - before
}

/// Best-effort policies from raw records, deduplicated by id.
pub fn fallback(raw: &[Value]) -> Vec<Policy> {
	let mut seen = HashSet::new();
	raw
		.iter()
		.filter_map(validate_fallback)
		.filter(|p| seen.insert(p.id.clone()))
		.collect()
}

/// Produces the evaluable policy set for a tenant's raw records, sorted by
/// descending priority.
pub fn resolve_policy_set(raw: &[Value]) -> Vec<Policy> {
	let mut policies = normalize(raw);
	rescue(raw, &mut policies);

	if policies.is_empty() && !raw.is_empty() {
		warn!(
			record_count = raw.len(),
			"no policy survived validation, using best-effort fallback"
		);
		policies = fallback(raw);
	}

	sort_by_priority(&mut policies);
	policies
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn full(id: &str, priority: i64) -> Value {
		json!({
			"id": id,
			"description": "test policy",
			"effect": "allow",
			"actions": ["read"],
			"resources": ["leaveRequest"],
			"priority": priority,
		})
	}

	mod full_schema {
		use super::*;

		#[test]
		fn accepts_well_formed_record() {
			let policy = validate_policy(&full("p1", 10)).unwrap();
			assert_eq!(policy.id, "p1");
			assert_eq!(policy.effect, Effect::Allow);
			assert_eq!(policy.priority, 10);
			assert!(policy.condition.is_none());
		}

		#[test]
		fn accepts_condition() {
			let mut raw = full("p1", 1);
			raw["condition"] = json!({ "subject": { "role": "member" } });
			let policy = validate_policy(&raw).unwrap();
			assert!(policy.condition.is_some());
		}

		#[test]
		fn rejects_missing_description() {
			let mut raw = full("p1", 1);
			raw.as_object_mut().unwrap().remove("description");
			assert_eq!(
				validate_policy(&raw),
				Err(PolicyValidationError::MissingField("description"))
			);
		}

		#[test]
		fn rejects_fractional_priority() {
			let mut raw = full("p1", 1);
			raw["priority"] = json!(1.5);
			assert!(matches!(
				validate_policy(&raw),
				Err(PolicyValidationError::InvalidField { field: "priority", .. })
			));
		}

		#[test]
		fn rejects_bad_effect_and_selectors() {
			let mut raw = full("p1", 1);
			raw["effect"] = json!("permit");
			assert!(validate_policy(&raw).is_err());

			let mut raw = full("p1", 1);
			raw["actions"] = json!([]);
			assert!(validate_policy(&raw).is_err());

			let mut raw = full("p1", 1);
			raw["resources"] = json!(["ok", 3]);
			assert!(validate_policy(&raw).is_err());

			let mut raw = full("p1", 1);
			raw["resources"] = json!([""]);
			assert!(validate_policy(&raw).is_err());
		}

		#[test]
		fn rejects_malformed_condition() {
			let mut raw = full("p1", 1);
			raw["condition"] = json!({ "subject": "member" });
			assert!(matches!(
				validate_policy(&raw),
				Err(PolicyValidationError::Condition(_))
			));
		}

		#[test]
		fn rejects_non_objects() {
			assert_eq!(
				validate_policy(&json!("p1")),
				Err(PolicyValidationError::NotAnObject)
			);
		}
	}

	mod rescue_tier {
		use super::*;

		#[test]
		fn fills_defaults_for_optional_fields() {
			let raw = json!({
				"id": "bare",
				"effect": "deny",
				"actions": ["delete"],
				"resources": ["*"],
			});
			assert!(validate_policy(&raw).is_err());

			let policy = validate_minimal(&raw).unwrap();
			assert_eq!(policy.description, "");
			assert_eq!(policy.priority, 0);
			assert_eq!(policy.effect, Effect::Deny);
		}

		#[test]
		fn coerces_priority() {
			let raw = json!({
				"id": "p", "effect": "allow", "actions": ["read"], "resources": ["x"],
				"priority": "15",
			});
			assert_eq!(validate_minimal(&raw).unwrap().priority, 15);
		}

		#[test]
		fn malformed_condition_never_matches() {
			let raw = json!({
				"id": "p", "effect": "allow", "actions": ["read"], "resources": ["x"],
				"condition": "role == admin",
			});
			let policy = validate_minimal(&raw).unwrap();
			let attrs = crate::types::Attributes::new();
			assert!(!policy.matches("read", "x", &attrs, &attrs));
		}

		#[test]
		fn predicate_without_value_does_not_disable_policy() {
			let raw = json!({
				"id": "p", "effect": "allow", "actions": ["read"], "resources": ["x"],
				"condition": { "subject": { "department": { "op": "eq" }, "role": "member" } },
			});
			let policy = validate_minimal(&raw).unwrap();
			let member = crate::types::Attributes::new().with("role", "member");
			let guest = crate::types::Attributes::new().with("role", "guest");
			let resource = crate::types::Attributes::new();
			assert!(policy.matches("read", "x", &member, &resource));
			assert!(!policy.matches("read", "x", &guest, &resource));
		}

		#[test]
		fn requires_minimal_shape() {
			assert!(validate_minimal(&json!({ "id": "p", "effect": "allow", "actions": ["read"] })).is_none());
			assert!(validate_minimal(&json!({ "effect": "allow", "actions": ["read"], "resources": ["x"] })).is_none());
			assert!(validate_minimal(&json!({ "id": "p", "effect": "maybe", "actions": ["read"], "resources": ["x"] })).is_none());
			assert!(validate_minimal(&json!({ "id": "p", "effect": "allow", "actions": [], "resources": ["x"] })).is_none());
		}

		#[test]
		fn rescue_appends_without_duplicates() {
			let raw = vec![
				full("p1", 1),
				json!({ "id": "p1", "effect": "deny", "actions": ["*"], "resources": ["*"] }),
				json!({ "id": "p2", "effect": "deny", "actions": ["*"], "resources": ["*"] }),
				json!({ "nonsense": true }),
			];
			let mut policies = normalize(&raw);
			assert_eq!(policies.len(), 1);

			let rescued = rescue(&raw, &mut policies);
			assert_eq!(rescued, 1);
			let ids: Vec<_> = policies.iter().map(|p| p.id.as_str()).collect();
			assert_eq!(ids, vec!["p1", "p2"]);
			assert_eq!(policies[0].effect, Effect::Allow);
		}
	}

	mod fallback_tier {
		use super::*;

		#[test]
		fn discards_unusable_selector_entries() {
			let raw = json!({ "id": "p", "effect": "allow", "actions": ["read", 5], "resources": "leaveRequest" });
			assert!(validate_minimal(&raw).is_none());

			let policy = validate_fallback(&raw).unwrap();
			assert_eq!(policy.actions, vec!["read"]);
			assert_eq!(policy.resources, vec!["leaveRequest"]);
		}

		#[test]
		fn still_requires_id_and_effect() {
			assert!(validate_fallback(&json!({ "effect": "allow", "actions": ["read"], "resources": ["x"] })).is_none());
			assert!(validate_fallback(&json!({ "id": "p", "actions": ["read"], "resources": ["x"] })).is_none());
			assert!(validate_fallback(&json!({ "id": "p", "effect": "allow", "actions": [1], "resources": ["x"] })).is_none());
		}
	}

	mod pipeline {
		use super::*;

		#[test]
		fn sorts_by_priority_descending() {
			let raw = vec![full("low", 1), full("high", 100), full("mid", 50)];
			let ids: Vec<_> = resolve_policy_set(&raw).into_iter().map(|p| p.id).collect();
			assert_eq!(ids, vec!["high", "mid", "low"]);
		}

		#[test]
		fn rescued_policy_is_present() {
			let raw = vec![
				full("full", 10),
				json!({ "id": "rescued", "effect": "allow", "actions": ["read"], "resources": ["doc"], "priority": 20 }),
			];
			let ids: Vec<_> = resolve_policy_set(&raw).into_iter().map(|p| p.id).collect();
			assert_eq!(ids, vec!["rescued", "full"]);
		}

		#[test]
		fn falls_back_when_nothing_survives() {
			let raw = vec![json!({ "id": "p", "effect": "allow", "actions": ["read", null], "resources": ["doc"] })];
			let policies = resolve_policy_set(&raw);
			assert_eq!(policies.len(), 1);
			assert_eq!(policies[0].actions, vec!["read"]);
		}

		#[test]
		fn fallback_is_not_mixed_with_valid_policies() {
			let raw = vec![
				full("good", 1),
				json!({ "id": "loose", "effect": "allow", "actions": ["read", null], "resources": ["doc"] }),
			];
			let ids: Vec<_> = resolve_policy_set(&raw).into_iter().map(|p| p.id).collect();
			assert_eq!(ids, vec!["good"]);
		}

		#[test]
		fn garbage_yields_nothing() {
			assert!(resolve_policy_set(&[json!(1), json!(null), json!({})]).is_empty());
			assert!(resolve_policy_set(&[]).is_empty());
		}
	}
}
