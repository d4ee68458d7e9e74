// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant policies and the first-match decision loop.
//!
//! Policies are evaluated in descending `priority`; equal priorities keep their
//! original order. The first policy whose action selectors, resource selectors
//! and condition all match decides the outcome. There is no deny-overrides
//! pass: a lower-priority policy is never consulted once a match occurs. If
//! nothing matches the request is denied.

use crate::condition::{self, Condition};
use crate::selector;
use crate::types::Attributes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Outcome a policy produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
	Allow,
	Deny,
}

impl Effect {
	pub fn parse(s: &str) -> Option<Effect> {
		match s {
			"allow" => Some(Effect::Allow),
			"deny" => Some(Effect::Deny),
			_ => None,
		}
	}

	pub fn is_allow(&self) -> bool {
		matches!(self, Effect::Allow)
	}
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Effect::Allow => write!(f, "allow"),
			Effect::Deny => write!(f, "deny"),
		}
	}
}

/// A tenant authorization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
	pub id: String,
	#[serde(default)]
	pub description: String,
	pub effect: Effect,
	pub actions: Vec<String>,
	pub resources: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub condition: Option<Condition>,
	#[serde(default)]
	pub priority: i64,
}

impl Policy {
	/// Creates an unconditional policy.
	pub fn new<A, R>(id: impl Into<String>, effect: Effect, actions: A, resources: R, priority: i64) -> Self
	where
		A: IntoIterator,
		A::Item: Into<String>,
		R: IntoIterator,
		R::Item: Into<String>,
	{
		Self {
			id: id.into(),
			description: String::new(),
			effect,
			actions: actions.into_iter().map(Into::into).collect(),
			resources: resources.into_iter().map(Into::into).collect(),
			condition: None,
			priority,
		}
	}

	/// Builder: set the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	/// Builder: set the condition.
	pub fn with_condition(mut self, condition: Condition) -> Self {
		self.condition = Some(condition);
		self
	}

	/// Returns true if this policy applies to the request.
	pub fn matches(
		&self,
		action: &str,
		resource_type: &str,
		subject: &Attributes,
		resource: &Attributes,
	) -> bool {
		selector::matches(action, &self.actions)
			&& selector::matches(resource_type, &self.resources)
			&& condition::evaluate(self.condition.as_ref(), subject, resource)
	}
}

/// Sorts policies by descending priority. The sort is stable.
pub fn sort_by_priority(policies: &mut [Policy]) {
	policies.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// The result of running the decision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
	pub allowed: bool,
	/// Id of the policy that decided, or `None` for the default deny.
	pub matched_policy: Option<String>,
}

impl PolicyDecision {
	pub fn default_deny() -> Self {
		Self {
			allowed: false,
			matched_policy: None,
		}
	}
}

/// Runs the first-match loop over policies already sorted by priority.
#[instrument(level = "trace", skip(policies, subject, resource), fields(policy_count = policies.len()))]
pub fn decide(
	policies: &[Policy],
	action: &str,
	resource_type: &str,
	subject: &Attributes,
	resource: &Attributes,
) -> PolicyDecision {
	policies
		.iter()
		.find(|p| p.matches(action, resource_type, subject, resource))
		.map(|p| PolicyDecision {
			allowed: p.effect.is_allow(),
			matched_policy: Some(p.id.clone()),
		})
		.unwrap_or_else(PolicyDecision::default_deny)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::condition::{Operand, Rule};
	use proptest::prelude::*;
	use serde_json::json;

	fn member() -> Attributes {
		Attributes::new().with("role", "member").with("userId", "u-1")
	}

	#[test]
	fn first_match_wins() {
		let mut policies = vec![
			Policy::new("p2", Effect::Deny, ["read"], ["leaveRequest"], 5),
			Policy::new("p1", Effect::Allow, ["read"], ["leaveRequest"], 10),
		];
		sort_by_priority(&mut policies);
		let decision = decide(&policies, "read", "leaveRequest", &member(), &Attributes::new());
		assert!(decision.allowed);
		assert_eq!(decision.matched_policy.as_deref(), Some("p1"));
	}

	#[test]
	fn swapping_priorities_swaps_outcome() {
		let mut policies = vec![
			Policy::new("p2", Effect::Deny, ["read"], ["leaveRequest"], 10),
			Policy::new("p1", Effect::Allow, ["read"], ["leaveRequest"], 5),
		];
		sort_by_priority(&mut policies);
		let decision = decide(&policies, "read", "leaveRequest", &member(), &Attributes::new());
		assert!(!decision.allowed);
		assert_eq!(decision.matched_policy.as_deref(), Some("p2"));
	}

	#[test]
	fn lower_priority_allow_is_not_consulted_after_deny() {
		let mut policies = vec![
			Policy::new("allow-all", Effect::Allow, ["*"], ["*"], 1),
			Policy::new("deny-delete", Effect::Deny, ["delete"], ["*"], 50),
		];
		sort_by_priority(&mut policies);
		assert!(!decide(&policies, "delete", "document", &member(), &Attributes::new()).allowed);
		assert!(decide(&policies, "read", "document", &member(), &Attributes::new()).allowed);
	}

	#[test]
	fn no_match_is_default_deny() {
		let policies = vec![Policy::new("p", Effect::Allow, ["read"], ["document"], 1)];
		let decision = decide(&policies, "write", "document", &member(), &Attributes::new());
		assert_eq!(decision, PolicyDecision::default_deny());
		assert!(!decide(&[], "read", "document", &member(), &Attributes::new()).allowed);
	}

	#[test]
	fn condition_gates_match() {
		let policy = Policy::new("own", Effect::Allow, ["update"], ["leaveRequest"], 1).with_condition(
			Condition::new().with_resource(
				"ownerId",
				Rule::Predicate {
					op: crate::condition::Operator::Eq,
					value: Operand::SubjectRef("userId".to_string()),
				},
			),
		);
		let mine = Attributes::new().with("ownerId", "u-1");
		let theirs = Attributes::new().with("ownerId", "u-2");
		assert!(policy.matches("update", "leaveRequest", &member(), &mine));
		assert!(!policy.matches("update", "leaveRequest", &member(), &theirs));
	}

	#[test]
	fn policy_serializes_in_camel_case() {
		let policy = Policy::new("p", Effect::Allow, ["read"], ["hr*"], 7).with_description("read hr");
		let value = serde_json::to_value(&policy).unwrap();
		assert_eq!(
			value,
			json!({
				"id": "p",
				"description": "read hr",
				"effect": "allow",
				"actions": ["read"],
				"resources": ["hr*"],
				"priority": 7,
			})
		);
	}

	proptest! {
		#[test]
		fn sort_is_stable_for_equal_priorities(priorities in prop::collection::vec(0i64..4, 1..20)) {
			let policies: Vec<Policy> = priorities
				.iter()
				.enumerate()
				.map(|(i, p)| Policy::new(format!("p{i}"), Effect::Allow, ["*"], ["*"], *p))
				.collect();

			let mut first = policies.clone();
			sort_by_priority(&mut first);
			let mut second = first.clone();
			sort_by_priority(&mut second);
			prop_assert_eq!(&first, &second);

			for pair in first.windows(2) {
				prop_assert!(pair[0].priority >= pair[1].priority);
				if pair[0].priority == pair[1].priority {
					let a: usize = pair[0].id[1..].parse().unwrap();
					let b: usize = pair[1].id[1..].parse().unwrap();
					prop_assert!(a < b);
				}
			}
		}
	}
}
