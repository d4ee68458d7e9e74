// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Default policies used when a tenant has stored none.

use crate::condition::{Condition, Operand, Operator, Rule};
use crate::policy::{sort_by_priority, Effect, Policy};
use crate::types::{keys, OrgRole};
use serde_json::Value;

pub const OWNER_PRIORITY: i64 = 1000;
pub const ORG_ADMIN_PRIORITY: i64 = 900;
pub const HR_ADMIN_PRIORITY: i64 = 800;
pub const MEMBER_SELF_SERVICE_PRIORITY: i64 = 750;
pub const MEMBER_READ_PRIORITY: i64 = 700;

const HR_RESOURCES: &[&str] = &[
	"hr*",
	"leaveRequest",
	"absenceCase",
	"onboardingCase",
	"complianceItem",
	"employeeProfile",
	"timeEntry",
];

fn role_is(role: OrgRole) -> Condition {
	Condition::new().with_subject(keys::ROLE, Rule::Equals(Operand::Literal(Value::from(role.as_str()))))
}

fn role_in(roles: &[OrgRole]) -> Rule {
	Rule::Predicate {
		op: Operator::In,
		value: Operand::Array(roles.iter().map(|r| Value::from(r.as_str())).collect()),
	}
}

/// The fixed bootstrap policy set, sorted by descending priority.
pub fn bootstrap_policies() -> Vec<Policy> {
	let mut policies = vec![
		Policy::new("bootstrap-owner", Effect::Allow, ["*"], ["*"], OWNER_PRIORITY)
			.with_description("Owners may do anything")
			.with_condition(role_is(OrgRole::Owner)),
		Policy::new("bootstrap-org-admin", Effect::Allow, ["*"], ["*"], ORG_ADMIN_PRIORITY)
			.with_description("Organization admins may do anything")
			.with_condition(role_is(OrgRole::OrgAdmin)),
		Policy::new(
			"bootstrap-hr-admin",
			Effect::Allow,
			["*"],
			HR_RESOURCES.iter().copied(),
			HR_ADMIN_PRIORITY,
		)
		.with_description("HR admins manage HR resources")
		.with_condition(role_is(OrgRole::HrAdmin)),
		Policy::new(
			"bootstrap-member-self-service",
			Effect::Allow,
			["create", "update"],
			["leaveRequest"],
			MEMBER_SELF_SERVICE_PRIORITY,
		)
		.with_description("Members manage their own leave requests")
		.with_condition(
			Condition::new()
				.with_subject(keys::ROLE, role_in(&[OrgRole::Member, OrgRole::Manager]))
				.with_resource(
					keys::OWNER_ID,
					Rule::Predicate {
						op: Operator::Eq,
						value: Operand::SubjectRef(keys::USER_ID.to_string()),
					},
				),
		),
		Policy::new(
			"bootstrap-member-read",
			Effect::Allow,
			["read", "list"],
			["*"],
			MEMBER_READ_PRIORITY,
		)
		.with_description("Members may read tenant resources")
		.with_condition(
			Condition::new().with_subject(keys::ROLE, role_in(&[OrgRole::Member, OrgRole::Manager])),
		),
	];
	sort_by_priority(&mut policies);
	policies
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::policy::decide;
	use crate::types::Attributes;

	fn subject(role: &str) -> Attributes {
		Attributes::new().with("role", role).with("userId", "u-1")
	}

	#[test]
	fn priorities_span_seven_hundred_to_one_thousand() {
		let policies = bootstrap_policies();
		assert_eq!(policies.first().map(|p| p.priority), Some(1000));
		assert_eq!(policies.last().map(|p| p.priority), Some(700));
		assert!(policies.windows(2).all(|w| w[0].priority >= w[1].priority));
	}

	#[test]
	fn member_can_read_but_not_delete_leave_requests() {
		let policies = bootstrap_policies();
		let member = subject("member");
		let resource = Attributes::new().with("ownerId", "u-1");

		assert!(decide(&policies, "read", "leaveRequest", &member, &resource).allowed);
		assert!(!decide(&policies, "delete", "leaveRequest", &member, &resource).allowed);
	}

	#[test]
	fn member_updates_only_own_leave_request() {
		let policies = bootstrap_policies();
		let member = subject("member");
		let mine = Attributes::new().with("ownerId", "u-1");
		let theirs = Attributes::new().with("ownerId", "u-2");

		let decision = decide(&policies, "update", "leaveRequest", &member, &mine);
		assert!(decision.allowed);
		assert_eq!(decision.matched_policy.as_deref(), Some("bootstrap-member-self-service"));
		assert!(!decide(&policies, "update", "leaveRequest", &member, &theirs).allowed);
		assert!(!decide(&policies, "update", "leaveRequest", &member, &Attributes::new()).allowed);
	}

	#[test]
	fn hr_admin_is_limited_to_hr_resources() {
		let policies = bootstrap_policies();
		let hr = subject("hr_admin");
		assert!(decide(&policies, "delete", "hrDocument", &hr, &Attributes::new()).allowed);
		assert!(decide(&policies, "approve", "leaveRequest", &hr, &Attributes::new()).allowed);
		assert!(!decide(&policies, "update", "orgSettings", &hr, &Attributes::new()).allowed);
	}

	#[test]
	fn org_admin_may_do_anything() {
		let policies = bootstrap_policies();
		assert!(decide(&policies, "update", "orgSettings", &subject("org_admin"), &Attributes::new()).allowed);
	}

	#[test]
	fn unknown_role_is_denied() {
		let policies = bootstrap_policies();
		assert!(!decide(&policies, "read", "leaveRequest", &subject("guest"), &Attributes::new()).allowed);
	}

	#[test]
	fn bootstrap_policies_pass_full_validation() {
		for policy in bootstrap_policies() {
			let raw = serde_json::to_value(&policy).unwrap();
			assert_eq!(crate::normalize::validate_policy(&raw).unwrap(), policy);
		}
	}
}
