// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute conditions attached to tenant policies.
//!
//! A [`Condition`] declares rules over subject and resource attributes:
//!
//! ```json
//! {
//!   "subject":  { "role": { "op": "in", "value": ["hr_admin", "manager"] } },
//!   "resource": { "ownerId": { "op": "eq", "value": "$subject.userId" } }
//! }
//! ```
//!
//! A rule that is not an `{ "op", "value" }` object is an implicit equality.
//! String operands of the form `$subject.<key>` / `$resource.<key>` are parsed
//! into [`Operand::SubjectRef`] / [`Operand::ResourceRef`] and resolved against
//! the attribute maps supplied at evaluation time. `$subject.*` always reads the
//! subject map and `$resource.*` always reads the resource map, whichever side
//! of the condition the rule sits on.
//!
//! A predicate without a `value` declares no expectation and always holds.
//!
//! Evaluation never fails: unknown operators, malformed rules and references
//! to missing attributes all evaluate to `false`.

use crate::types::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const SUBJECT_REF_PREFIX: &str = "$subject.";
const RESOURCE_REF_PREFIX: &str = "$resource.";

static IMPLICIT_EQ: Operator = Operator::Eq;

/// Key under which an unparseable condition body is preserved.
pub const MALFORMED_KEY: &str = "$malformed";

/// Errors produced by strict condition parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
	#[error("condition must be an object")]
	NotAnObject,

	#[error("condition section `{0}` must be an object of rules")]
	InvalidSection(String),

	#[error("unknown condition section `{0}`")]
	UnknownSection(String),

	#[error("rule for `{key}` is malformed: {message}")]
	InvalidRule { key: String, message: String },
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator of a predicate rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
	Eq,
	Ne,
	In,
	Gt,
	Lt,
	/// Any operator this engine does not understand. Never matches.
	Unknown(String),
}

impl Operator {
	pub fn parse(op: &str) -> Self {
		match op {
			"eq" => Operator::Eq,
			"ne" => Operator::Ne,
			"in" => Operator::In,
			"gt" => Operator::Gt,
			"lt" => Operator::Lt,
			other => Operator::Unknown(other.to_string()),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			Operator::Eq => "eq",
			Operator::Ne => "ne",
			Operator::In => "in",
			Operator::Gt => "gt",
			Operator::Lt => "lt",
			Operator::Unknown(op) => op,
		}
	}

	/// Applies the operator to an actual attribute value and the resolved
	/// expected values.
	pub fn apply(&self, actual: Option<&Value>, expected: &[&Value]) -> bool {
		let actual = actual.unwrap_or(&Value::Null);

		match self {
			Operator::Eq => match actual {
				Value::Array(items) => expected
					.iter()
					.all(|e| items.iter().any(|item| values_equal(item, e))),
				_ => expected.iter().all(|e| values_equal(actual, e)),
			},
			Operator::Ne => expected.iter().all(|e| !values_equal(actual, e)),
			Operator::In => expected.iter().any(|e| values_equal(actual, e)),
			Operator::Gt => compare_all(actual, expected, Ordering::Greater),
			Operator::Lt => compare_all(actual, expected, Ordering::Less),
			Operator::Unknown(_) => false,
		}
	}
}

/// JSON equality with numbers compared by value, so `1` equals `1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => {
			if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
				return x == y;
			}
			if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
				return x == y;
			}
			x.as_f64() == y.as_f64()
		}
		_ => a == b,
	}
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
	match (actual, expected) {
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => None,
	}
}

/// Every expected value must order against `actual`. An empty list holds,
/// as it does for `eq`.
fn compare_all(actual: &Value, expected: &[&Value], wanted: Ordering) -> bool {
	if expected.is_empty() {
		return true;
	}
	if !matches!(actual, Value::Number(_) | Value::String(_)) {
		return false;
	}
	expected
		.iter()
		.all(|e| compare(actual, e) == Some(wanted))
}

// =============================================================================
// Operands
// =============================================================================

/// The value side of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Operand {
	/// A single literal value.
	Literal(Value),
	/// A literal list of values.
	Array(Vec<Value>),
	/// `$subject.<key>`: read from the subject attributes.
	SubjectRef(String),
	/// `$resource.<key>`: read from the resource attributes.
	ResourceRef(String),
}

impl Operand {
	/// Resolves the operand to the list of expected values.
	///
	/// References that point at an array attribute expand to its elements.
	/// Returns `None` when a reference names an attribute that is not present.
	pub fn resolve<'a>(
		&'a self,
		subject: &'a Attributes,
		resource: &'a Attributes,
	) -> Option<Vec<&'a Value>> {
		let target = match self {
			Operand::Literal(value) => return Some(vec![value]),
			Operand::Array(values) => return Some(values.iter().collect()),
			Operand::SubjectRef(key) => subject.get(key)?,
			Operand::ResourceRef(key) => resource.get(key)?,
		};

		Some(match target {
			Value::Array(items) => items.iter().collect(),
			other => vec![other],
		})
	}
}

impl From<Value> for Operand {
	fn from(value: Value) -> Self {
		match value {
			Value::Array(values) => Operand::Array(values),
			Value::String(s) => {
				if let Some(key) = s.strip_prefix(SUBJECT_REF_PREFIX).filter(|k| !k.is_empty()) {
					Operand::SubjectRef(key.to_string())
				} else if let Some(key) = s.strip_prefix(RESOURCE_REF_PREFIX).filter(|k| !k.is_empty())
				{
					Operand::ResourceRef(key.to_string())
				} else {
					Operand::Literal(Value::String(s))
				}
			}
			other => Operand::Literal(other),
		}
	}
}

impl From<Operand> for Value {
	fn from(operand: Operand) -> Self {
		match operand {
			Operand::Literal(value) => value,
			Operand::Array(values) => Value::Array(values),
			Operand::SubjectRef(key) => Value::String(format!("{SUBJECT_REF_PREFIX}{key}")),
			Operand::ResourceRef(key) => Value::String(format!("{RESOURCE_REF_PREFIX}{key}")),
		}
	}
}

// =============================================================================
// Rules
// =============================================================================

/// A rule over a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
	/// A bare value or list: implicit `eq`.
	Equals(Operand),
	/// `{ "op": ..., "value": ... }`.
	Predicate { op: Operator, value: Operand },
	/// `{ "op": ... }` with no `value`: nothing is expected, so it always holds.
	Unbounded { op: Operator },
	/// A rule that could not be parsed. Never matches.
	Malformed(Value),
}

impl Rule {
	/// Strictly parses a rule body.
	pub fn parse(key: &str, raw: &Value) -> Result<Rule, ConditionError> {
		let Value::Object(obj) = raw else {
			return Ok(Rule::Equals(Operand::from(raw.clone())));
		};

		let Some(op) = obj.get("op") else {
			return Ok(Rule::Equals(Operand::Literal(raw.clone())));
		};

		let op = op.as_str().ok_or_else(|| ConditionError::InvalidRule {
			key: key.to_string(),
			message: "`op` must be a string".to_string(),
		})?;
		let op = Operator::parse(op);

		Ok(match obj.get("value") {
			Some(value) => Rule::Predicate {
				op,
				value: Operand::from(value.clone()),
			},
			None => Rule::Unbounded { op },
		})
	}

	/// Parses a rule body, turning anything unparseable into [`Rule::Malformed`].
	pub fn parse_lenient(key: &str, raw: &Value) -> Rule {
		Rule::parse(key, raw).unwrap_or_else(|_| Rule::Malformed(raw.clone()))
	}

	/// Evaluates the rule against the actual value of its attribute.
	pub fn evaluate(&self, actual: Option<&Value>, subject: &Attributes, resource: &Attributes) -> bool {
		let (op, operand) = match self {
			Rule::Equals(operand) => (&IMPLICIT_EQ, operand),
			Rule::Predicate { op, value } => (op, value),
			Rule::Unbounded { .. } => return true,
			Rule::Malformed(_) => return false,
		};

		match operand.resolve(subject, resource) {
			Some(expected) => op.apply(actual, &expected),
			None => false,
		}
	}

	pub fn to_value(&self) -> Value {
		match self {
			Rule::Equals(operand) => operand.clone().into(),
			Rule::Predicate { op, value } => {
				let mut obj = Map::new();
				obj.insert("op".to_string(), Value::String(op.as_str().to_string()));
				obj.insert("value".to_string(), value.clone().into());
				Value::Object(obj)
			}
			Rule::Unbounded { op } => {
				let mut obj = Map::new();
				obj.insert("op".to_string(), Value::String(op.as_str().to_string()));
				Value::Object(obj)
			}
			Rule::Malformed(raw) => raw.clone(),
		}
	}
}

// =============================================================================
// Conditions
// =============================================================================

/// Subject and resource attribute rules. All rules must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Condition {
	pub subject: BTreeMap<String, Rule>,
	pub resource: BTreeMap<String, Rule>,
}

impl Condition {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: add a subject rule.
	pub fn with_subject(mut self, key: impl Into<String>, rule: Rule) -> Self {
		self.subject.insert(key.into(), rule);
		self
	}

	/// Builder: add a resource rule.
	pub fn with_resource(mut self, key: impl Into<String>, rule: Rule) -> Self {
		self.resource.insert(key.into(), rule);
		self
	}

	/// A condition that never holds, preserving the raw body it replaces.
	pub fn unsatisfiable(raw: Value) -> Self {
		Self::new().with_subject(MALFORMED_KEY, Rule::Malformed(raw))
	}

	pub fn is_empty(&self) -> bool {
		self.subject.is_empty() && self.resource.is_empty()
	}

	/// Strictly parses a condition body.
	pub fn from_value(raw: &Value) -> Result<Self, ConditionError> {
		let Value::Object(obj) = raw else {
			return Err(ConditionError::NotAnObject);
		};

		let mut condition = Condition::new();
		for (section, body) in obj {
			let rules = match section.as_str() {
				"subject" => &mut condition.subject,
				"resource" => &mut condition.resource,
				other => return Err(ConditionError::UnknownSection(other.to_string())),
			};
			match body {
				Value::Null => {}
				Value::Object(entries) => {
					for (key, rule) in entries {
						rules.insert(key.clone(), Rule::parse(key, rule)?);
					}
				}
				_ => return Err(ConditionError::InvalidSection(section.clone())),
			}
		}

		Ok(condition)
	}

	/// Parses a condition body without ever failing.
	///
	/// Malformed rules become [`Rule::Malformed`]; a body that is not an object,
	/// or a section that is not an object, makes the whole condition
	/// unsatisfiable.
	pub fn from_value_lenient(raw: &Value) -> Self {
		let Value::Object(obj) = raw else {
			return Condition::unsatisfiable(raw.clone());
		};

		let mut condition = Condition::new();
		for (section, body) in obj {
			let rules = match section.as_str() {
				"subject" => &mut condition.subject,
				"resource" => &mut condition.resource,
				_ => continue,
			};
			match body {
				Value::Null => {}
				Value::Object(entries) => {
					for (key, rule) in entries {
						rules.insert(key.clone(), Rule::parse_lenient(key, rule));
					}
				}
				_ => return Condition::unsatisfiable(raw.clone()),
			}
		}

		condition
	}

	pub fn to_value(&self) -> Value {
		let section = |rules: &BTreeMap<String, Rule>| -> Value {
			Value::Object(
				rules
					.iter()
					.map(|(k, r)| (k.clone(), r.to_value()))
					.collect(),
			)
		};

		let mut obj = Map::new();
		if !self.subject.is_empty() {
			obj.insert("subject".to_string(), section(&self.subject));
		}
		if !self.resource.is_empty() {
			obj.insert("resource".to_string(), section(&self.resource));
		}
		Value::Object(obj)
	}

	/// Returns true if every subject and resource rule holds.
	pub fn matches(&self, subject: &Attributes, resource: &Attributes) -> bool {
		self
			.subject
			.iter()
			.all(|(key, rule)| rule.evaluate(subject.get(key), subject, resource))
			&& self
				.resource
				.iter()
				.all(|(key, rule)| rule.evaluate(resource.get(key), subject, resource))
	}
}

impl TryFrom<Value> for Condition {
	type Error = ConditionError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		Condition::from_value(&value)
	}
}

impl From<Condition> for Value {
	fn from(condition: Condition) -> Self {
		condition.to_value()
	}
}

/// Evaluates an optional condition. An absent condition always holds.
pub fn evaluate(condition: Option<&Condition>, subject: &Attributes, resource: &Attributes) -> bool {
	match condition {
		Some(condition) => condition.matches(subject, resource),
		None => true,
	}
}
