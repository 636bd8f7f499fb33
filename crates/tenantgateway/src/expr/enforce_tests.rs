use assert_matches::assert_matches;

use super::*;
use crate::dialect::Dialect;
use crate::expr::parse::parse_pair;

fn constraints(name: &str, values: &[&str]) -> ConstraintSet {
	ConstraintSet::default().with_label(name, values.iter().copied())
}

fn enforce_one(raw: &str, constraints: &ConstraintSet) -> Result<Vec<LabelExpression>, Error> {
	enforce(vec![parse_pair(raw, Dialect::Promql)], constraints)
}

#[test]
fn equal_allowed_value_survives_untouched() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace="demo""#, &set).unwrap();
	assert_eq!(out.len(), 1);
	assert_eq!(out[0].original(), Some(r#"namespace="demo""#));
}

#[test]
fn equal_unauthorized_value_is_rejected() {
	let set = constraints("namespace", &["observability"]);
	let err = enforce_one(r#"namespace="demo""#, &set).unwrap_err();
	assert_matches!(
		err,
		Error::UnauthorizedValue { ref name, ref value } if name.as_str() == "namespace" && value == "demo"
	);
}

#[test]
fn equal_unconstrained_label_passes() {
	let set = ConstraintSet::default();
	let out = enforce_one(r#"job="prometheus""#, &set).unwrap();
	assert_eq!(out[0].original(), Some(r#"job="prometheus""#));
}

#[test]
fn equal_wildcard_member_admits_any_value() {
	let set = constraints("namespace", &["*"]);
	assert!(enforce_one(r#"namespace="anything""#, &set).is_ok());
}

#[test]
fn equal_value_matching_regex_member_passes() {
	let set = constraints("namespace", &["prod-.*"]);
	assert!(enforce_one(r#"namespace="prod-east""#, &set).is_ok());
	assert!(enforce_one(r#"namespace="staging""#, &set).is_err());
}

#[test]
fn equal_wildcard_value_expands_to_allowed_set() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace=".*""#, &set).unwrap();
	assert_eq!(out[0].operator, Operator::Regex);
	assert_eq!(out[0].value, "observability|demo");
	assert_eq!(out[0].original(), None);
}

#[test]
fn not_equal_narrows_to_remaining_members() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace!="observability""#, &set).unwrap();
	assert_eq!(out[0].operator, Operator::Equal);
	assert_eq!(out[0].value, "demo");
}

#[test]
fn not_equal_empty_value_is_the_present_predicate() {
	let set = constraints("namespace", &["demo"]);
	let out = enforce_one(r#"namespace!="""#, &set).unwrap();
	assert_eq!(out[0].original(), Some(r#"namespace!="""#));
}

#[test]
fn not_equal_excluding_every_member_is_rejected() {
	let set = constraints("namespace", &["demo"]);
	assert!(enforce_one(r#"namespace!="demo""#, &set).is_err());
}

#[test]
fn regex_narrows_to_matching_members() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace=~"demo.*""#, &set).unwrap();
	assert_eq!(out[0].operator, Operator::Equal);
	assert_eq!(out[0].value, "demo");
}

#[test]
fn regex_matching_nothing_is_rejected() {
	let set = constraints("namespace", &["observability", "demo"]);
	assert!(enforce_one(r#"namespace=~"prod.*""#, &set).is_err());
}

#[test]
fn regex_alternation_of_members_is_kept() {
	// This is the shape injection produces; keeping it makes enforcement
	// idempotent.
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace=~"observability|demo""#, &set).unwrap();
	assert_eq!(out[0].original(), Some(r#"namespace=~"observability|demo""#));
}

#[test]
fn regex_match_is_anchored() {
	// `demo` as a pattern must not admit `demo-plus-suffix` members.
	let set = constraints("namespace", &["demo-east"]);
	assert!(enforce_one(r#"namespace=~"demo""#, &set).is_err());
}

#[test]
fn invalid_regex_falls_back_to_substring() {
	let set = constraints("namespace", &["demo"]);
	// `demo[` does not compile; the substring test still finds `demo`.
	let out = enforce_one(r#"namespace=~"demo[""#, &set).unwrap();
	assert_eq!(out[0].value, "demo");
}

#[test]
fn not_regex_with_empty_allowed_set_is_dropped() {
	let set = ConstraintSet::default().with_label("namespace", Vec::<&str>::new());
	let out = enforce_one(r#"namespace!~"demo""#, &set).unwrap();
	assert!(out.is_empty());
}

#[test]
fn not_regex_narrows_to_unmatched_members() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace!~"obs.*""#, &set).unwrap();
	assert_eq!(out[0].operator, Operator::Equal);
	assert_eq!(out[0].value, "demo");
}

#[test]
fn not_regex_excluding_every_member_is_rejected() {
	let set = constraints("namespace", &["observability", "demo"]);
	assert!(enforce_one(r#"namespace!~"observability|demo""#, &set).is_err());
}

#[test]
fn not_regex_without_constraint_entry_passes() {
	let set = ConstraintSet::default();
	let out = enforce_one(r#"namespace!~"demo""#, &set).unwrap();
	assert_eq!(out.len(), 1);
}

#[test]
fn ordering_operator_on_constrained_attribute_is_rejected() {
	let set = ConstraintSet::default().with_label(".bytes", ["100"]);
	let expr = parse_pair(".bytes>=100", Dialect::Traceql);
	assert!(enforce(vec![expr], &set).is_err());
}

#[test]
fn ordering_operator_on_unconstrained_attribute_passes() {
	let expr = parse_pair(".bytes>=100", Dialect::Traceql);
	let out = enforce(vec![expr], &ConstraintSet::default()).unwrap();
	assert_eq!(out[0].original(), Some(".bytes>=100"));
}

#[test]
fn passthrough_expressions_are_never_enforced() {
	let set = constraints("status", &["ok"]);
	let expr = parse_pair("status=error", Dialect::Traceql);
	let out = enforce(vec![expr], &set).unwrap();
	assert_eq!(out[0].original(), Some("status=error"));
}

#[test]
fn expansion_shapes() {
	let single = expansion("ns", ["demo"]);
	assert_eq!(single.operator, Operator::Equal);
	assert_eq!(single.value, "demo");

	let multi = expansion("ns", ["a", "*", "b"]);
	assert_eq!(multi.operator, Operator::Regex);
	assert_eq!(multi.value, "a|.*|b");

	// Regex members and literal dots are emitted verbatim.
	let verbatim = expansion("instance", ["10.0.0.1", "prod-.*"]);
	assert_eq!(verbatim.value, "10.0.0.1|prod-.*");

	let regex_single = regex_expansion("tenant_id", ["tenant-b"]);
	assert_eq!(regex_single.operator, Operator::Regex);
	assert_eq!(regex_single.value, "tenant-b");
}

#[test]
fn validate_accepts_enforced_output() {
	let set = constraints("namespace", &["observability", "demo"]);
	let out = enforce_one(r#"namespace!="observability""#, &set).unwrap();
	validate(&out, &set).unwrap();
}
