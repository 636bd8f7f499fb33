use assert_matches::assert_matches;

use super::*;
use crate::store::ConstraintSet;

#[test]
fn existing_pairs_survive_and_missing_constraints_append() {
	let set = ConstraintSet::default().with_label("namespace", ["demo", "observability"]);
	let out = enforce_block(r#"service_name="order-service""#, Dialect::Logql, &set).unwrap();
	assert_eq!(
		out.selector,
		r#"service_name="order-service",namespace=~"demo|observability""#
	);
	assert_eq!(out.added.len(), 1);
}

#[test]
fn traceql_intrinsics_pass_byte_identically() {
	let set = ConstraintSet::default().with_label(".namespace", ["demo"]);
	let out = enforce_block(
		r#"nestedSetParent<0 && name="lets-go" && status=error"#,
		Dialect::Traceql,
		&set,
	)
	.unwrap();
	assert_eq!(
		out.selector,
		r#"nestedSetParent<0 && name="lets-go" && status=error && .namespace=~"demo""#
	);
}

#[test]
fn unauthorized_value_aborts_the_block() {
	let set = ConstraintSet::default().with_label("namespace", ["observability"]);
	let err = enforce_block(r#"namespace="demo""#, Dialect::Logql, &set).unwrap_err();
	assert_matches!(err, Error::UnauthorizedValue { .. });
}

#[test]
fn empty_block_becomes_pure_constraints() {
	let set = ConstraintSet::default().with_label("namespace", ["demo", "observability"]);
	let out = enforce_block("", Dialect::Promql, &set).unwrap();
	assert_eq!(out.selector, r#"namespace=~"demo|observability""#);
}

#[test]
fn unconstrained_principal_changes_nothing() {
	let out = enforce_block(
		r#"service_name="order-service""#,
		Dialect::Logql,
		&ConstraintSet::default(),
	)
	.unwrap();
	assert_eq!(out.selector, r#"service_name="order-service""#);
	assert!(out.added.is_empty());
}

#[test]
fn enforcement_is_idempotent() {
	let set = ConstraintSet::default()
		.with_label("namespace", ["demo", "observability"])
		.with_label("tenant_id", ["tenant-b"]);
	let once = enforce_block(r#"job="api""#, Dialect::Promql, &set).unwrap();
	let twice = enforce_block(&once.selector, Dialect::Promql, &set).unwrap();
	assert_eq!(once.selector, twice.selector);
	assert!(twice.added.is_empty());
}

#[test]
fn lexer_failures_bubble_up() {
	let set = ConstraintSet::default();
	let oversized = "x".repeat(lexer::MAX_SELECTOR_CHARS + 1);
	assert_matches!(
		enforce_block(&oversized, Dialect::Promql, &set),
		Err(Error::SelectorTooLarge)
	);
}
