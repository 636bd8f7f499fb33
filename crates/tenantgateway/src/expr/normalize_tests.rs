use super::*;
use crate::dialect::{Dialect, Operator};
use crate::expr::parse::parse_pair;

fn normalized(raw: &str, dialect: Dialect) -> LabelExpression {
	let exprs = normalize(vec![parse_pair(raw, dialect)]);
	exprs.into_iter().next().unwrap()
}

#[test]
fn repairs_lost_plus_from_form_decoding() {
	let expr = normalized(r#"path="/api/v1. ""#, Dialect::Promql);
	assert_eq!(expr.value, "/api/v1.+");
	assert_eq!(expr.original(), None);
}

#[test]
fn strips_plain_regex_marker_without_promotion() {
	let expr = normalized(r#"ns="~demo""#, Dialect::Promql);
	assert_eq!(expr.value, "demo");
	assert_eq!(expr.operator, Operator::Equal);
	assert_eq!(expr.original(), None);
}

#[test]
fn promotes_equal_to_regex_when_marker_value_has_meta() {
	let expr = normalized(r#"ns="~^prod-.*$""#, Dialect::Promql);
	assert_eq!(expr.value, "^prod-.*$");
	assert_eq!(expr.operator, Operator::Regex);
}

#[test]
fn promotes_not_equal_to_not_regex() {
	let expr = normalized(r#"ns!="~(a|b)""#, Dialect::Promql);
	assert_eq!(expr.operator, Operator::NotRegex);
	assert_eq!(expr.value, "(a|b)");
}

#[test]
fn canonicalizes_wildcard_spellings_under_regex_operators() {
	let expr = normalized(r#"ns=~"*""#, Dialect::Promql);
	assert_eq!(expr.value, ".*");
	let expr = normalized(r#"ns=~"()""#, Dialect::Promql);
	assert_eq!(expr.value, ".*");
}

#[test]
fn exact_operator_wildcards_are_left_for_the_enforcer() {
	let expr = normalized(r#"ns="*""#, Dialect::Promql);
	assert_eq!(expr.value, "*");
	assert_eq!(expr.original(), Some(r#"ns="*""#));
}

#[test]
fn untouched_expressions_keep_their_source_text() {
	let expr = normalized(r#"ns="demo""#, Dialect::Promql);
	assert_eq!(expr.original(), Some(r#"ns="demo""#));
}

#[test]
fn passthrough_is_never_normalized() {
	let expr = normalized(r#"name="~lets-go. ""#, Dialect::Traceql);
	assert!(expr.passthrough);
	assert_eq!(expr.original(), Some(r#"name="~lets-go. ""#));
}
