use indexmap::IndexSet;
use itertools::Itertools;
use regex::Regex;
use tracing::debug;

use super::{Error, LabelExpression, is_wildcard};
use crate::dialect::Operator;
use crate::store::ConstraintSet;
use crate::strng;

#[cfg(test)]
#[path = "enforce_tests.rs"]
mod tests;

/// Applies the caller's constraints to every non-passthrough expression.
/// Each expression either survives untouched, is replaced by a tightened
/// form whose match set is a subset of the allowed values, is dropped, or
/// aborts the whole rewrite with an authorization error.
pub fn enforce(
	exprs: Vec<LabelExpression>,
	constraints: &ConstraintSet,
) -> Result<Vec<LabelExpression>, Error> {
	let mut out = Vec::with_capacity(exprs.len());
	for expr in exprs {
		if expr.passthrough {
			out.push(expr);
			continue;
		}
		match decide(&expr, constraints.allowed(&expr.name))? {
			Decision::Keep => out.push(expr),
			Decision::Replace(replacement) => {
				debug!(name = %expr.name, "tightened selector to allowed values");
				out.push(replacement);
			},
			Decision::Drop => {
				debug!(name = %expr.name, "dropped selector with no allowed values");
			},
		}
	}
	Ok(out)
}

/// Rewrite-free second pass over the final expression list: everything the
/// enforcer produced must still pass the accept test.
pub fn validate(exprs: &[LabelExpression], constraints: &ConstraintSet) -> Result<(), Error> {
	for expr in exprs.iter().filter(|e| !e.passthrough) {
		decide(expr, constraints.allowed(&expr.name))?;
	}
	Ok(())
}

enum Decision {
	Keep,
	Replace(LabelExpression),
	Drop,
}

fn decide(expr: &LabelExpression, allowed: Option<&IndexSet<String>>) -> Result<Decision, Error> {
	match expr.operator {
		Operator::Equal => decide_equal(expr, allowed),
		Operator::NotEqual => decide_not_equal(expr, allowed),
		Operator::Regex => decide_regex(expr, allowed),
		Operator::NotRegex => decide_not_regex(expr, allowed),
		// An ordering predicate cannot be tightened to a value set, and
		// because the name is present it would suppress injection; on a
		// constrained attribute the only non-widening disposition is refusal.
		_ => match allowed {
			Some(a) if !a.is_empty() => Err(unauthorized(expr)),
			_ => Ok(Decision::Keep),
		},
	}
}

fn decide_equal(
	expr: &LabelExpression,
	allowed: Option<&IndexSet<String>>,
) -> Result<Decision, Error> {
	let Some(allowed) = allowed.filter(|a| !a.is_empty()) else {
		return Ok(Decision::Keep);
	};
	if admits_everything(allowed) {
		return Ok(Decision::Keep);
	}
	if expr.is_wildcard_value() {
		return Ok(Decision::Replace(expansion(&expr.name, allowed.iter().map(String::as_str))));
	}
	if allowed.contains(expr.value.as_str()) {
		return Ok(Decision::Keep);
	}
	if allowed.iter().any(|a| pattern_matches(a, &expr.value)) {
		return Ok(Decision::Keep);
	}
	Err(unauthorized(expr))
}

fn decide_not_equal(
	expr: &LabelExpression,
	allowed: Option<&IndexSet<String>>,
) -> Result<Decision, Error> {
	// `label!=""` is the idiomatic label-present predicate; stripping or
	// rewriting it would widen the result set.
	if expr.value.is_empty() {
		return Ok(Decision::Keep);
	}
	let Some(allowed) = allowed.filter(|a| !a.is_empty()) else {
		return Ok(Decision::Keep);
	};
	if admits_everything(allowed) {
		return Ok(Decision::Keep);
	}
	if expr.is_wildcard_value() {
		return Ok(Decision::Replace(expansion(&expr.name, allowed.iter().map(String::as_str))));
	}
	let narrowed: Vec<&str> = allowed
		.iter()
		.map(String::as_str)
		.filter(|a| *a != expr.value)
		.collect();
	if narrowed.is_empty() {
		return Err(unauthorized(expr));
	}
	Ok(Decision::Replace(expansion(&expr.name, narrowed)))
}

fn decide_regex(
	expr: &LabelExpression,
	allowed: Option<&IndexSet<String>>,
) -> Result<Decision, Error> {
	let Some(allowed) = allowed.filter(|a| !a.is_empty()) else {
		return Ok(Decision::Keep);
	};
	if admits_everything(allowed) {
		return Ok(Decision::Keep);
	}
	if expr.is_wildcard_value() {
		return Ok(Decision::Replace(expansion(&expr.name, allowed.iter().map(String::as_str))));
	}
	// A pattern that is exactly an alternation of allowed members is already
	// confined. Keeping it means enforced output survives re-enforcement
	// structurally unchanged.
	if expr.value.split('|').all(|part| allowed.contains(part)) {
		return Ok(Decision::Keep);
	}
	let matched: Vec<&str> = allowed
		.iter()
		.map(String::as_str)
		.filter(|a| pattern_matches(&expr.value, a))
		.collect();
	if matched.is_empty() {
		return Err(unauthorized(expr));
	}
	Ok(Decision::Replace(expansion(&expr.name, matched)))
}

fn decide_not_regex(
	expr: &LabelExpression,
	allowed: Option<&IndexSet<String>>,
) -> Result<Decision, Error> {
	let Some(allowed) = allowed else {
		return Ok(Decision::Keep);
	};
	if allowed.is_empty() {
		return Ok(Decision::Drop);
	}
	if admits_everything(allowed) {
		return Ok(Decision::Keep);
	}
	let remaining: Vec<&str> = allowed
		.iter()
		.map(String::as_str)
		.filter(|a| !pattern_matches(&expr.value, a))
		.collect();
	if remaining.is_empty() {
		return Err(unauthorized(expr));
	}
	Ok(Decision::Replace(expansion(&expr.name, remaining)))
}

/// Canonical serialization of a value set: a single value as an exact match,
/// several as a regex alternation. Members carrying regex syntax are emitted
/// verbatim, bare `*` becomes `.*`, and literal dots stay unescaped so
/// IP-address literals survive.
pub fn expansion<'a>(name: &str, members: impl IntoIterator<Item = &'a str>) -> LabelExpression {
	let members: Vec<&str> = members.into_iter().collect();
	if let [only] = members.as_slice() {
		return LabelExpression::synthetic(strng::new(name), Operator::Equal, *only);
	}
	LabelExpression::synthetic(strng::new(name), Operator::Regex, alternation(&members))
}

/// Like [`expansion`], but always in regex form. Constraints the pipeline
/// attaches itself (injection, discovery selectors) use this shape so a
/// single-value grant still reads as a match expression.
pub fn regex_expansion<'a>(name: &str, members: impl IntoIterator<Item = &'a str>) -> LabelExpression {
	let members: Vec<&str> = members.into_iter().collect();
	LabelExpression::synthetic(strng::new(name), Operator::Regex, alternation(&members))
}

fn alternation(members: &[&str]) -> String {
	members
		.iter()
		.map(|m| if *m == "*" { ".*" } else { *m })
		.join("|")
}

fn admits_everything(allowed: &IndexSet<String>) -> bool {
	allowed.iter().any(|a| is_wildcard(a) || a.contains('*'))
}

/// Full-match test of `subject` against `pattern`. User-supplied patterns
/// are untrusted and may not compile; that is never fatal — the test
/// degrades to substring containment, which cannot admit more than an
/// attacker could write as a literal.
fn pattern_matches(pattern: &str, subject: &str) -> bool {
	match Regex::new(&format!("^(?:{pattern})$")) {
		Ok(re) => re.is_match(subject),
		Err(err) => {
			debug!(%pattern, %err, "pattern does not compile, falling back to substring matching");
			subject.contains(pattern) || pattern.contains(subject)
		},
	}
}

fn unauthorized(expr: &LabelExpression) -> Error {
	Error::UnauthorizedValue {
		name: expr.name.clone(),
		value: expr.value.clone(),
	}
}
