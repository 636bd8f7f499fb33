use std::collections::HashSet;

use super::{LabelExpression, enforce, is_wildcard};
use crate::store::ConstraintSet;
use crate::strng::Strng;

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;

/// The labels a principal must be forced to match: every constrained label
/// with at least one specific (non-wildcard) value, narrowed to the `labels`
/// grant set when one is configured.
pub fn labels_to_process(constraints: &ConstraintSet) -> Vec<&Strng> {
	let candidates = constraints
		.entries()
		.filter(|(_, values)| !values.is_empty() && !values.iter().all(|v| is_wildcard(v)));
	match constraints.grants() {
		Some(grants) if !grants.is_empty() && !grants.contains("*") => candidates
			.filter(|(name, _)| grants.contains(name.as_str()))
			.map(|(name, _)| name)
			.collect(),
		_ => candidates.map(|(name, _)| name).collect(),
	}
}

/// Appends an expansion for every required constraint whose label the
/// expression list does not already reference. Returns the appended
/// expressions for the caller's audit trail.
pub fn inject_missing(
	exprs: &mut Vec<LabelExpression>,
	constraints: &ConstraintSet,
) -> Vec<LabelExpression> {
	let present: HashSet<&str> = exprs.iter().map(|e| e.name.as_str()).collect();
	let mut added = Vec::new();
	for name in labels_to_process(constraints) {
		if present.contains(name.as_str()) {
			continue;
		}
		let Some(values) = constraints.allowed(name) else {
			continue;
		};
		added.push(enforce::regex_expansion(
			name,
			values.iter().map(String::as_str),
		));
	}
	exprs.extend(added.iter().cloned());
	added
}
