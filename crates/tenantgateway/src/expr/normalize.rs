use super::LabelExpression;
use crate::dialect::Operator;

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;

/// Repairs decoding artifacts and explicit-regex markers on parsed
/// expressions before enforcement sees them. Works on the structure, never
/// on strings; every touched expression loses its original text.
pub fn normalize(exprs: Vec<LabelExpression>) -> Vec<LabelExpression> {
	exprs.into_iter().map(normalize_expression).collect()
}

fn normalize_expression(mut expr: LabelExpression) -> LabelExpression {
	if expr.passthrough {
		return expr;
	}

	// A `+` lost to form decoding upstream leaves ". " where ".+" was meant.
	if expr.value.contains(". ") {
		let repaired = expr.value.replace(". ", ".+");
		expr.set_value(repaired);
	}

	// A leading `~` marks the value as an explicit regex. Strip it, and when
	// the remainder actually carries regex syntax, promote the exact
	// operators to their regex forms.
	if let Some(rest) = expr.value.strip_prefix('~') {
		let rest = rest.to_string();
		let has_meta = contains_regex_meta(&rest);
		expr.set_value(rest);
		if has_meta {
			match expr.operator {
				Operator::Equal => expr.set_operator(Operator::Regex),
				Operator::NotEqual => expr.set_operator(Operator::NotRegex),
				_ => {},
			}
		}
	}

	// Canonicalize wildcard spellings under regex operators. Exact-operator
	// wildcards are left for the enforcer, which substitutes the whole
	// expression before anything is serialized.
	if expr.operator.is_regex() && matches!(expr.value.as_str(), "*" | "()") {
		expr.set_value(".*".to_string());
	}

	expr
}

pub(crate) fn contains_regex_meta(s: &str) -> bool {
	s.chars()
		.any(|c| matches!(c, '^' | '$' | '[' | ']' | '(' | ')' | '|' | '\\'))
}
