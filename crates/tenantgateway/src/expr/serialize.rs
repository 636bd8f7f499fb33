use itertools::Itertools;

use super::LabelExpression;
use crate::dialect::Dialect;

#[cfg(test)]
#[path = "serialize_tests.rs"]
mod tests;

/// Emits the expression list as one label-block body. Untouched expressions
/// reproduce their source text byte for byte; everything else serializes
/// from the structure.
pub fn serialize(exprs: &[LabelExpression], dialect: Dialect) -> String {
	exprs
		.iter()
		.map(render)
		.join(dialect.pair_separator())
}

fn render(expr: &LabelExpression) -> String {
	if let Some(original) = expr.original() {
		return original.to_string();
	}
	if expr.quoted {
		format!("{}{}\"{}\"", expr.name, expr.operator, escape_quotes(&expr.value))
	} else {
		format!("{}{}{}", expr.name, expr.operator, expr.value)
	}
}

// Escape bare `"` only; backslash sequences already present in the value
// (user-written regex escapes) must pass through untouched.
fn escape_quotes(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let mut escaped = false;
	for c in value.chars() {
		if c == '"' && !escaped {
			out.push('\\');
		}
		escaped = c == '\\' && !escaped;
		out.push(c);
	}
	out
}
