use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::Dialect;

#[cfg(test)]
#[path = "shape_tests.rs"]
mod tests;

// A metric identifier directly followed by `[` opens a range-vector
// selector; functions are always followed by `(`, so the match is
// unambiguous.
static RANGE_VECTOR: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"([a-zA-Z_:][a-zA-Z0-9_:]*)\[").expect("static regex"));

const GROUPING_CLAUSES: &[&str] = &[" by ", " group_left", " group_right", " offset "];

/// Splices an enforced selector into a query that carried no label block of
/// its own.
pub fn splice_selector(query: &str, selector: &str, dialect: Dialect) -> String {
	if query.trim().is_empty() {
		return format!("{{{selector}}}");
	}
	match dialect {
		// Logs queries begin with a stream selector and trace queries with a
		// spanset predicate, so the authorized selector becomes a prefix.
		Dialect::Logql | Dialect::Traceql => format!("{{{selector}}} {}", query.trim()),
		Dialect::Promql => splice_promql(query, selector),
	}
}

fn splice_promql(query: &str, selector: &str) -> String {
	// Range vector: insert between the metric name and the `[`. Splicing by
	// index keeps backslash escapes in the surrounding text literal; regex
	// replacement-string expansion would eat them.
	if let Some(c) = RANGE_VECTOR.captures(query) {
		let at = c.get(1).expect("group 1 always participates").end();
		return splice_at(query, at, selector);
	}

	// Aggregation clause: push the selector inside the argument list, right
	// before the last `)` preceding the clause.
	let clause = GROUPING_CLAUSES
		.iter()
		.filter_map(|c| query.find(c).map(|at| (at, *c)))
		.min();
	if let Some((at, token)) = clause {
		if let Some(paren) = query[..at].rfind(')') {
			return splice_at(query, paren, selector);
		}
		// `metric offset 5m` has nothing to push inside; the selector lands
		// directly after the metric. Prefix aggregations such as
		// `sum by (x) (…)` fall through to the strategies below.
		if token == " offset " {
			return splice_at(query, at, selector);
		}
	}

	// `f(metric)` gets the selector inside the final parenthesis.
	let trimmed = query.trim_end();
	if trimmed.ends_with(')') {
		return splice_at(query, trimmed.len() - 1, selector);
	}

	format!("{}{{{selector}}}", trimmed)
}

fn splice_at(query: &str, at: usize, selector: &str) -> String {
	format!("{}{{{}}}{}", &query[..at], selector, &query[at..])
}
