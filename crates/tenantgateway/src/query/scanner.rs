use tracing::warn;

use crate::expr;

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;

/// One top-level `{…}` section. `start` indexes the opening brace, `end` is
/// one past the closing brace.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Section {
	pub start: usize,
	pub end: usize,
}

impl Section {
	pub fn inner<'a>(&self, query: &'a str) -> &'a str {
		&query[self.start + 1..self.end - 1]
	}
}

/// Locates every top-level `{…}` section in a query. Braces inside quoted
/// strings are ignored; an unmatched closer is reported and skipped with the
/// depth clamped at zero; an unclosed opener yields no section.
pub fn sections(query: &str) -> Vec<Section> {
	let mut sections = Vec::new();
	let mut in_quote: Option<char> = None;
	let mut escaped = false;
	let mut depth = 0u32;
	let mut open = 0usize;

	for (i, c) in query.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		if let Some(quote) = in_quote {
			if c == '\\' {
				escaped = true;
			} else if c == quote {
				in_quote = None;
			}
			continue;
		}
		match c {
			'"' | '\'' => in_quote = Some(c),
			'\\' => escaped = true,
			'{' => {
				if depth == 0 {
					open = i;
				}
				depth += 1;
			},
			'}' => {
				if depth == 0 {
					warn!(at = i, "unmatched closing brace in query, skipping");
					continue;
				}
				depth -= 1;
				if depth == 0 {
					sections.push(Section { start: open, end: i + 1 });
				}
			},
			_ => {},
		}
	}
	if depth > 0 {
		warn!("unclosed brace in query");
	}
	sections
}

/// Replaces the body of every top-level section with the result of
/// `transform` applied to its inner content.
pub fn replace_all(
	query: &str,
	mut transform: impl FnMut(&str) -> Result<String, expr::Error>,
) -> Result<String, expr::Error> {
	replace(query, &sections(query), &mut transform)
}

/// Replaces only the first top-level section.
pub fn replace_first(
	query: &str,
	mut transform: impl FnMut(&str) -> Result<String, expr::Error>,
) -> Result<String, expr::Error> {
	let all = sections(query);
	replace(query, &all[..all.len().min(1)], &mut transform)
}

fn replace(
	query: &str,
	sections: &[Section],
	transform: &mut impl FnMut(&str) -> Result<String, expr::Error>,
) -> Result<String, expr::Error> {
	let mut out = String::with_capacity(query.len());
	let mut prev = 0usize;
	for section in sections {
		out.push_str(&query[prev..section.start]);
		out.push('{');
		out.push_str(&transform(section.inner(query))?);
		out.push('}');
		prev = section.end;
	}
	out.push_str(&query[prev..]);
	Ok(out)
}
