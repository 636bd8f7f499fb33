use tracing::warn;

use super::Error;
use crate::dialect::Dialect;

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;

pub const MAX_SELECTOR_CHARS: usize = 10_000;
pub const MAX_SELECTOR_PAIRS: usize = 1_000;

/// Splits the body of one label block into raw pair substrings.
///
/// Single pass, quote and escape aware. The dialect separator only splits
/// outside quotes, and for the `,`-separated dialects only outside nested
/// braces. The separator itself is never copied into a pair; surrounding
/// whitespace is trimmed and empty pairs are dropped.
///
/// Oversized input, unclosed quotes, and unbalanced braces fail closed.
pub fn split_pairs(input: &str, dialect: Dialect) -> Result<Vec<String>, Error> {
	if input.len() > MAX_SELECTOR_CHARS {
		warn!(len = input.len(), "label selector exceeds size limit");
		return Err(Error::SelectorTooLarge);
	}

	let separator = dialect.pair_separator();
	// TraceQL blocks never nest braces, so only the `,` dialects gate the
	// separator on brace depth.
	let depth_gated = !matches!(dialect, Dialect::Traceql);

	let mut pairs = Vec::new();
	let mut start = 0usize;
	let mut in_quote: Option<char> = None;
	let mut escaped = false;
	let mut depth = 0u32;
	let mut i = 0usize;

	while let Some(c) = input[i..].chars().next() {
		if escaped {
			escaped = false;
			i += c.len_utf8();
			continue;
		}
		if let Some(quote) = in_quote {
			if c == '\\' {
				escaped = true;
			} else if c == quote {
				in_quote = None;
			}
			i += c.len_utf8();
			continue;
		}
		match c {
			'"' | '\'' => in_quote = Some(c),
			'\\' => escaped = true,
			'{' => depth += 1,
			'}' => {
				if depth == 0 {
					warn!("unmatched closing brace in label selector");
					return Err(Error::UnbalancedBraces);
				}
				depth -= 1;
			},
			_ => {
				if (depth == 0 || !depth_gated) && input[i..].starts_with(separator) {
					push_pair(&mut pairs, &input[start..i])?;
					i += separator.len();
					start = i;
					continue;
				}
			},
		}
		i += c.len_utf8();
	}

	if in_quote.is_some() {
		warn!("unclosed quote in label selector");
		return Err(Error::UnbalancedQuote);
	}
	if depth > 0 {
		warn!("unclosed brace in label selector");
		return Err(Error::UnbalancedBraces);
	}
	push_pair(&mut pairs, &input[start..])?;
	Ok(pairs)
}

fn push_pair(pairs: &mut Vec<String>, raw: &str) -> Result<(), Error> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Ok(());
	}
	if pairs.len() == MAX_SELECTOR_PAIRS {
		warn!("label selector exceeds pair limit");
		return Err(Error::TooManyPairs);
	}
	pairs.push(trimmed.to_string());
	Ok(())
}
