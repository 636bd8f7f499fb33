//! The label-expression pipeline: lex one `{…}` body into raw pairs, parse
//! each into a [`LabelExpression`], normalize, enforce against the caller's
//! constraints, validate, inject whatever required constraints are missing,
//! and serialize back out.

use crate::dialect::{Dialect, Operator};
use crate::store::ConstraintSet;
use crate::strng::{self, Strng};

pub mod enforce;
pub mod inject;
pub mod lexer;
pub mod normalize;
pub mod parse;
pub mod serialize;

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("label selector exceeds the {} character limit", lexer::MAX_SELECTOR_CHARS)]
	SelectorTooLarge,
	#[error("label selector has more than {} pairs", lexer::MAX_SELECTOR_PAIRS)]
	TooManyPairs,
	#[error("unbalanced quote in label selector")]
	UnbalancedQuote,
	#[error("unbalanced braces in label selector")]
	UnbalancedBraces,
	#[error("value {value:?} is not permitted for label {name:?}")]
	UnauthorizedValue { name: Strng, value: String },
	#[error("access to label {0:?} is not permitted")]
	UnauthorizedLabel(Strng),
}

/// Spellings that mean "any value" in constraint sets and user selectors.
pub const WILDCARD_TOKENS: &[&str] = &["*", ".*", ".+", "()"];

pub fn is_wildcard(value: &str) -> bool {
	WILDCARD_TOKENS.contains(&value)
}

/// One `name op value` selector, carried structurally between every pipeline
/// stage so no stage ever re-parses another stage's string output.
///
/// `original` holds the exact source substring for as long as the expression
/// is untouched; the serializer emits it verbatim so unmodified pairs keep
/// their formatting. Every mutator clears it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabelExpression {
	pub name: Strng,
	pub operator: Operator,
	pub value: String,
	pub quoted: bool,
	pub passthrough: bool,
	original: Option<String>,
}

impl LabelExpression {
	/// An expression freshly parsed from `original`.
	pub fn parsed(
		name: Strng,
		operator: Operator,
		value: String,
		quoted: bool,
		original: &str,
	) -> Self {
		LabelExpression {
			name,
			operator,
			value,
			quoted,
			passthrough: false,
			original: Some(original.to_string()),
		}
	}

	/// An expression the pipeline made up; it never has original text.
	pub fn synthetic(name: Strng, operator: Operator, value: impl Into<String>) -> Self {
		LabelExpression {
			name,
			operator,
			value: value.into(),
			quoted: true,
			passthrough: false,
			original: None,
		}
	}

	/// A token that must be reproduced exactly and never enforced, such as a
	/// TraceQL keyword.
	pub fn verbatim(text: &str) -> Self {
		LabelExpression {
			name: strng::EMPTY,
			operator: Operator::Equal,
			value: String::new(),
			quoted: false,
			passthrough: true,
			original: Some(text.to_string()),
		}
	}

	pub fn original(&self) -> Option<&str> {
		self.original.as_deref()
	}

	pub fn set_operator(&mut self, operator: Operator) {
		self.operator = operator;
		self.original = None;
	}

	pub fn set_value(&mut self, value: String) {
		self.value = value;
		self.original = None;
	}

	pub fn is_wildcard_value(&self) -> bool {
		is_wildcard(&self.value)
	}
}

/// The rewritten body of one label block plus the constraints that had to be
/// appended, kept for the caller's audit trail.
#[derive(Clone, Debug, Default)]
pub struct EnforcedBlock {
	pub selector: String,
	pub added: Vec<LabelExpression>,
}

/// Runs the full pipeline over the body of one label block.
pub fn enforce_block(
	inner: &str,
	dialect: Dialect,
	constraints: &ConstraintSet,
) -> Result<EnforcedBlock, Error> {
	let pairs = lexer::split_pairs(inner, dialect)?;
	let exprs = pairs
		.iter()
		.map(|p| parse::parse_pair(p, dialect))
		.collect::<Vec<_>>();
	let exprs = normalize::normalize(exprs);
	let mut exprs = enforce::enforce(exprs, constraints)?;
	enforce::validate(&exprs, constraints)?;
	let added = inject::inject_missing(&mut exprs, constraints);
	Ok(EnforcedBlock {
		selector: serialize::serialize(&exprs, dialect),
		added,
	})
}
