use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "dialect_tests.rs"]
mod tests;

/// Query dialect spoken by a backend. The three dialects share every
/// algorithm in this crate; the profile tables below are the only behavior
/// that differs between them.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
	Promql,
	Logql,
	Traceql,
}

/// Selector operator tokens across all three dialects. Only PromQL-style
/// matchers take part in enforcement; the ordering operators exist so
/// TraceQL comparisons lex correctly.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
	NotRegex,
	Regex,
	NotEqual,
	GreaterEqual,
	LessEqual,
	Equal,
	Greater,
	Less,
}

// Longest token first, so `!~` wins over `!=`'s prefix and `>=` over `>`.
const PROMQL_OPERATORS: &[Operator] = &[
	Operator::NotRegex,
	Operator::Regex,
	Operator::NotEqual,
	Operator::Equal,
];

const TRACEQL_OPERATORS: &[Operator] = &[
	Operator::NotRegex,
	Operator::Regex,
	Operator::NotEqual,
	Operator::GreaterEqual,
	Operator::LessEqual,
	Operator::Equal,
	Operator::Greater,
	Operator::Less,
];

// Attribute names TraceQL reserves for span/trace properties. Pairs naming
// them pass through enforcement untouched.
const TRACEQL_INTRINSICS: &[&str] = &[
	"status",
	"name",
	"kind",
	"duration",
	"childCount",
	"nestedSetParent",
	"nestedSetLeft",
	"nestedSetRight",
	"traceDuration",
	"rootName",
	"rootServiceName",
];

const TRACEQL_KEYWORDS: &[&str] = &["true", "false"];

impl Operator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operator::NotRegex => "!~",
			Operator::Regex => "=~",
			Operator::NotEqual => "!=",
			Operator::GreaterEqual => ">=",
			Operator::LessEqual => "<=",
			Operator::Equal => "=",
			Operator::Greater => ">",
			Operator::Less => "<",
		}
	}

	pub fn token_len(&self) -> usize {
		self.as_str().len()
	}

	pub fn is_regex(&self) -> bool {
		matches!(self, Operator::Regex | Operator::NotRegex)
	}

	pub fn is_ordering(&self) -> bool {
		matches!(
			self,
			Operator::GreaterEqual | Operator::LessEqual | Operator::Greater | Operator::Less
		)
	}
}

impl Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Dialect {
	/// Separator between pairs inside one label block.
	pub fn pair_separator(&self) -> &'static str {
		match self {
			Dialect::Promql | Dialect::Logql => ",",
			Dialect::Traceql => " && ",
		}
	}

	/// Operator tokens in the order the pair parser must try them.
	pub fn operator_precedence(&self) -> &'static [Operator] {
		match self {
			Dialect::Promql | Dialect::Logql => PROMQL_OPERATORS,
			Dialect::Traceql => TRACEQL_OPERATORS,
		}
	}

	pub fn is_intrinsic(&self, name: &str) -> bool {
		match self {
			Dialect::Traceql => TRACEQL_INTRINSICS.contains(&name),
			_ => false,
		}
	}

	pub fn is_passthrough_keyword(&self, token: &str) -> bool {
		match self {
			Dialect::Traceql => TRACEQL_KEYWORDS.contains(&token),
			_ => false,
		}
	}
}

/// One of the three backend services this proxy fronts, as named in the
/// configuration document.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
	Loki,
	Thanos,
	Tempo,
}

impl ServiceKind {
	pub fn dialect(&self) -> Dialect {
		match self {
			ServiceKind::Loki => Dialect::Logql,
			ServiceKind::Thanos => Dialect::Promql,
			ServiceKind::Tempo => Dialect::Traceql,
		}
	}

	/// Parameter carrying the query expression on evaluation endpoints.
	pub fn query_param(&self) -> &'static str {
		match self {
			ServiceKind::Loki | ServiceKind::Thanos => "query",
			ServiceKind::Tempo => "q",
		}
	}

	/// Parameter the discovery endpoints accept a constraining selector on.
	pub fn selector_param(&self) -> &'static str {
		match self {
			ServiceKind::Loki => "query",
			ServiceKind::Thanos => "match[]",
			ServiceKind::Tempo => "q",
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ServiceKind::Loki => "loki",
			ServiceKind::Thanos => "thanos",
			ServiceKind::Tempo => "tempo",
		}
	}
}

impl Display for ServiceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ServiceKind {
	type Err = UnknownService;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"loki" => Ok(ServiceKind::Loki),
			"thanos" => Ok(ServiceKind::Thanos),
			"tempo" => Ok(ServiceKind::Tempo),
			other => Err(UnknownService(other.to_string())),
		}
	}
}

#[derive(thiserror::Error, Debug)]
#[error("unknown service {0:?}")]
pub struct UnknownService(pub String);
