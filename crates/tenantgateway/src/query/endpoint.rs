use itertools::Itertools;
use tracing::warn;
use url::form_urlencoded;

use crate::dialect::{Dialect, ServiceKind};
use crate::expr::{self, LabelExpression, enforce, inject, is_wildcard, serialize};
use crate::store::ConstraintSet;
use crate::strng;

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;

/// Result of specializing one discovery endpoint: the rewritten raw query
/// string plus the constraint expressions that were attached.
#[derive(Clone, Debug, Default)]
pub struct SpecializedQuery {
	pub query: String,
	pub added: Vec<LabelExpression>,
}

impl SpecializedQuery {
	fn unchanged(raw: &str) -> Self {
		SpecializedQuery {
			query: raw.to_string(),
			added: Vec::new(),
		}
	}
}

/// Label-name listing: attach a selector over the essential constraints. A
/// principal with only wildcard grants sees the request unchanged.
pub fn labels_list(raw: &str, service: ServiceKind, constraints: &ConstraintSet) -> SpecializedQuery {
	let (exprs, selector) = essential_selector(constraints, service.dialect());
	if exprs.is_empty() {
		return SpecializedQuery::unchanged(raw);
	}
	SpecializedQuery {
		query: append_param(raw, service.selector_param(), &format!("{{{selector}}}")),
		added: exprs,
	}
}

/// Value listing for one label: check the principal may reference the label
/// at all, then attach the comprehensive constraint selector. With nothing
/// to constrain the parameter still carries an empty selector.
pub fn label_values(
	raw: &str,
	name: &str,
	service: ServiceKind,
	constraints: &ConstraintSet,
) -> Result<SpecializedQuery, expr::Error> {
	if name == "__name__" {
		return Ok(SpecializedQuery::unchanged(raw));
	}
	if !constraints.may_reference(name) {
		return Err(expr::Error::UnauthorizedLabel(strng::new(name)));
	}
	let (exprs, selector) = comprehensive_selector(constraints, service.dialect());
	Ok(SpecializedQuery {
		query: append_param(raw, service.selector_param(), &format!("{{{selector}}}")),
		added: exprs,
	})
}

/// TraceQL tag-value listing. Intrinsic tags are dialect property names, not
/// tenant data, and bypass the reference check. With nothing to constrain
/// the parameter still carries an empty spanset selector.
pub fn tag_values(
	raw: &str,
	name: &str,
	service: ServiceKind,
	constraints: &ConstraintSet,
) -> Result<SpecializedQuery, expr::Error> {
	let dialect = service.dialect();
	if dialect.is_intrinsic(name) {
		return Ok(SpecializedQuery::unchanged(raw));
	}
	if !constraints.may_reference(name) {
		return Err(expr::Error::UnauthorizedLabel(strng::new(name)));
	}
	let (exprs, selector) = comprehensive_selector(constraints, dialect);
	Ok(SpecializedQuery {
		query: append_param(raw, service.selector_param(), &format!("{{{selector}}}")),
		added: exprs,
	})
}

/// Series metadata: merge the comprehensive constraints into every inbound
/// `match[]` selector (encoded or not), then re-emit the query string with
/// exactly one `match[]` parameter.
pub fn series(raw: &str, constraints: &ConstraintSet) -> SpecializedQuery {
	let dialect = Dialect::Promql;
	let mut selectors = Vec::new();
	let mut others: Vec<(String, String)> = Vec::new();
	for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
		if key == "match[]" {
			selectors.push(value.into_owned());
		} else {
			others.push((key.into_owned(), value.into_owned()));
		}
	}

	let (exprs, block) = comprehensive_selector(constraints, dialect);
	let merged = if let Some(first) = selectors.first() {
		if selectors.len() > 1 {
			warn!(
				dropped = selectors.len() - 1,
				"series request carried multiple match[] selectors, keeping the first"
			);
		}
		merge_selector(first, &block)
	} else {
		format!("{{{block}}}")
	};

	let mut query = others
		.iter()
		.map(|(k, v)| {
			let mut one = form_urlencoded::Serializer::new(String::new());
			one.append_pair(k, v);
			one.finish()
		})
		.join("&");
	if !query.is_empty() {
		query.push('&');
	}
	query.push_str("match[]=");
	query.extend(form_urlencoded::byte_serialize(merged.as_bytes()));

	SpecializedQuery { query, added: exprs }
}

/// The comprehensive PromQL constraint block, for callers merging it into a
/// form-body selector themselves.
pub fn constraint_block(constraints: &ConstraintSet) -> (Vec<LabelExpression>, String) {
	comprehensive_selector(constraints, Dialect::Promql)
}

/// Merges a constraint block into one series selector: bare metric names get
/// a fresh label block, bracketed selectors get the constraints appended
/// before the closing brace.
pub fn merge_selector(selector: &str, block: &str) -> String {
	if block.is_empty() {
		return selector.to_string();
	}
	let Some(close) = selector.rfind('}') else {
		return format!("{}{{{block}}}", selector.trim_end());
	};
	let open = selector[..close].rfind('{').map(|i| i + 1).unwrap_or(close);
	let inner_empty = selector[open..close].trim().is_empty();
	let comma = if inner_empty { "" } else { "," };
	format!("{}{}{}{}", &selector[..close], comma, block, &selector[close..])
}

/// Essential constraints: required labels whose allowed set carries no
/// wildcard member at all.
fn essential_selector(
	constraints: &ConstraintSet,
	dialect: Dialect,
) -> (Vec<LabelExpression>, String) {
	build_selector(constraints, dialect, |values| {
		!values.iter().any(|v| is_wildcard(v))
	})
}

/// Comprehensive constraints: every required label; the expansion rule takes
/// care of wildcard members.
fn comprehensive_selector(
	constraints: &ConstraintSet,
	dialect: Dialect,
) -> (Vec<LabelExpression>, String) {
	build_selector(constraints, dialect, |_| true)
}

fn build_selector(
	constraints: &ConstraintSet,
	dialect: Dialect,
	keep: impl Fn(&indexmap::IndexSet<String>) -> bool,
) -> (Vec<LabelExpression>, String) {
	let exprs: Vec<LabelExpression> = inject::labels_to_process(constraints)
		.into_iter()
		.filter_map(|name| constraints.allowed(name).map(|values| (name, values)))
		.filter(|(_, values)| keep(values))
		.map(|(name, values)| enforce::regex_expansion(name, values.iter().map(String::as_str)))
		.collect();
	let selector = serialize::serialize(&exprs, dialect);
	(exprs, selector)
}

fn append_param(raw: &str, param: &str, value: &str) -> String {
	let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
	if raw.is_empty() {
		format!("{param}={encoded}")
	} else {
		format!("{raw}&{param}={encoded}")
	}
}
