//! The request orchestrator: the one operation the HTTP layer calls. Takes
//! the authenticated request metadata, resolves constraints, dispatches by
//! endpoint, and returns the mutated request — or an error, never the
//! original query.

use indexmap::IndexMap;
use tracing::debug;

use crate::dialect::{Dialect, ServiceKind};
use crate::expr::{self, LabelExpression};
use crate::query::{endpoint, scanner, shape};
use crate::store::{ConstraintSet, Store};
use crate::strng::Strng;
use crate::{EndpointKind, Principal};

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
	#[error("value {value:?} is not permitted for label {name:?}")]
	UnauthorizedLabelValue { name: Strng, value: String },
	#[error("access to label {0:?} is not permitted")]
	UnauthorizedLabelAccess(Strng),
	#[error("no constraints configured for service {0}")]
	ServiceNotConfigured(ServiceKind),
	#[error("malformed query: {0}")]
	MalformedQuery(expr::Error),
	#[error("endpoint is not defined for service {0}")]
	UnsupportedEndpoint(ServiceKind),
	#[error("enforcement failed: {0}")]
	Internal(#[from] anyhow::Error),
}

impl ProxyError {
	/// Status class the HTTP layer should answer with. Authorization
	/// refusals are 403, inputs the pipeline refuses to lex are 400,
	/// anything else is 500 — and in every case the unrewritten query must
	/// not reach the backend.
	pub fn status(&self) -> u16 {
		match self {
			ProxyError::UnauthorizedLabelValue { .. }
			| ProxyError::UnauthorizedLabelAccess(_)
			| ProxyError::ServiceNotConfigured(_) => 403,
			ProxyError::MalformedQuery(_) | ProxyError::UnsupportedEndpoint(_) => 400,
			ProxyError::Internal(_) => 500,
		}
	}
}

impl From<expr::Error> for ProxyError {
	fn from(err: expr::Error) -> Self {
		match err {
			expr::Error::UnauthorizedValue { name, value } => {
				ProxyError::UnauthorizedLabelValue { name, value }
			},
			expr::Error::UnauthorizedLabel(name) => ProxyError::UnauthorizedLabelAccess(name),
			other => ProxyError::MalformedQuery(other),
		}
	}
}

/// One inbound request as seen by the enforcement core, assembled by the
/// HTTP layer after authentication.
#[derive(Clone, Debug)]
pub struct RequestContext {
	pub principal: Principal,
	pub service: ServiceKind,
	pub endpoint: EndpointKind,
	/// For [`EndpointKind::Query`] this is the query expression itself; for
	/// the discovery endpoints it is the request's raw query string.
	pub raw_query: Option<String>,
	/// Decoded form body of a POST, when the operative parameter travels
	/// there instead of the URL.
	pub form: Option<IndexMap<String, String>>,
}

/// The orchestrator's output: the rewritten query and/or form body, the
/// constraints that were attached (for audit logging), the parameter the
/// rewrite applies to, and the tenant headers to set on the upstream
/// request.
#[derive(Clone, Debug, Default)]
pub struct EnforcedRequest {
	pub query: Option<String>,
	pub form: Option<IndexMap<String, String>>,
	pub added_constraints: Vec<LabelExpression>,
	pub param_name: &'static str,
	pub tenant_headers: IndexMap<String, String>,
}

/// The public enforcement surface consumed by the HTTP layer.
#[derive(Clone, Debug)]
pub struct Enforcer {
	store: Store,
}

impl Enforcer {
	pub fn new(store: Store) -> Enforcer {
		Enforcer { store }
	}

	pub fn enforce(&self, ctx: &RequestContext) -> Result<EnforcedRequest, ProxyError> {
		if ctx.principal.is_admin() {
			debug!(user = %ctx.principal.username, "cluster-wide access, forwarding unchanged");
			return Ok(EnforcedRequest {
				query: ctx.raw_query.clone(),
				form: ctx.form.clone(),
				added_constraints: Vec::new(),
				param_name: self.param_name(ctx),
				tenant_headers: self.store.tenant_headers(&ctx.principal, ctx.service),
			});
		}
		let Some(constraints) = self.store.constraints(&ctx.principal, ctx.service) else {
			return Err(ProxyError::ServiceNotConfigured(ctx.service));
		};
		let tenant_headers = self.store.tenant_headers(&ctx.principal, ctx.service);
		let mut enforced = match &ctx.endpoint {
			EndpointKind::Query => self.enforce_query(ctx, &constraints)?,
			EndpointKind::LabelsList => {
				let out = endpoint::labels_list(self.raw(ctx), ctx.service, &constraints);
				self.from_specialized(ctx, out)
			},
			EndpointKind::LabelValues(name) => {
				let out = endpoint::label_values(self.raw(ctx), name, ctx.service, &constraints)?;
				self.from_specialized(ctx, out)
			},
			EndpointKind::Series => {
				if ctx.service != ServiceKind::Thanos {
					return Err(ProxyError::UnsupportedEndpoint(ctx.service));
				}
				self.enforce_series(ctx, &constraints)
			},
			EndpointKind::TagValues(name) => {
				let out = endpoint::tag_values(self.raw(ctx), name, ctx.service, &constraints)?;
				self.from_specialized(ctx, out)
			},
		};
		enforced.tenant_headers = tenant_headers;
		Ok(enforced)
	}

	fn raw<'a>(&self, ctx: &'a RequestContext) -> &'a str {
		ctx.raw_query.as_deref().unwrap_or_default()
	}

	fn param_name(&self, ctx: &RequestContext) -> &'static str {
		match ctx.endpoint {
			EndpointKind::Query => ctx.service.query_param(),
			_ => ctx.service.selector_param(),
		}
	}

	/// Runs the label pipeline over every existing block of the query; when
	/// none exist, splices a fresh enforced selector in by query shape. The
	/// same rewrite applies to the form-body copy of the query parameter.
	fn enforce_query(
		&self,
		ctx: &RequestContext,
		constraints: &ConstraintSet,
	) -> Result<EnforcedRequest, ProxyError> {
		let dialect = ctx.service.dialect();
		let param = ctx.service.query_param();
		let mut added = Vec::new();

		let query = match &ctx.raw_query {
			Some(q) => Some(rewrite_query(q, dialect, constraints, &mut added)?),
			None => None,
		};
		let form = match &ctx.form {
			Some(form) => {
				let mut enforced = form.clone();
				if let Some(value) = form.get(param) {
					let rewritten = rewrite_query(value, dialect, constraints, &mut added)?;
					enforced.insert(param.to_string(), rewritten);
				}
				Some(enforced)
			},
			None => None,
		};

		Ok(EnforcedRequest {
			query,
			form,
			added_constraints: added,
			param_name: param,
			tenant_headers: IndexMap::new(),
		})
	}

	fn enforce_series(
		&self,
		ctx: &RequestContext,
		constraints: &ConstraintSet,
	) -> EnforcedRequest {
		let out = endpoint::series(self.raw(ctx), constraints);
		let mut enforced = self.from_specialized(ctx, out);
		if let Some(form) = &ctx.form {
			let mut rewritten: IndexMap<String, String> = IndexMap::new();
			let mut selector = None;
			for (key, value) in form {
				if key == "match[]" || key == "match%5B%5D" {
					if selector.is_none() {
						selector = Some(value.clone());
					}
				} else {
					rewritten.insert(key.clone(), value.clone());
				}
			}
			let (exprs, block) = endpoint::constraint_block(constraints);
			let merged = match selector {
				Some(s) => endpoint::merge_selector(&s, &block),
				None => format!("{{{block}}}"),
			};
			rewritten.insert("match[]".to_string(), merged);
			enforced.added_constraints.extend(exprs);
			enforced.form = Some(rewritten);
		}
		enforced
	}

	fn from_specialized(
		&self,
		ctx: &RequestContext,
		out: endpoint::SpecializedQuery,
	) -> EnforcedRequest {
		EnforcedRequest {
			query: Some(out.query),
			form: ctx.form.clone(),
			added_constraints: out.added,
			param_name: self.param_name(ctx),
			tenant_headers: IndexMap::new(),
		}
	}
}

fn rewrite_query(
	query: &str,
	dialect: Dialect,
	constraints: &ConstraintSet,
	added: &mut Vec<LabelExpression>,
) -> Result<String, expr::Error> {
	if scanner::sections(query).is_empty() {
		let block = expr::enforce_block("", dialect, constraints)?;
		added.extend(block.added.iter().cloned());
		return Ok(shape::splice_selector(query, &block.selector, dialect));
	}
	scanner::replace_all(query, |inner| {
		let block = expr::enforce_block(inner, dialect, constraints)?;
		added.extend(block.added.iter().cloned());
		Ok(block.selector)
	})
}
