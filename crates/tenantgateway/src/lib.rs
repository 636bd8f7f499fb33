use serde::{Deserialize, Serialize};

pub mod dialect;
pub mod expr;
pub mod proxy;
pub mod query;
pub mod store;
pub mod strng;

pub use dialect::{Dialect, Operator, ServiceKind};
pub use proxy::{Enforcer, EnforcedRequest, ProxyError, RequestContext};
pub use store::{ConfigSource, ConstraintSet, Store};
pub use strng::Strng;

/// The authenticated caller, as established by the HTTP layer before the
/// enforcement core is invoked.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
	pub username: Strng,
	pub groups: Vec<Strng>,
}

impl Principal {
	pub fn new<U: AsRef<str>, G: AsRef<str>>(username: U, groups: impl IntoIterator<Item = G>) -> Self {
		Principal {
			username: strng::new(username),
			groups: groups.into_iter().map(strng::new).collect(),
		}
	}

	/// Membership in the admin group grants cluster-wide access; the
	/// orchestrator forwards such requests without any rewrite.
	pub fn is_admin(&self) -> bool {
		self.groups.iter().any(|g| g == store::ADMIN_GROUP)
	}
}

/// What the inbound request is asking the backend for. Query-bearing
/// endpoints get their query rewritten in place; the discovery endpoints get
/// a constraint selector constructed for them instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EndpointKind {
	/// A query evaluation endpoint (instant or range).
	Query,
	/// The label-name listing endpoint.
	LabelsList,
	/// The value listing endpoint for one label.
	LabelValues(Strng),
	/// The PromQL-family series metadata endpoint.
	Series,
	/// The TraceQL tag-value listing endpoint.
	TagValues(Strng),
}
