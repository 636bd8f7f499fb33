//! The constraint store: an immutable configuration snapshot behind one
//! atomic cell, per-request resolution of `(principal, service)` into a
//! [`ConstraintSet`], and the background reload watcher.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Principal;
use crate::dialect::ServiceKind;
use crate::strng::{self, Strng};

mod config;

pub use config::{AdminBlock, ConfigDocument, ConfigSource, GrantBlock, HeaderEntry, ServiceBlock};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Group whose members bypass enforcement entirely.
pub const ADMIN_GROUP: &str = "admin";

/// Reserved marker key; never a real label and never emitted.
const META_IGNORE_USAGE: &str = "__ignore_usage__";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// The label-value constraints one `(principal, service)` resolves to.
/// Immutable once returned; readers share it for the lifetime of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintSet {
	values: IndexMap<Strng, IndexSet<String>>,
	grants: Option<IndexSet<String>>,
	exclusions: IndexSet<Strng>,
}

impl ConstraintSet {
	/// Adds one per-label allowed set, applying the same `~`-marker rule as
	/// the configuration path. The resolution in [`Store::constraints`] goes
	/// through [`GrantBlock`] merging instead.
	pub fn with_label<V: AsRef<str>>(
		mut self,
		name: &str,
		values: impl IntoIterator<Item = V>,
	) -> Self {
		let entry = self.values.entry(strng::new(name)).or_default();
		entry.extend(
			values
				.into_iter()
				.map(|v| strip_regex_marker(v.as_ref()).to_string()),
		);
		self
	}

	/// Adds `labels` grant entries; `!=name` spellings feed the exclusion
	/// set, as in the configuration path.
	pub fn with_grants<V: AsRef<str>>(mut self, grants: impl IntoIterator<Item = V>) -> Self {
		for grant in grants {
			self.add_grant(grant.as_ref());
		}
		self
	}

	/// The allowed values for one label, when any are configured.
	pub fn allowed(&self, name: &str) -> Option<&IndexSet<String>> {
		self.values.get(name)
	}

	/// The `labels` grant set, when one was configured.
	pub fn grants(&self) -> Option<&IndexSet<String>> {
		self.grants.as_ref()
	}

	/// Every per-label entry, in configuration order.
	pub fn entries(&self) -> impl Iterator<Item = (&Strng, &IndexSet<String>)> {
		self.values.iter()
	}

	pub fn is_excluded(&self, name: &str) -> bool {
		self.exclusions.contains(name)
	}

	/// Whether the principal may reference `name` at all: not explicitly
	/// denied, and inside the grant set — which, absent an explicit `labels`
	/// entry, is the set of labels with configured values.
	pub fn may_reference(&self, name: &str) -> bool {
		if self.is_excluded(name) {
			return false;
		}
		match &self.grants {
			Some(grants) if !grants.is_empty() => {
				grants.contains("*") || grants.contains(name)
			},
			_ => self.values.contains_key(name),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty() && self.grants.is_none() && self.exclusions.is_empty()
	}

	/// Folds one grant block in. Group memberships union per label; `!=name`
	/// entries feed the exclusion set instead of the grants; a leading `~`
	/// marks an explicit regex and is stripped before storage.
	fn merge(&mut self, block: &GrantBlock) {
		for (label, values) in &block.values {
			if label == META_IGNORE_USAGE {
				continue;
			}
			let entry = self.values.entry(label.clone()).or_default();
			entry.extend(values.iter().map(|v| strip_regex_marker(v).to_string()));
		}
		for grant in &block.labels {
			self.add_grant(grant);
		}
	}

	fn add_grant(&mut self, grant: &str) {
		if let Some(denied) = grant.strip_prefix("!=") {
			self.exclusions.insert(strng::new(denied));
		} else {
			self
				.grants
				.get_or_insert_with(IndexSet::new)
				.insert(grant.to_string());
		}
	}
}

fn strip_regex_marker(value: &str) -> &str {
	value.strip_prefix('~').unwrap_or(value)
}

/// Shared handle to the current configuration snapshot. Readers perform one
/// atomic load and then work against an immutable document; the watcher
/// swaps in replacements wholesale, so there are no torn reads.
#[derive(Clone, Debug)]
pub struct Store {
	current: Arc<ArcSwap<ConfigDocument>>,
}

impl Store {
	pub fn new(doc: ConfigDocument) -> Store {
		Store {
			current: Arc::new(ArcSwap::from_pointee(doc)),
		}
	}

	/// Loads the initial document. Failure here is fatal: the proxy must not
	/// start without constraints.
	pub fn from_source(source: &ConfigSource) -> anyhow::Result<Store> {
		let raw = source.read_to_string_sync()?;
		Ok(Store::new(ConfigDocument::parse(&raw)?))
	}

	pub fn snapshot(&self) -> Arc<ConfigDocument> {
		self.current.load_full()
	}

	fn replace(&self, doc: ConfigDocument) {
		self.current.store(Arc::new(doc));
	}

	/// Resolves the union of every grant block matching the principal's
	/// username or group memberships. `None` means the service is not
	/// configured for this principal at all.
	pub fn constraints(
		&self,
		principal: &Principal,
		service: ServiceKind,
	) -> Option<ConstraintSet> {
		let snapshot = self.snapshot();
		let blocks = &snapshot.service(service)?.user_label_constraints;
		let mut set = ConstraintSet::default();
		let mut matched = false;
		for (key, block) in blocks {
			if applies_to(key, principal) {
				set.merge(block);
				matched = true;
			}
		}
		matched.then_some(set)
	}

	/// Resolves the tenant headers for a request: the service's
	/// `tenant-header-constraints` blocks matching the principal, plus the
	/// admin block for admins. Duplicate values for one header combine
	/// `|`-separated with duplicates suppressed.
	pub fn tenant_headers(
		&self,
		principal: &Principal,
		service: ServiceKind,
	) -> IndexMap<String, String> {
		let snapshot = self.snapshot();
		let mut gathered: IndexMap<String, IndexSet<String>> = IndexMap::new();
		let mut push = |entries: &[HeaderEntry]| {
			for entry in entries {
				for (name, value) in entry.pairs() {
					gathered
						.entry(name.to_string())
						.or_default()
						.insert(value.to_string());
				}
			}
		};
		if principal.is_admin()
			&& let Some(admin) = &snapshot.admin
		{
			push(&admin.header);
		}
		if let Some(service) = snapshot.service(service) {
			for (key, block) in &service.tenant_header_constraints {
				if applies_to(key, principal) {
					push(&block.header);
				}
			}
			for (key, block) in &service.user_label_constraints {
				if applies_to(key, principal) {
					push(&block.header);
				}
			}
		}
		gathered
			.into_iter()
			.map(|(name, values)| {
				let joined = values.iter().cloned().collect::<Vec<_>>().join("|");
				(name, joined)
			})
			.collect()
	}
}

fn applies_to(key: &Strng, principal: &Principal) -> bool {
	key == &principal.username || principal.groups.iter().any(|g| g == key)
}

/// Polls the configuration source's modification timestamp and atomically
/// swaps in a freshly parsed document when it changes. A read or parse
/// failure keeps the previous snapshot live.
pub struct Watcher {
	store: Store,
	source: ConfigSource,
	interval: Duration,
}

impl Watcher {
	pub fn new(store: Store, source: ConfigSource) -> Watcher {
		Watcher {
			store,
			source,
			interval: DEFAULT_POLL_INTERVAL,
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Watcher {
		self.interval = interval;
		self
	}

	pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
		tokio::spawn(self.run(shutdown))
	}

	async fn run(self, shutdown: CancellationToken) {
		let mut last = self.source.modified();
		let mut tick = tokio::time::interval(self.interval);
		tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = shutdown.cancelled() => {
					debug!("config watcher stopped");
					return;
				},
				_ = tick.tick() => {},
			}
			let modified = self.source.modified();
			if modified <= last {
				continue;
			}
			match self.reload().await {
				Ok(()) => {
					last = modified;
					info!("configuration reloaded");
				},
				Err(err) => {
					warn!(%err, "configuration reload failed, keeping previous snapshot");
				},
			}
		}
	}

	async fn reload(&self) -> anyhow::Result<()> {
		let raw = self.source.read_to_string().await?;
		self.store.replace(ConfigDocument::parse(&raw)?);
		Ok(())
	}
}
