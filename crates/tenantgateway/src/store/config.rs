use std::path::PathBuf;
use std::time::SystemTime;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::dialect::ServiceKind;
use crate::strng::Strng;

/// Where the configuration document comes from. Files are re-read by the
/// watcher; static sources never change after startup.
#[derive(Clone, Debug)]
pub enum ConfigSource {
	File(PathBuf),
	Static(Bytes),
}

impl ConfigSource {
	pub async fn read_to_string(&self) -> anyhow::Result<String> {
		Ok(match self {
			ConfigSource::File(path) => fs_err::tokio::read_to_string(path).await?,
			ConfigSource::Static(data) => std::str::from_utf8(data).map(|s| s.to_string())?,
		})
	}

	pub fn read_to_string_sync(&self) -> anyhow::Result<String> {
		Ok(match self {
			ConfigSource::File(path) => fs_err::read_to_string(path)?,
			ConfigSource::Static(data) => std::str::from_utf8(data).map(|s| s.to_string())?,
		})
	}

	/// Modification timestamp, when the source has one.
	pub fn modified(&self) -> Option<SystemTime> {
		match self {
			ConfigSource::File(path) => fs_err::metadata(path).and_then(|m| m.modified()).ok(),
			ConfigSource::Static(_) => None,
		}
	}
}

/// The hot-reloaded source of truth: one optional admin block plus one block
/// per fronted service.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigDocument {
	#[serde(default)]
	pub admin: Option<AdminBlock>,
	#[serde(flatten)]
	pub services: IndexMap<Strng, ServiceBlock>,
}

impl ConfigDocument {
	pub fn parse(raw: &str) -> anyhow::Result<ConfigDocument> {
		Ok(serde_yaml::from_str(raw)?)
	}

	pub fn service(&self, kind: ServiceKind) -> Option<&ServiceBlock> {
		self.services.get(kind.as_str())
	}
}

/// Grants for the cluster-wide admin group.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AdminBlock {
	#[serde(default)]
	pub labels: Vec<String>,
	#[serde(default)]
	pub header: Vec<HeaderEntry>,
}

#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceBlock {
	#[serde(default)]
	pub tenant_header_constraints: IndexMap<Strng, GrantBlock>,
	#[serde(default)]
	pub user_label_constraints: IndexMap<Strng, GrantBlock>,
}

/// One principal's (or group's) grants under a service block: the `labels`
/// meta entry, tenant header lines, and the per-label allowed values.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct GrantBlock {
	#[serde(default)]
	pub labels: Vec<String>,
	#[serde(default)]
	pub header: Vec<HeaderEntry>,
	#[serde(flatten)]
	pub values: IndexMap<Strng, Vec<String>>,
}

/// Header lines come in two spellings: `"Header-Name: value"` strings and
/// single-entry maps.
#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum HeaderEntry {
	Line(String),
	Map(IndexMap<String, String>),
}

impl HeaderEntry {
	pub fn pairs(&self) -> Vec<(&str, &str)> {
		match self {
			HeaderEntry::Line(line) => line
				.split_once(':')
				.map(|(name, value)| vec![(name.trim(), value.trim())])
				.unwrap_or_default(),
			HeaderEntry::Map(map) => map
				.iter()
				.map(|(name, value)| (name.as_str(), value.as_str()))
				.collect(),
		}
	}
}
