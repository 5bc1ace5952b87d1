use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::version::VersionTag;

/// Number of hex characters of the content hash appended to hashed names.
const NAME_HASH_LEN: usize = 12;

/// A build definition the orchestrator can hand to an executor.
///
/// The orchestrator treats definitions as opaque: it reads the name and
/// declared version once, when the [`BuildUnit`](super::BuildUnit) is
/// constructed, and passes the payload through to the executor.
pub trait BuildDefinition: Send + Sync + fmt::Debug {
  /// Name of the artifact this definition builds on the remote store.
  fn name(&self) -> String;

  /// Version gating this definition; `None` means always build.
  fn declared_version(&self) -> Option<VersionTag>;

  /// Body sent to the remote store.
  fn payload(&self) -> serde_json::Value;
}

/// An index definition loaded from a JSON definition file.
///
/// ```json
/// {
///   "name": "BlogPostsByAuthor",
///   "version": "1.0.0",
///   "maps": ["from post in docs.BlogPosts select new { post.Author }"],
///   "reduce": null,
///   "fields": { "Author": { "indexing": "exact" } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDefinition {
  pub name: String,

  #[serde(default, with = "version_text", skip_serializing_if = "Option::is_none")]
  pub version: Option<VersionTag>,

  pub maps: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reduce: Option<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub fields: BTreeMap<String, serde_json::Value>,

  /// Append a content hash to the name so every change to the definition
  /// targets a fresh index.
  #[serde(default)]
  pub hashed_name: bool,
}

impl IndexDefinition {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      version: None,
      maps: Vec::new(),
      reduce: None,
      fields: BTreeMap::new(),
      hashed_name: false,
    }
  }

  pub fn with_version(mut self, version: VersionTag) -> Self {
    self.version = Some(version);
    self
  }

  pub fn with_map(mut self, map: &str) -> Self {
    self.maps.push(map.to_string());
    self
  }

  pub fn with_reduce(mut self, reduce: &str) -> Self {
    self.reduce = Some(reduce.to_string());
    self
  }

  pub fn hashed(mut self) -> Self {
    self.hashed_name = true;
    self
  }

  /// Hex sha256 of the payload.
  pub fn content_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.payload().to_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl BuildDefinition for IndexDefinition {
  fn name(&self) -> String {
    if self.hashed_name {
      let hash = self.content_hash();
      format!("{}-{}", self.name, &hash[..NAME_HASH_LEN])
    } else {
      self.name.clone()
    }
  }

  fn declared_version(&self) -> Option<VersionTag> {
    self.version
  }

  fn payload(&self) -> serde_json::Value {
    serde_json::json!({
      "maps": self.maps,
      "reduce": self.reduce,
      "fields": self.fields,
    })
  }
}

/// Serde adapter storing an optional version in its text form.
mod version_text {
  use serde::{Deserialize, Deserializer, Serializer};

  use crate::version::VersionTag;

  pub fn serialize<S: Serializer>(version: &Option<VersionTag>, s: S) -> Result<S::Ok, S::Error> {
    match version {
      Some(v) => s.serialize_some(&v.to_string()),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<VersionTag>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    raw
      .map(|s| s.parse::<VersionTag>().map_err(serde::de::Error::custom))
      .transpose()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn blog_posts() -> IndexDefinition {
    IndexDefinition::new("BlogPostsByAuthor")
      .with_version(VersionTag::new(1, 0, 0))
      .with_map("from post in docs.BlogPosts select new { post.Author }")
  }

  #[test]
  fn plain_name_is_unchanged() {
    assert_eq!(BuildDefinition::name(&blog_posts()), "BlogPostsByAuthor");
  }

  #[test]
  fn hashed_name_appends_content_hash() {
    let def = blog_posts().hashed();
    let name = BuildDefinition::name(&def);

    assert!(name.starts_with("BlogPostsByAuthor-"));
    assert_eq!(name.len(), "BlogPostsByAuthor-".len() + NAME_HASH_LEN);
    assert_eq!(name, BuildDefinition::name(&def));
  }

  #[test]
  fn hashed_name_tracks_definition_body_only() {
    let a = blog_posts().hashed();
    let bumped = a.clone().with_version(VersionTag::new(2, 0, 0));
    let changed = a.clone().with_reduce("from r in results select r");

    assert_eq!(BuildDefinition::name(&a), BuildDefinition::name(&bumped));
    assert_ne!(BuildDefinition::name(&a), BuildDefinition::name(&changed));
  }

  #[test]
  fn parses_definition_file_json() {
    let json = r#"{
      "name": "Orders",
      "version": "01.02.03",
      "maps": ["from o in docs.Orders select new { o.Total }"],
      "fields": { "Total": { "sort": "double" } }
    }"#;

    let def: IndexDefinition = serde_json::from_str(json).unwrap();
    assert_eq!(def.declared_version(), Some(VersionTag::new(1, 2, 3)));
    assert_eq!(def.maps.len(), 1);
    assert!(!def.hashed_name);
    assert_eq!(def.payload()["fields"]["Total"]["sort"], "double");
  }

  #[test]
  fn rejects_malformed_version() {
    let json = r#"{ "name": "Orders", "version": "one", "maps": [] }"#;
    let err = serde_json::from_str::<IndexDefinition>(json).unwrap_err();
    assert!(err.to_string().contains("invalid version"));
  }

  #[test]
  fn rejects_unknown_keys() {
    let json = r#"{ "name": "Orders", "maps": [], "mpas": [] }"#;
    assert!(serde_json::from_str::<IndexDefinition>(json).is_err());
  }

  #[test]
  fn version_is_written_in_text_form() {
    let json = serde_json::to_value(blog_posts()).unwrap();
    assert_eq!(json["version"], "01.00.00");
  }
}
