//! Cache namespaces and the credential fingerprints that key them.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::siren::Entity;

/// Identifies the namespace of one credential.
///
/// Credentials are stored as a SHA-256 fingerprint so the bearer token
/// itself never ends up in map keys, `Debug` output or logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceKey {
  Anonymous,
  Credential(String),
}

impl NamespaceKey {
  pub fn for_token(token: Option<&str>) -> Self {
    match token {
      None => NamespaceKey::Anonymous,
      Some(token) => {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        NamespaceKey::Credential(hex::encode(hasher.finalize()))
      }
    }
  }
}

impl fmt::Display for NamespaceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NamespaceKey::Anonymous => f.write_str("anonymous"),
      NamespaceKey::Credential(fingerprint) => {
        let short = fingerprint.get(..12).unwrap_or(fingerprint);
        write!(f, "credential:{}", short)
      }
    }
  }
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity {
  /// The cached entity
  pub entity: Arc<Entity>,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Address → entity mapping for one credential.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
  entries: HashMap<String, CachedEntity>,
}

impl Namespace {
  pub fn get(&self, href: &str) -> Option<&CachedEntity> {
    self.entries.get(href)
  }

  pub fn contains(&self, href: &str) -> bool {
    self.entries.contains_key(href)
  }

  /// Store `entity` under `href`, replacing any previous entry.
  pub fn insert(&mut self, href: impl Into<String>, entity: Arc<Entity>) {
    self.entries.insert(
      href.into(),
      CachedEntity {
        entity,
        cached_at: Utc::now(),
      },
    );
  }

  pub fn remove(&mut self, href: &str) -> Option<CachedEntity> {
    self.entries.remove(href)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn hrefs(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }
}
