//! Core traits and types for the page cache.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Trait for items that can be stored in a cached page.
///
/// The cache never looks inside an item beyond its identity, which is what
/// optimistic removal needs.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier of this item.
  fn id(&self) -> u64;

  /// Entity type name for storage organization (e.g., "music")
  fn entity_type() -> &'static str;
}

/// Trait for keys addressing cached pages.
pub trait QueryKey {
  /// Canonical, human readable form of the key.
  fn cache_key(&self) -> String;

  /// Stable, fixed-length digest used by persistent backends.
  fn cache_hash(&self) -> String;

  /// Short description for logs.
  fn description(&self) -> String;
}

/// Paging metadata reported alongside a page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
  /// Number of the last page for this query
  pub last_page: u32,
  /// Total number of matching items, when the source reports it
  #[serde(default)]
  pub total: Option<u64>,
}

/// A cached page of items.
///
/// Entries are never edited in place: a change produces a new entry that
/// replaces the old one under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: Vec<T>,
  pub meta: PageMeta,
  /// When the page was fetched
  pub cached_at: DateTime<Utc>,
}

impl<T: Cacheable> CacheEntry<T> {
  /// Create an entry stamped with the current time.
  pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
    Self {
      data,
      meta,
      cached_at: Utc::now(),
    }
  }

  /// Copy of this entry without the item `id`, keeping the original timestamp.
  pub fn without(&self, id: u64) -> Self {
    Self {
      data: self.data.iter().filter(|item| item.id() != id).cloned().collect(),
      meta: self.meta,
      cached_at: self.cached_at,
    }
  }

  pub fn contains(&self, id: u64) -> bool {
    self.data.iter().any(|item| item.id() == id)
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the data source
  Network,
  /// Data served from the page cache
  Cache,
}
