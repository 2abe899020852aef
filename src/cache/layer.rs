//! Page cache sitting in front of a storage backend.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::key::PageKey;
use super::storage::PageStorage;
use super::traits::{CacheEntry, Cacheable, QueryKey};
use crate::error::Result;

/// Memoizes fetched pages per [`PageKey`].
///
/// Entries have no expiry unless a stale time is set, in which case entries
/// older than it read as absent.
pub struct PageCache<T, S> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Option<Duration>,
  _item: PhantomData<fn() -> T>,
}

impl<T: Cacheable, S: PageStorage<T>> PageCache<T, S> {
  /// Create a new page cache with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: None,
      _item: PhantomData,
    }
  }

  /// Set the stale time for cached pages.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = Some(stale_time);
    self
  }

  /// Check if a page cached at `cached_at` is past the stale time.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    self
      .stale_time
      .is_some_and(|stale_time| Utc::now() - cached_at > stale_time)
  }

  /// Fresh entry for `key`, if any.
  pub fn get(&self, key: &PageKey) -> Result<Option<CacheEntry<T>>> {
    match self.storage.load(&key.cache_hash())? {
      Some(entry) if self.is_stale(entry.cached_at) => {
        debug!(key = %key, "Cached page is stale");
        Ok(None)
      }
      entry => Ok(entry),
    }
  }

  /// Store `entry` under `key`, replacing whatever was there.
  pub fn put(&self, key: &PageKey, entry: &CacheEntry<T>) -> Result<()> {
    self
      .storage
      .store(&key.cache_hash(), &key.description(), entry)
  }

  pub fn invalidate(&self, key: &PageKey) -> Result<()> {
    debug!(key = %key, "Invalidating cached page");
    self.storage.remove(&key.cache_hash())
  }

  pub fn invalidate_all(&self) -> Result<()> {
    debug!("Invalidating all cached pages");
    self.storage.clear()
  }

  /// Replace the entry under `key` with a copy lacking item `id`.
  ///
  /// Returns `true` if an entry held the item.
  pub fn remove_item(&self, key: &PageKey, id: u64) -> Result<bool> {
    let hash = key.cache_hash();
    match self.storage.load(&hash)? {
      Some(entry) if entry.contains(id) => {
        self
          .storage
          .store(&hash, &key.description(), &entry.without(id))?;
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}

impl<T, S> Clone for PageCache<T, S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      _item: PhantomData,
    }
  }
}
