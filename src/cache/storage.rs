//! Cache storage trait and its backends.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::traits::{CacheEntry, Cacheable, PageMeta};
use crate::error::{ListError, Result};

/// Trait for page cache backends.
///
/// Keys are opaque strings chosen by the cache layer. Storing under an
/// existing key replaces the previous entry wholesale.
pub trait PageStorage<T: Cacheable>: Send + Sync {
  /// Get the entry stored under `key`.
  fn load(&self, key: &str) -> Result<Option<CacheEntry<T>>>;

  /// Store `entry` under `key`, replacing any previous entry.
  fn store(&self, key: &str, description: &str, entry: &CacheEntry<T>) -> Result<()>;

  /// Drop the entry stored under `key`.
  fn remove(&self, key: &str) -> Result<()>;

  /// Drop every entry of this item type.
  fn clear(&self) -> Result<()>;
}

/// In-process storage; lives as long as its owner.
pub struct MemoryStorage<T> {
  entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> MemoryStorage<T> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, CacheEntry<T>>>> {
    self
      .entries
      .lock()
      .map_err(|e| ListError::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl<T> Default for MemoryStorage<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Cacheable> PageStorage<T> for MemoryStorage<T> {
  fn load(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
    Ok(self.entries()?.get(key).cloned())
  }

  fn store(&self, key: &str, _description: &str, entry: &CacheEntry<T>) -> Result<()> {
    self.entries()?.insert(key.to_string(), entry.clone());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries()?.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self.entries()?.clear();
    Ok(())
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage<T>(PhantomData<fn() -> T>);

impl<T> NoopStorage<T> {
  pub fn new() -> Self {
    Self(PhantomData)
  }
}

impl<T> Default for NoopStorage<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Cacheable> PageStorage<T> for NoopStorage<T> {
  fn load(&self, _key: &str) -> Result<Option<CacheEntry<T>>> {
    Ok(None) // Always miss
  }

  fn store(&self, _key: &str, _description: &str, _entry: &CacheEntry<T>) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage, so pages survive between runs.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS page_cache (
    query_hash TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    query_description TEXT NOT NULL,
    last_page INTEGER NOT NULL,
    total INTEGER,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, query_hash)
);
"#;

fn sqlite_err(context: &'static str) -> impl FnOnce(rusqlite::Error) -> ListError {
  move |e| ListError::Storage(format!("{}: {}", context, e))
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| ListError::Storage(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      ListError::Storage(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  /// Throwaway database, mostly for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory().map_err(sqlite_err("Failed to open in-memory cache"))?;
    Self::with_connection(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| ListError::Storage("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("tiao").join("cache.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(sqlite_err("Failed to run cache migrations"))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| ListError::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl<T: Cacheable> PageStorage<T> for SqliteStorage {
  fn load(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
    let conn = self.conn()?;

    let row: Option<(u32, Option<i64>, Vec<u8>, String)> = conn
      .query_row(
        "SELECT last_page, total, data, cached_at FROM page_cache
         WHERE entity_type = ? AND query_hash = ?",
        params![T::entity_type(), key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(sqlite_err("Failed to query cached page"))?;

    let Some((last_page, total, data, cached_at)) = row else {
      return Ok(None);
    };

    let data: Vec<T> = serde_json::from_slice(&data)
      .map_err(|e| ListError::Storage(format!("Failed to deserialize cached page: {}", e)))?;

    Ok(Some(CacheEntry {
      data,
      meta: PageMeta {
        last_page,
        total: total.map(|t| t as u64),
      },
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn store(&self, key: &str, description: &str, entry: &CacheEntry<T>) -> Result<()> {
    let conn = self.conn()?;
    let data = serde_json::to_vec(&entry.data)
      .map_err(|e| ListError::Storage(format!("Failed to serialize page: {}", e)))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO page_cache
           (query_hash, entity_type, query_description, last_page, total, data, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          key,
          T::entity_type(),
          description,
          entry.meta.last_page,
          entry.meta.total.map(|t| t as i64),
          data,
          entry.cached_at.to_rfc3339(),
        ],
      )
      .map_err(sqlite_err("Failed to store page"))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self
      .conn()?
      .execute(
        "DELETE FROM page_cache WHERE entity_type = ? AND query_hash = ?",
        params![T::entity_type(), key],
      )
      .map_err(sqlite_err("Failed to remove page"))?;
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self
      .conn()?
      .execute(
        "DELETE FROM page_cache WHERE entity_type = ?",
        params![T::entity_type()],
      )
      .map_err(sqlite_err("Failed to clear page cache"))?;
    Ok(())
  }
}

/// Parse a timestamp written by [`SqliteStorage`].
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| ListError::Storage(format!("Failed to parse datetime '{}': {}", s, e)))
}
