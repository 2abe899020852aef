//! Page cache for paged listings.
//!
//! This module is agnostic of what is being listed. It provides:
//! - Canonical keys over (page, sort order, exclusion set)
//! - Whole-page entries that are replaced, never edited
//! - An optional freshness window
//! - In-memory, SQLite and no-op storage backends

mod key;
mod layer;
mod storage;
mod traits;

pub use key::{key, PageKey, SortOrder};
pub use layer::PageCache;
pub use storage::{MemoryStorage, NoopStorage, PageStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheSource, Cacheable, PageMeta, QueryKey};
