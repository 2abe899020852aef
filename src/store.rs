//! JSON file backed item lists used by the local sources.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::cache::PageMeta;
use crate::source::FetchedPage;

/// An in-memory list, optionally mirrored to a JSON file holding a plain
/// array of items.
///
/// Mutations run one at a time. Each one edits a copy of the list, writes
/// the copy out and only then replaces the list, so a failed write leaves
/// both the file and the list as they were.
pub(crate) struct JsonStore<T> {
  path: Option<PathBuf>,
  items: Mutex<Vec<T>>,
  write: tokio::sync::Mutex<()>,
}

impl<T> JsonStore<T>
where
  T: Clone + Send + Serialize + DeserializeOwned,
{
  pub fn in_memory(items: Vec<T>) -> Self {
    Self::with_items(None, items)
  }

  /// Load the list from `path`. A missing file yields an empty list that
  /// will be created on the first mutation.
  pub fn open(path: &Path) -> Result<Self> {
    let items = if path.exists() {
      let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
      serde_json::from_str(&contents)
        .map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))?
    } else {
      Vec::new()
    };
    debug!(path = %path.display(), "Opened JSON store");

    Ok(Self::with_items(Some(path.to_path_buf()), items))
  }

  fn with_items(path: Option<PathBuf>, items: Vec<T>) -> Self {
    Self {
      path,
      items: Mutex::new(items),
      write: tokio::sync::Mutex::new(()),
    }
  }

  pub fn read(&self) -> Result<MutexGuard<'_, Vec<T>>> {
    self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Apply `change` to the list and persist the result.
  pub async fn mutate<R, F>(&self, change: F) -> Result<R>
  where
    F: FnOnce(&mut Vec<T>) -> Result<R> + Send,
    R: Send,
  {
    let _write = self.write.lock().await;

    let mut next = self.read()?.clone();
    let value = change(&mut next)?;
    self.persist(&next).await?;
    *self.read()? = next;

    Ok(value)
  }

  async fn persist(&self, items: &[T]) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };

    let contents =
      serde_json::to_vec_pretty(items).map_err(|e| eyre!("Failed to serialize: {}", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| eyre!("Failed to create {}: {}", parent.display(), e))?;
    }

    tokio::fs::write(path, contents)
      .await
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
  }
}

/// Cut page `page` out of an already filtered and ordered list.
///
/// An empty list still has one (empty) page.
pub(crate) fn slice_page<T: Clone>(ranked: Vec<&T>, page: u32, per_page: u32) -> FetchedPage<T> {
  let per_page = per_page.max(1) as usize;
  let total = ranked.len();
  let last_page = total.div_ceil(per_page).max(1) as u32;
  let start = (page.max(1) as usize - 1) * per_page;

  FetchedPage {
    items: ranked
      .into_iter()
      .skip(start)
      .take(per_page)
      .cloned()
      .collect(),
    meta: PageMeta {
      last_page,
      total: Some(total as u64),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Path whose parent is a regular file, so nothing can be written there.
  fn unwritable(dir: &tempfile::TempDir) -> PathBuf {
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    blocker.join("items.json")
  }

  #[tokio::test]
  async fn test_failed_write_keeps_previous_items() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::with_items(Some(unwritable(&dir)), vec![1u64, 2, 3]);

    let result = store
      .mutate(|items| {
        items.retain(|&i| i != 2);
        Ok(())
      })
      .await;

    assert!(result.is_err());
    assert_eq!(*store.read().unwrap(), vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn test_rejected_change_is_not_applied() {
    let store = JsonStore::in_memory(vec![1u64]);

    let result: Result<()> = store
      .mutate(|items| {
        items.push(2);
        Err(eyre!("nope"))
      })
      .await;

    assert!(result.is_err());
    assert_eq!(*store.read().unwrap(), vec![1]);
  }

  #[tokio::test]
  async fn test_concurrent_mutations_all_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.json");
    let store = JsonStore::<u64>::open(&path).unwrap();

    let push = |value| {
      let store = &store;
      async move {
        store
          .mutate(move |items| {
            items.push(value);
            Ok(())
          })
          .await
      }
    };
    let (a, b, c) = tokio::join!(push(1), push(2), push(3));
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let mut saved = JsonStore::<u64>::open(&path).unwrap().read().unwrap().clone();
    saved.sort_unstable();
    assert_eq!(saved, vec![1, 2, 3]);
  }

  #[test]
  fn test_slice_page_bounds() {
    let items: Vec<u64> = (1..=5).collect();
    let page = slice_page(items.iter().collect(), 3, 2);
    assert_eq!(page.items, vec![5]);
    assert_eq!(page.meta.last_page, 3);
    assert_eq!(page.meta.total, Some(5));

    let empty: Vec<u64> = Vec::new();
    let page = slice_page(empty.iter().collect(), 1, 2);
    assert!(page.items.is_empty());
    assert_eq!(page.meta.last_page, 1);
  }
}
