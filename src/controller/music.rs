use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::paged::{lock, LoadOutcome, MutationOutcome, PagedList};
use crate::cache::{PageCache, PageKey, PageStorage, SortOrder};
use crate::config::ListingConfig;
use crate::error::{ListError, MutationKind, Result};
use crate::music::{Music, MusicSource, MusicUpdate, NewMusic};
use crate::pagination::PaginationState;
use crate::source::{PageRequest, PageSource};

/// A music entry with its position in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMusic {
  /// 1-based position. Continues after the top list when the page excludes
  /// exactly the top list and is ranked most played first; otherwise counts
  /// within the listing as shown.
  pub position: u64,
  pub music: Music,
}

/// Everything a renderer needs for the music list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
  pub top: Vec<Music>,
  pub items: Vec<RankedMusic>,
  pub current_page: u32,
  pub total_pages: u32,
  pub visible_pages: Vec<u32>,
  pub has_next_page: bool,
  pub has_prev_page: bool,
  pub sort: SortOrder,
  pub loading: bool,
}

/// Controller for the paged music ranking and the top list above it.
pub struct MusicListController<S> {
  source: Arc<dyn MusicSource>,
  pages: PagedList<Music, S>,
  top_count: u32,
  top: Mutex<Vec<Music>>,
}

impl<S: PageStorage<Music>> MusicListController<S> {
  pub fn new<M: MusicSource + 'static>(
    source: Arc<M>,
    cache: PageCache<Music, S>,
    listing: &ListingConfig,
  ) -> Self {
    let pages = PagedList::new(
      Arc::clone(&source) as Arc<dyn PageSource<Music>>,
      cache,
      listing.per_page,
      PageKey::new(1, listing.default_sort, []),
    );
    Self {
      source,
      pages,
      top_count: listing.top_count,
      top: Mutex::new(Vec::new()),
    }
  }

  /// Load a page, from the cache unless `force` is set.
  ///
  /// A page past the end is clamped to the last page once the page count is
  /// known. On error nothing visible changes.
  pub async fn load(
    &self,
    page: u32,
    sort: SortOrder,
    exclude: &[u64],
    force: bool,
  ) -> Result<LoadOutcome> {
    let key = PageKey::new(page.max(1), sort, exclude.iter().copied());
    self.pages.load(key, force).await
  }

  pub async fn go_to_page(&self, target: i64) -> Result<LoadOutcome> {
    self.pages.go_to_page(target).await
  }

  pub async fn next_page(&self) -> Result<Option<LoadOutcome>> {
    self.pages.next_page().await
  }

  pub async fn prev_page(&self) -> Result<Option<LoadOutcome>> {
    self.pages.prev_page().await
  }

  /// Switch ordering and go back to the first page.
  pub async fn set_sort_order(&self, sort: SortOrder) -> Result<LoadOutcome> {
    let exclude = self.pages.desired().exclude().clone();
    self.pages.load(PageKey::new(1, sort, exclude), false).await
  }

  /// Replace the exclusion set.
  ///
  /// A different set means the ranking around it moved, so every cached page
  /// is dropped and the list starts over at page 1. The same set just reloads
  /// the current page.
  pub async fn set_exclusions(&self, ids: impl IntoIterator<Item = u64>) -> Result<LoadOutcome> {
    let exclude: BTreeSet<u64> = ids.into_iter().collect();
    let desired = self.pages.desired();
    if *desired.exclude() == exclude {
      return self.pages.load(desired, false).await;
    }

    info!(excluded = exclude.len(), "Exclusion set changed");
    self.pages.invalidate_all();
    self
      .pages
      .load(PageKey::new(1, desired.sort(), exclude), true)
      .await
  }

  /// Fetch the most played music, returning its ids.
  ///
  /// The top list is always fetched fresh and is not cached. With a top
  /// count of zero there is no top list and nothing is fetched.
  pub async fn fetch_top(&self) -> Result<Vec<u64>> {
    if self.top_count == 0 {
      lock(&self.top).clear();
      return Ok(Vec::new());
    }

    let request = PageRequest {
      page: 1,
      per_page: self.top_count,
      sort: SortOrder::Desc,
      exclude: Vec::new(),
      filter: None,
    };
    let top = self
      .source
      .fetch_page(&request)
      .await
      .map_err(|e| ListError::fetch(format!("top {}", self.top_count), &e))?
      .items;

    debug!(count = top.len(), "Fetched top list");
    let ids = top.iter().map(|m| m.id).collect();
    *lock(&self.top) = top;
    Ok(ids)
  }

  /// Fetch the most played music and keep it out of the paged list.
  pub async fn refresh_top(&self) -> Result<LoadOutcome> {
    let ids = self.fetch_top().await?;
    self.set_exclusions(ids).await
  }

  /// Reload the current page from the source.
  pub async fn refresh(&self) -> Result<LoadOutcome> {
    self.pages.refresh().await
  }

  pub fn invalidate_all(&self) {
    self.pages.invalidate_all();
  }

  pub async fn create(&self, music: NewMusic) -> Result<MutationOutcome<Music>> {
    let created = self
      .source
      .create(music)
      .await
      .map_err(|e| ListError::mutation("music", MutationKind::Create, None, &e))?;

    info!(id = created.id, "Music created");
    Ok(self.pages.after_mutation(created).await)
  }

  /// Add the video behind a YouTube link.
  pub async fn create_from_youtube_url(
    &self,
    title: impl Into<String>,
    url: &str,
  ) -> Result<MutationOutcome<Music>> {
    let music = NewMusic::from_youtube_url(title, url).map_err(|e| e.for_url(url))?;
    self.create(music).await
  }

  pub async fn update(&self, id: u64, changes: MusicUpdate) -> Result<MutationOutcome<Music>> {
    let updated = self
      .source
      .update(id, changes)
      .await
      .map_err(|e| ListError::mutation("music", MutationKind::Update, Some(id), &e))?;

    info!(id, "Music updated");
    Ok(self.pages.after_mutation(updated).await)
  }

  /// Delete a music, hiding it before the source confirms.
  ///
  /// If the source refuses, the page is reloaded; if that reload fails too,
  /// the list as it was before the delete is put back.
  pub async fn delete(&self, id: u64) -> Result<MutationOutcome<()>> {
    self.pages.remove(id, self.source.delete(id)).await
  }

  pub fn pagination(&self) -> PaginationState {
    self.pages.pagination()
  }

  pub fn items(&self) -> Vec<Music> {
    self.pages.items()
  }

  pub fn sort(&self) -> SortOrder {
    self.pages.desired().sort()
  }

  /// Snapshot of the list for rendering.
  pub fn view(&self) -> ListView {
    let top = lock(&self.top).clone();
    let page = self.pages.view();

    let top_ids: BTreeSet<u64> = top.iter().map(|m| m.id).collect();
    let follows_top = page.displayed.as_ref().is_some_and(|key| {
      key.sort() == SortOrder::Desc && !top_ids.is_empty() && *key.exclude() == top_ids
    });
    let before = if follows_top { top.len() as u64 } else { 0 };
    let first_position = before + page.offset + 1;

    ListView {
      top,
      items: page
        .items
        .into_iter()
        .zip(first_position..)
        .map(|(music, position)| RankedMusic { position, music })
        .collect(),
      current_page: page.current_page,
      total_pages: page.total_pages,
      visible_pages: page.visible_pages,
      has_next_page: page.has_next_page,
      has_prev_page: page.has_prev_page,
      sort: page.sort,
      loading: page.loading,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheEntry, CacheSource, MemoryStorage, PageMeta};
  use crate::music::CatalogSource;
  use crate::source::FetchedPage;
  use async_trait::async_trait;
  use chrono::Utc;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use tokio::sync::Semaphore;

  /// Catalog wrapper that counts fetches and can fail or hold calls.
  struct TestSource {
    catalog: CatalogSource,
    fetches: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_delete: AtomicBool,
    fetch_gate: Mutex<Option<(u32, Arc<Semaphore>)>>,
    delete_gate: Mutex<Option<Arc<Semaphore>>>,
  }

  impl TestSource {
    fn fetches(&self) -> usize {
      self.fetches.load(Ordering::SeqCst)
    }

    /// Hold the next fetch of `page` until a permit is added. The data is
    /// read before waiting.
    fn gate_fetch(&self, page: u32) -> Arc<Semaphore> {
      let gate = Arc::new(Semaphore::new(0));
      *self.fetch_gate.lock().unwrap() = Some((page, Arc::clone(&gate)));
      gate
    }

    fn gate_delete(&self) -> Arc<Semaphore> {
      let gate = Arc::new(Semaphore::new(0));
      *self.delete_gate.lock().unwrap() = Some(Arc::clone(&gate));
      gate
    }
  }

  #[async_trait]
  impl PageSource<Music> for TestSource {
    async fn fetch_page(&self, request: &PageRequest) -> color_eyre::Result<FetchedPage<Music>> {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      if self.fail_fetch.load(Ordering::SeqCst) {
        return Err(eyre!("backend unavailable"));
      }
      let page = self.catalog.fetch_page(request).await?;

      let gate = {
        let mut slot = self.fetch_gate.lock().unwrap();
        match slot.as_ref() {
          Some((gated, _)) if *gated == request.page => slot.take().map(|(_, gate)| gate),
          _ => None,
        }
      };
      if let Some(gate) = gate {
        let _permit = gate.acquire().await.unwrap();
      }
      Ok(page)
    }
  }

  #[async_trait]
  impl MusicSource for TestSource {
    async fn create(&self, music: NewMusic) -> color_eyre::Result<Music> {
      self.catalog.create(music).await
    }

    async fn update(&self, id: u64, changes: MusicUpdate) -> color_eyre::Result<Music> {
      self.catalog.update(id, changes).await
    }

    async fn delete(&self, id: u64) -> color_eyre::Result<()> {
      let gate = self.delete_gate.lock().unwrap().take();
      if let Some(gate) = gate {
        let _permit = gate.acquire().await.unwrap();
      }
      if self.fail_delete.load(Ordering::SeqCst) {
        return Err(eyre!("delete rejected"));
      }
      self.catalog.delete(id).await
    }
  }

  fn music(id: u64) -> Music {
    Music {
      id,
      title: format!("Music {}", id),
      youtube_id: Some(format!("yt{}", id)),
      link: None,
      plays: id * 10,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn controller() -> (Arc<TestSource>, MusicListController<MemoryStorage<Music>>) {
    controller_with_top(2)
  }

  /// Nine musics, id `i` with `i * 10` plays, two per page.
  fn controller_with_top(
    top_count: u32,
  ) -> (Arc<TestSource>, MusicListController<MemoryStorage<Music>>) {
    let source = Arc::new(TestSource {
      catalog: CatalogSource::in_memory((1..=9).map(music).collect()),
      fetches: AtomicUsize::new(0),
      fail_fetch: AtomicBool::new(false),
      fail_delete: AtomicBool::new(false),
      fetch_gate: Mutex::new(None),
      delete_gate: Mutex::new(None),
    });
    let listing = ListingConfig {
      per_page: 2,
      top_count,
      default_sort: SortOrder::Desc,
      ..Default::default()
    };
    let list = MusicListController::new(
      Arc::clone(&source),
      PageCache::new(MemoryStorage::new()),
      &listing,
    );
    (source, list)
  }

  fn ids(list: &MusicListController<MemoryStorage<Music>>) -> Vec<u64> {
    list.items().iter().map(|m| m.id).collect()
  }

  fn desc_key(page: u32) -> PageKey {
    PageKey::new(page, SortOrder::Desc, [])
  }

  #[tokio::test]
  async fn test_first_load_fetches_then_serves_from_cache() {
    let (source, list) = controller();

    let outcome = list.load(1, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Network);
    assert!(outcome.committed);
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(list.pagination().total_pages(), 5);

    list.load(2, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(ids(&list), vec![7, 6]);

    let outcome = list.load(1, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Cache);
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(source.fetches(), 2);
  }

  #[tokio::test]
  async fn test_forced_load_bypasses_cache() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    // Plant something the source would never return
    let cache = list.pages.cache().clone();
    let planted = CacheEntry::new(vec![music(42)], PageMeta { last_page: 1, total: Some(1) });
    cache.put(&desc_key(1), &planted).unwrap();

    let outcome = list.load(1, SortOrder::Desc, &[], true).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Network);
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(source.fetches(), 2);
  }

  #[tokio::test]
  async fn test_concurrent_loads_share_one_fetch() {
    let (source, list) = controller();
    let gate = source.gate_fetch(1);

    let (first, second, _) = tokio::join!(
      list.load(1, SortOrder::Desc, &[], false),
      list.load(1, SortOrder::Desc, &[], false),
      async {
        tokio::task::yield_now().await;
        gate.add_permits(1);
      }
    );

    assert!(first.unwrap().committed);
    assert!(second.unwrap().committed);
    assert_eq!(source.fetches(), 1);
    assert_eq!(ids(&list), vec![9, 8]);
  }

  #[tokio::test]
  async fn test_late_response_is_cached_but_not_shown() {
    let (source, list) = controller();
    let gate = source.gate_fetch(2);

    let (late, _) = tokio::join!(list.load(2, SortOrder::Desc, &[], false), async {
      tokio::task::yield_now().await;
      list.load(3, SortOrder::Desc, &[], false).await.unwrap();
      gate.add_permits(1);
    });

    let late = late.unwrap();
    assert!(!late.committed);
    assert_eq!(list.pagination().current_page(), 3);
    assert_eq!(ids(&list), vec![5, 4]);
    assert!(!list.view().loading);

    let outcome = list.load(2, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Cache);
    assert_eq!(ids(&list), vec![7, 6]);
    assert_eq!(source.fetches(), 2);
  }

  #[tokio::test]
  async fn test_superseded_fetch_does_not_overwrite_cache() {
    let (source, list) = controller();
    let gate = source.gate_fetch(2);

    let (first, _) = tokio::join!(list.load(2, SortOrder::Desc, &[], false), async {
      tokio::task::yield_now().await;
      let rename = MusicUpdate {
        title: Some("Renamed".to_string()),
        ..Default::default()
      };
      source.catalog.update(7, rename).await.unwrap();
      list.load(2, SortOrder::Desc, &[], true).await.unwrap();
      gate.add_permits(1);
    });

    let first = first.unwrap();
    assert!(first.committed);
    assert_eq!(first.source, CacheSource::Cache);
    assert_eq!(source.fetches(), 2);

    let cached = list.pages.cache().get(&desc_key(2)).unwrap().unwrap();
    assert_eq!(cached.data[0].title, "Renamed");
    assert_eq!(list.items()[0].title, "Renamed");
  }

  #[tokio::test]
  async fn test_fetch_started_before_invalidation_is_reissued() {
    let (source, list) = controller();
    let gate = source.gate_fetch(2);

    let (outcome, _) = tokio::join!(list.load(2, SortOrder::Desc, &[], false), async {
      tokio::task::yield_now().await;
      let rename = MusicUpdate {
        title: Some("Renamed".to_string()),
        ..Default::default()
      };
      source.catalog.update(7, rename).await.unwrap();
      list.invalidate_all();
      gate.add_permits(1);
    });

    let outcome = outcome.unwrap();
    assert!(outcome.committed);
    assert_eq!(outcome.source, CacheSource::Network);
    assert_eq!(source.fetches(), 2);
    assert_eq!(list.items()[0].title, "Renamed");
    assert!(!list.view().loading);
  }

  #[tokio::test]
  async fn test_failed_load_keeps_visible_state() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    source.fail_fetch.store(true, Ordering::SeqCst);
    let err = list.load(2, SortOrder::Desc, &[], false).await.unwrap_err();
    assert!(matches!(err, ListError::Fetch { .. }));
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(list.pagination().current_page(), 1);
    assert!(!list.view().loading);

    source.fail_fetch.store(false, Ordering::SeqCst);
    let outcome = list.next_page().await.unwrap().unwrap();
    assert_eq!(outcome.key.page(), 2);
    assert_eq!(ids(&list), vec![7, 6]);
  }

  #[tokio::test]
  async fn test_navigation_stops_at_edges() {
    let (_source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();
    assert!(list.prev_page().await.unwrap().is_none());

    list.go_to_page(5).await.unwrap();
    assert_eq!(ids(&list), vec![1]);
    assert!(list.next_page().await.unwrap().is_none());

    let outcome = list.go_to_page(99).await.unwrap();
    assert_eq!(outcome.key.page(), 5);

    let outcome = list.prev_page().await.unwrap().unwrap();
    assert_eq!(outcome.key.page(), 4);
    assert_eq!(ids(&list), vec![3, 2]);
  }

  #[tokio::test]
  async fn test_page_past_end_is_clamped() {
    let (source, list) = controller();

    let outcome = list.load(8, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(outcome.key.page(), 5);
    assert_eq!(list.pagination().current_page(), 5);
    assert_eq!(ids(&list), vec![1]);
    assert_eq!(source.fetches(), 2);
  }

  #[tokio::test]
  async fn test_sort_change_resets_to_first_page() {
    let (_source, list) = controller();
    list.load(3, SortOrder::Desc, &[], false).await.unwrap();

    list.set_sort_order(SortOrder::Asc).await.unwrap();
    assert_eq!(list.sort(), SortOrder::Asc);
    assert_eq!(list.pagination().current_page(), 1);
    assert_eq!(ids(&list), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_exclusion_change_invalidates_cache() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    list.set_exclusions([9, 8]).await.unwrap();
    assert_eq!(ids(&list), vec![7, 6]);
    assert_eq!(source.fetches(), 2);

    // Same set in another order is not a change
    let outcome = list.set_exclusions([8, 9]).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Cache);
    assert_eq!(source.fetches(), 2);

    // The page cached before the change is gone
    let outcome = list.load(1, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(outcome.source, CacheSource::Network);
    assert_eq!(source.fetches(), 3);
  }

  #[tokio::test]
  async fn test_exclusion_change_starts_over() {
    let (_source, list) = controller();
    list.load(3, SortOrder::Asc, &[], false).await.unwrap();

    let outcome = list.set_exclusions([1]).await.unwrap();
    assert_eq!(outcome.key.page(), 1);
    assert_eq!(list.sort(), SortOrder::Asc);
    assert_eq!(ids(&list), vec![2, 3]);
  }

  #[tokio::test]
  async fn test_refresh_top_ranks_rest_after_top() {
    let (_source, list) = controller();

    list.refresh_top().await.unwrap();
    let view = list.view();
    let top: Vec<u64> = view.top.iter().map(|m| m.id).collect();
    assert_eq!(top, vec![9, 8]);

    let ranked: Vec<(u64, u64)> = view.items.iter().map(|r| (r.position, r.music.id)).collect();
    assert_eq!(ranked, vec![(3, 7), (4, 6)]);
    assert_eq!(view.total_pages, 4);
    assert_eq!(view.visible_pages, vec![1, 2, 3, 4]);
  }

  #[tokio::test]
  async fn test_view_positions_follow_page_offset() {
    let (_source, list) = controller();
    list.load(2, SortOrder::Desc, &[], false).await.unwrap();

    let view = list.view();
    let positions: Vec<u64> = view.items.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![3, 4]);
    assert!(view.has_prev_page);
    assert!(view.has_next_page);
    assert!(view.top.is_empty());
  }

  #[tokio::test]
  async fn test_delete_hides_item_then_restores_on_failure() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    source.fail_delete.store(true, Ordering::SeqCst);
    let gate = source.gate_delete();
    let (result, seen) = tokio::join!(list.delete(9), async {
      tokio::task::yield_now().await;
      let seen = ids(&list);
      gate.add_permits(1);
      seen
    });

    assert_eq!(seen, vec![8]);
    let err = result.unwrap_err();
    assert!(matches!(
      err,
      ListError::Mutation {
        operation: MutationKind::Delete,
        id: Some(9),
        ..
      }
    ));
    assert_eq!(ids(&list), vec![9, 8]);
  }

  #[tokio::test]
  async fn test_delete_restores_snapshot_when_reload_fails() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    source.fail_delete.store(true, Ordering::SeqCst);
    source.fail_fetch.store(true, Ordering::SeqCst);
    assert!(list.delete(9).await.is_err());
    assert_eq!(ids(&list), vec![9, 8]);
    assert!(!list.view().loading);
  }

  #[tokio::test]
  async fn test_delete_reloads_page() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    let outcome = list.delete(9).await.unwrap();
    let refresh = outcome.refresh.unwrap();
    assert_eq!(refresh.source, CacheSource::Network);
    assert_eq!(ids(&list), vec![8, 7]);
    assert_eq!(list.pagination().total_pages(), 4);
    assert_eq!(source.catalog.count().unwrap(), 8);
  }

  #[tokio::test]
  async fn test_deleting_last_item_of_last_page_moves_back() {
    let (_source, list) = controller();
    list.load(5, SortOrder::Desc, &[], false).await.unwrap();
    assert_eq!(ids(&list), vec![1]);

    let outcome = list.delete(1).await.unwrap();
    assert_eq!(outcome.refresh.unwrap().key.page(), 4);
    assert_eq!(list.pagination().current_page(), 4);
    assert_eq!(ids(&list), vec![3, 2]);
  }

  #[tokio::test]
  async fn test_create_reloads_page() {
    let (_source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    let outcome = list
      .create(NewMusic {
        title: "Brand new".to_string(),
        youtube_id: Some("fresh".to_string()),
        link: None,
        plays: 1000,
      })
      .await
      .unwrap();
    assert_eq!(outcome.value.id, 10);
    assert!(outcome.refresh.is_ok());
    assert_eq!(ids(&list), vec![10, 9]);
  }

  #[tokio::test]
  async fn test_create_failure_leaves_list_alone() {
    let (source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    let err = list
      .create(NewMusic {
        title: "Copy".to_string(),
        youtube_id: Some("yt3".to_string()),
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ListError::Mutation {
        operation: MutationKind::Create,
        id: None,
        ..
      }
    ));
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(source.fetches(), 1);
  }

  #[tokio::test]
  async fn test_update_reloads_page() {
    let (_source, list) = controller();
    list.load(1, SortOrder::Desc, &[], false).await.unwrap();

    let changes = MusicUpdate {
      plays: Some(999),
      ..Default::default()
    };
    let outcome = list.update(1, changes).await.unwrap();
    assert_eq!(outcome.value.plays, 999);
    assert_eq!(ids(&list), vec![1, 9]);
  }

  #[tokio::test]
  async fn test_zero_top_count_fetches_nothing() {
    let (source, list) = controller_with_top(0);

    assert!(list.fetch_top().await.unwrap().is_empty());
    assert_eq!(source.fetches(), 0);

    list.refresh_top().await.unwrap();
    let view = list.view();
    assert!(view.top.is_empty());
    assert_eq!(ids(&list), vec![9, 8]);
    assert_eq!(view.items[0].position, 1);
    assert_eq!(source.fetches(), 1);
  }

  #[tokio::test]
  async fn test_positions_skip_top_only_when_ranked_after_it() {
    let (_source, list) = controller();
    list.refresh_top().await.unwrap();

    // Least played first: the top list is at the other end
    list.set_sort_order(SortOrder::Asc).await.unwrap();
    let view = list.view();
    let ranked: Vec<(u64, u64)> = view.items.iter().map(|r| (r.position, r.music.id)).collect();
    assert_eq!(ranked, vec![(1, 1), (2, 2)]);

    // Exclusions that are not the top list
    list.set_sort_order(SortOrder::Desc).await.unwrap();
    list.set_exclusions([5]).await.unwrap();
    let view = list.view();
    let ranked: Vec<(u64, u64)> = view.items.iter().map(|r| (r.position, r.music.id)).collect();
    assert_eq!(ranked, vec![(1, 9), (2, 8)]);
  }

  #[tokio::test]
  async fn test_create_from_youtube_url() {
    let (source, list) = controller();
    list.load(1, SortOrder::Asc, &[], false).await.unwrap();

    let outcome = list
      .create_from_youtube_url("Linked", "https://youtu.be/dQw4w9WgXcQ")
      .await
      .unwrap();
    assert_eq!(outcome.value.youtube_id.as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(ids(&list), vec![10, 1]);

    let err = list
      .create_from_youtube_url("Nope", "https://vimeo.com/1")
      .await
      .unwrap_err();
    assert!(matches!(err, ListError::InvalidUrl { .. }));
    assert_eq!(source.catalog.count().unwrap(), 10);
  }
}
