use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::cache::{
  CacheEntry, CacheSource, Cacheable, PageCache, PageKey, PageStorage, QueryKey, SortOrder,
};
use crate::error::{ListError, MutationKind, Result};
use crate::pagination::PaginationState;
use crate::source::{FetchedPage, PageRequest, PageSource};

/// How many times a load is reissued after landing past the last page or on a
/// fetch that no longer owns its key.
const MAX_RELOADS: usize = 2;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<FetchedPage<T>>>>;

/// Result of a page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
  /// Key the data belongs to. Differs from the requested key when the page
  /// had to be clamped to the new page count.
  pub key: PageKey,
  pub source: CacheSource,
  /// Whether the data became the visible page. `false` when the user moved
  /// on before it arrived.
  pub committed: bool,
}

/// Result of a successful create/update/delete.
#[derive(Debug)]
pub struct MutationOutcome<T> {
  pub value: T,
  /// The forced reload that followed the mutation.
  pub refresh: Result<LoadOutcome>,
}

/// Snapshot of a paged listing for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView<T> {
  pub items: Vec<T>,
  pub current_page: u32,
  pub total_pages: u32,
  pub visible_pages: Vec<u32>,
  pub has_next_page: bool,
  pub has_prev_page: bool,
  pub sort: SortOrder,
  pub loading: bool,
  /// Zero-based index of the first item within its listing
  pub offset: u64,
  /// Query whose data is in `items`
  pub displayed: Option<PageKey>,
}

struct ListState<T> {
  pagination: PaginationState,
  items: Vec<T>,
  /// Query of the most recent request
  desired: PageKey,
  /// Query whose data is in `items`
  displayed: Option<PageKey>,
  loading: bool,
}

struct Flight<T> {
  id: u64,
  fetch: SharedFetch<T>,
}

struct FlightTable<T> {
  next_id: u64,
  in_flight: HashMap<PageKey, Flight<T>>,
  /// Newest flight per key whose result was accepted. Only kept while some
  /// load still waits on a flight for the key.
  accepted: HashMap<PageKey, u64>,
  /// Loads waiting on a flight, per key
  waiting: HashMap<PageKey, usize>,
  /// Flights issued before this id predate the last full invalidation
  floor: u64,
}

impl<T> Default for FlightTable<T> {
  fn default() -> Self {
    Self {
      next_id: 0,
      in_flight: HashMap::new(),
      accepted: HashMap::new(),
      waiting: HashMap::new(),
      floor: 0,
    }
  }
}

impl<T> FlightTable<T> {
  fn is_current(&self, key: &PageKey, id: u64) -> bool {
    id >= self.floor && self.accepted.get(key).map_or(true, |&newest| id >= newest)
  }

  fn release(&mut self, key: &PageKey) {
    match self.waiting.get_mut(key) {
      Some(count) if *count > 1 => *count -= 1,
      _ => {
        // Every flight issued from now on is newer than anything accepted,
        // and a flight nobody waits on is never polled again
        self.waiting.remove(key);
        self.accepted.remove(key);
        self.in_flight.remove(key);
      }
    }
  }
}

/// A load waiting on a flight. Dropping it, also on cancellation, releases
/// the key's bookkeeping.
struct Waiter<'a, T> {
  flights: &'a Mutex<FlightTable<T>>,
  key: PageKey,
}

impl<T> Drop for Waiter<'_, T> {
  fn drop(&mut self) {
    lock(self.flights).release(&self.key);
  }
}

enum Commit {
  Applied,
  Discarded,
  PastLastPage(u32),
  /// Fetch lost its key to a newer fetch or an invalidation
  Superseded,
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache failures never fail a load; the cache is only an optimization.
fn log_cache_error<T>(result: Result<T>, action: &str) -> Option<T> {
  match result {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(error = %e, "Cache {} failed", action);
      None
    }
  }
}

/// One paged listing of `T`: the visible page, its pagination and the
/// fetches feeding it.
pub struct PagedList<T, S> {
  source: Arc<dyn PageSource<T>>,
  cache: PageCache<T, S>,
  per_page: u32,
  state: Mutex<ListState<T>>,
  flights: Mutex<FlightTable<T>>,
}

impl<T: Cacheable, S: PageStorage<T>> PagedList<T, S> {
  /// List that will start at `initial` once loaded.
  pub fn new(
    source: Arc<dyn PageSource<T>>,
    cache: PageCache<T, S>,
    per_page: u32,
    initial: PageKey,
  ) -> Self {
    Self {
      source,
      cache,
      per_page: per_page.max(1),
      state: Mutex::new(ListState {
        pagination: PaginationState::default(),
        items: Vec::new(),
        desired: initial,
        displayed: None,
        loading: false,
      }),
      flights: Mutex::new(FlightTable::default()),
    }
  }

  /// Load the page for `key`, from the cache unless `force` is set.
  ///
  /// A page past the end is clamped to the last page once the page count is
  /// known. On error nothing visible changes.
  pub async fn load(&self, mut key: PageKey, mut force: bool) -> Result<LoadOutcome> {
    let mut reloads = 0;
    loop {
      let last_attempt = reloads == MAX_RELOADS;
      let (outcome, commit) = self.load_once(&key, force, last_attempt).await?;
      match commit {
        Commit::PastLastPage(last_page) => {
          debug!(key = %key, last_page, "Requested page is past the end, clamping");
          key = key.with_page(last_page);
        }
        Commit::Superseded => {
          // Whatever replaced the fetch is in the cache or in flight
          debug!(key = %key, "Fetch superseded, loading again");
          force = false;
        }
        Commit::Applied | Commit::Discarded => return Ok(outcome),
      }
      reloads += 1;
    }
  }

  async fn load_once(
    &self,
    key: &PageKey,
    force: bool,
    last_attempt: bool,
  ) -> Result<(LoadOutcome, Commit)> {
    lock(&self.state).desired = key.clone();

    if !force {
      if let Some(Some(entry)) = log_cache_error(self.cache.get(key), "read") {
        debug!(key = %key, "Page served from cache");
        let commit = self.commit(key, entry, last_attempt);
        return Ok((outcome(key, CacheSource::Cache, &commit), commit));
      }
    }

    let (id, fetch, waiter) = self.join_or_start(key, force);
    {
      let mut state = lock(&self.state);
      if state.desired == *key {
        state.loading = true;
      }
    }

    let result = fetch.await;

    let current = {
      let mut flights = lock(&self.flights);
      if flights.in_flight.get(key).is_some_and(|f| f.id == id) {
        flights.in_flight.remove(key);
      }
      let current = flights.is_current(key, id);
      if current && result.is_ok() {
        flights.accepted.insert(key.clone(), id);
      }
      current
    };
    drop(waiter);

    let page = match result {
      Ok(page) => page,
      Err(e) => {
        warn!(key = %key, error = %e, "Page fetch failed");
        self.abandon(key);
        return Err(e);
      }
    };

    if !current {
      debug!(key = %key, flight = id, "Dropping result of superseded fetch");
      let commit = self.supersede(key, last_attempt);
      return Ok((outcome(key, CacheSource::Network, &commit), commit));
    }

    let entry = CacheEntry::new(page.items, page.meta);
    log_cache_error(self.cache.put(key, &entry), "write");

    let commit = self.commit(key, entry, last_attempt);
    Ok((outcome(key, CacheSource::Network, &commit), commit))
  }

  /// Join the fetch in flight for `key`, or start a new one.
  fn join_or_start(&self, key: &PageKey, force: bool) -> (u64, SharedFetch<T>, Waiter<'_, T>) {
    let mut flights = lock(&self.flights);
    *flights.waiting.entry(key.clone()).or_default() += 1;
    let waiter = Waiter {
      flights: &self.flights,
      key: key.clone(),
    };

    if !force {
      if let Some(flight) = flights.in_flight.get(key) {
        debug!(key = %key, flight = flight.id, "Joining fetch in flight");
        return (flight.id, flight.fetch.clone(), waiter);
      }
    }

    let id = flights.next_id;
    flights.next_id += 1;

    let source = Arc::clone(&self.source);
    let request = PageRequest {
      page: key.page(),
      per_page: self.per_page,
      sort: key.sort(),
      exclude: key.exclude().iter().copied().collect(),
      filter: key.filter().map(str::to_string),
    };
    let cache_key = key.cache_key();
    let fetch = async move {
      source
        .fetch_page(&request)
        .await
        .map_err(|e| ListError::fetch(cache_key, &e))
    }
    .boxed()
    .shared();

    debug!(key = %key, flight = id, force, "Starting fetch");
    flights.in_flight.insert(
      key.clone(),
      Flight {
        id,
        fetch: fetch.clone(),
      },
    );
    (id, fetch, waiter)
  }

  /// Make `entry` the visible page if `key` is still wanted.
  fn commit(&self, key: &PageKey, entry: CacheEntry<T>, allow_past_end: bool) -> Commit {
    let mut state = lock(&self.state);

    if state.desired != *key {
      debug!(key = %key, wanted = %state.desired, "Discarding page no longer wanted");
      return Commit::Discarded;
    }

    let last_page = entry.meta.last_page.max(1);
    if key.page() > last_page && !allow_past_end {
      return Commit::PastLastPage(last_page);
    }

    state.pagination.set_total_pages(entry.meta.last_page);
    state.pagination.go_to_page(i64::from(key.page()));
    state.items = entry.data;
    state.displayed = Some(key.clone());
    state.loading = false;

    info!(
      entity = T::entity_type(),
      key = %key,
      items = state.items.len(),
      total_pages = entry.meta.last_page,
      "Showing page"
    );
    Commit::Applied
  }

  /// Decide what a load does when its fetch may no longer write back.
  fn supersede(&self, key: &PageKey, last_attempt: bool) -> Commit {
    let mut state = lock(&self.state);
    if state.desired != *key {
      Commit::Discarded
    } else if last_attempt {
      state.loading = false;
      Commit::Discarded
    } else {
      Commit::Superseded
    }
  }

  /// Forget a failed request so navigation continues from the visible page.
  fn abandon(&self, key: &PageKey) {
    let mut state = lock(&self.state);
    if state.desired == *key {
      state.loading = false;
      if let Some(displayed) = state.displayed.clone() {
        state.desired = displayed;
      }
    }
  }

  /// Query of the most recent request.
  pub fn desired(&self) -> PageKey {
    lock(&self.state).desired.clone()
  }

  /// Jump to a page, clamped against the known page count.
  pub async fn go_to_page(&self, target: i64) -> Result<LoadOutcome> {
    let key = {
      let state = lock(&self.state);
      state.desired.with_page(state.pagination.clamp(target))
    };
    self.load(key, false).await
  }

  /// Load the next page. `None` when already on the last page.
  pub async fn next_page(&self) -> Result<Option<LoadOutcome>> {
    let key = {
      let state = lock(&self.state);
      if !state.pagination.has_next_page() {
        return Ok(None);
      }
      state.desired.with_page(state.pagination.current_page() + 1)
    };
    self.load(key, false).await.map(Some)
  }

  /// Load the previous page. `None` when already on the first page.
  pub async fn prev_page(&self) -> Result<Option<LoadOutcome>> {
    let key = {
      let state = lock(&self.state);
      if !state.pagination.has_prev_page() {
        return Ok(None);
      }
      state.desired.with_page(state.pagination.current_page() - 1)
    };
    self.load(key, false).await.map(Some)
  }

  /// Reload the current page from the source.
  pub async fn refresh(&self) -> Result<LoadOutcome> {
    self.load(self.desired(), true).await
  }

  /// Drop every cached page, including whatever fetches still in flight
  /// would write back.
  pub fn invalidate_all(&self) {
    {
      let mut flights = lock(&self.flights);
      flights.floor = flights.next_id;
      flights.accepted.clear();
    }
    log_cache_error(self.cache.invalidate_all(), "invalidation");
  }

  /// Invalidate everything and reload after a mutation went through.
  pub async fn after_mutation<V>(&self, value: V) -> MutationOutcome<V> {
    self.invalidate_all();
    MutationOutcome {
      value,
      refresh: self.refresh().await,
    }
  }

  /// Hide item `id` right away, then run `remote`.
  ///
  /// If `remote` fails, the page is reloaded; if that reload fails too, the
  /// items as they were before are put back.
  pub async fn remove<F>(&self, id: u64, remote: F) -> Result<MutationOutcome<()>>
  where
    F: Future<Output = color_eyre::Result<()>>,
  {
    let (snapshot, displayed) = {
      let mut state = lock(&self.state);
      let snapshot = state.items.clone();
      state.items.retain(|item| item.id() != id);
      (snapshot, state.displayed.clone())
    };
    if let Some(key) = &displayed {
      log_cache_error(self.cache.remove_item(key, id), "update");
    }

    match remote.await {
      Ok(()) => {
        info!(entity = T::entity_type(), id, "Deleted");
        Ok(self.after_mutation(()).await)
      }
      Err(report) => {
        let error = ListError::mutation(T::entity_type(), MutationKind::Delete, Some(id), &report);
        warn!(error = %error, "Delete failed, reconciling with source");

        if let Some(key) = &displayed {
          log_cache_error(self.cache.invalidate(key), "invalidation");
        }
        if let Err(reload) = self.refresh().await {
          warn!(error = %reload, "Reload after failed delete failed, restoring list");
          let mut state = lock(&self.state);
          if state.displayed == displayed {
            state.items = snapshot;
          }
        }
        Err(error)
      }
    }
  }

  pub fn cache(&self) -> &PageCache<T, S> {
    &self.cache
  }

  pub fn pagination(&self) -> PaginationState {
    lock(&self.state).pagination
  }

  pub fn items(&self) -> Vec<T> {
    lock(&self.state).items.clone()
  }

  pub fn view(&self) -> PageView<T> {
    let state = lock(&self.state);
    let pagination = state.pagination;

    PageView {
      items: state.items.clone(),
      current_page: pagination.current_page(),
      total_pages: pagination.total_pages(),
      visible_pages: pagination.visible_pages(),
      has_next_page: pagination.has_next_page(),
      has_prev_page: pagination.has_prev_page(),
      sort: state.desired.sort(),
      loading: state.loading,
      offset: pagination.offset(self.per_page),
      displayed: state.displayed.clone(),
    }
  }
}

fn outcome(key: &PageKey, source: CacheSource, commit: &Commit) -> LoadOutcome {
  LoadOutcome {
    key: key.clone(),
    source,
    committed: matches!(commit, Commit::Applied),
  }
}
