use std::sync::Arc;

use tracing::info;

use super::paged::{LoadOutcome, MutationOutcome, PageView, PagedList};
use crate::cache::{PageCache, PageKey, PageStorage, SortOrder};
use crate::error::{ListError, MutationKind, Result};
use crate::pagination::PaginationState;
use crate::source::PageSource;
use crate::suggestion::{NewSuggestion, Suggestion, SuggestionSource, SuggestionStatus};

fn key(page: u32, status: Option<SuggestionStatus>) -> PageKey {
  PageKey::new(page.max(1), SortOrder::Desc, [])
    .filtered(status.map(|status| status.as_str().to_string()))
}

/// Controller for the suggestion review list, newest first, optionally
/// narrowed to one status.
pub struct SuggestionListController<S> {
  source: Arc<dyn SuggestionSource>,
  pages: PagedList<Suggestion, S>,
}

impl<S: PageStorage<Suggestion>> SuggestionListController<S> {
  pub fn new<G: SuggestionSource + 'static>(
    source: Arc<G>,
    cache: PageCache<Suggestion, S>,
    per_page: u32,
  ) -> Self {
    let pages = PagedList::new(
      Arc::clone(&source) as Arc<dyn PageSource<Suggestion>>,
      cache,
      per_page,
      key(1, None),
    );
    Self { source, pages }
  }

  /// Load a page of suggestions in `status`, or of all of them.
  pub async fn load(
    &self,
    page: u32,
    status: Option<SuggestionStatus>,
    force: bool,
  ) -> Result<LoadOutcome> {
    self.pages.load(key(page, status), force).await
  }

  /// Show only suggestions in `status` (all with `None`), from page 1.
  pub async fn set_status_filter(&self, status: Option<SuggestionStatus>) -> Result<LoadOutcome> {
    self.load(1, status, false).await
  }

  pub fn status_filter(&self) -> Option<SuggestionStatus> {
    self
      .pages
      .desired()
      .filter()
      .and_then(|name| name.parse().ok())
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

  pub async fn refresh(&self) -> Result<LoadOutcome> {
    self.pages.refresh().await
  }

  /// Submit the video behind `url` for review.
  pub async fn submit(
    &self,
    url: &str,
    title: Option<String>,
  ) -> Result<MutationOutcome<Suggestion>> {
    let suggestion = NewSuggestion::from_youtube_url(url, title).map_err(|e| e.for_url(url))?;
    let created = self
      .source
      .submit(suggestion)
      .await
      .map_err(|e| ListError::mutation("suggestion", MutationKind::Create, None, &e))?;

    info!(id = created.id, "Suggestion submitted");
    Ok(self.pages.after_mutation(created).await)
  }

  pub async fn approve(&self, id: u64) -> Result<MutationOutcome<Suggestion>> {
    self.review(id, SuggestionStatus::Approved, None).await
  }

  /// Turn a suggestion down, optionally saying why.
  pub async fn reject(
    &self,
    id: u64,
    reason: Option<String>,
  ) -> Result<MutationOutcome<Suggestion>> {
    self.review(id, SuggestionStatus::Rejected, reason).await
  }

  async fn review(
    &self,
    id: u64,
    status: SuggestionStatus,
    reason: Option<String>,
  ) -> Result<MutationOutcome<Suggestion>> {
    let reviewed = self
      .source
      .set_status(id, status, reason)
      .await
      .map_err(|e| ListError::mutation("suggestion", MutationKind::Update, Some(id), &e))?;

    info!(id, status = %status, "Suggestion reviewed");
    Ok(self.pages.after_mutation(reviewed).await)
  }

  /// Delete a suggestion, hiding it before the source confirms.
  pub async fn delete(&self, id: u64) -> Result<MutationOutcome<()>> {
    self.pages.remove(id, self.source.delete(id)).await
  }

  pub fn pagination(&self) -> PaginationState {
    self.pages.pagination()
  }

  pub fn items(&self) -> Vec<Suggestion> {
    self.pages.items()
  }

  pub fn view(&self) -> PageView<Suggestion> {
    self.pages.view()
  }
}
