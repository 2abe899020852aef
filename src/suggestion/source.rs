use async_trait::async_trait;
use color_eyre::Result;

use super::types::{NewSuggestion, Suggestion, SuggestionStatus};
use crate::source::PageSource;

/// Where suggestion pages come from and where reviews go.
///
/// A page request's `filter`, when set, is a status name; only suggestions
/// in that status are returned. Pages are ordered by submission time.
#[async_trait]
pub trait SuggestionSource: PageSource<Suggestion> {
  /// Record a new pending suggestion.
  async fn submit(&self, suggestion: NewSuggestion) -> Result<Suggestion>;

  /// Review a pending suggestion. `reason` is kept for rejections.
  async fn set_status(
    &self,
    id: u64,
    status: SuggestionStatus,
    reason: Option<String>,
  ) -> Result<Suggestion>;

  async fn delete(&self, id: u64) -> Result<()>;
}
