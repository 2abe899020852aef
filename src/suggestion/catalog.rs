//! Local suggestion box backed by a JSON file.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use super::source::SuggestionSource;
use super::types::{NewSuggestion, Suggestion, SuggestionStatus};
use crate::cache::SortOrder;
use crate::music::youtube;
use crate::source::{FetchedPage, PageRequest, PageSource};
use crate::store::{slice_page, JsonStore};

/// Suggestion source over an in-memory list, optionally mirrored to a JSON
/// file. Same persistence rules as the music catalog.
pub struct SuggestionCatalog {
  suggestions: JsonStore<Suggestion>,
}

impl SuggestionCatalog {
  pub fn in_memory(suggestions: Vec<Suggestion>) -> Self {
    Self {
      suggestions: JsonStore::in_memory(suggestions),
    }
  }

  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      suggestions: JsonStore::open(path)?,
    })
  }

  pub fn count(&self) -> Result<usize> {
    Ok(self.suggestions.read()?.len())
  }
}

fn page_of(
  suggestions: &[Suggestion],
  request: &PageRequest,
  status: Option<SuggestionStatus>,
) -> FetchedPage<Suggestion> {
  let mut ranked: Vec<&Suggestion> = suggestions
    .iter()
    .filter(|s| status.map_or(true, |status| s.status == status))
    .filter(|s| !request.exclude.contains(&s.id))
    .collect();

  ranked.sort_by(|a, b| {
    let oldest_first = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
    match request.sort {
      SortOrder::Asc => oldest_first,
      SortOrder::Desc => oldest_first.reverse(),
    }
  });

  slice_page(ranked, request.page, request.per_page)
}

#[async_trait]
impl PageSource<Suggestion> for SuggestionCatalog {
  async fn fetch_page(&self, request: &PageRequest) -> Result<FetchedPage<Suggestion>> {
    let status = request
      .filter
      .as_deref()
      .map(str::parse::<SuggestionStatus>)
      .transpose()?;
    Ok(page_of(&self.suggestions.read()?, request, status))
  }
}

#[async_trait]
impl SuggestionSource for SuggestionCatalog {
  async fn submit(&self, suggestion: NewSuggestion) -> Result<Suggestion> {
    if !youtube::is_video_id(&suggestion.youtube_id) {
      return Err(eyre!("'{}' is not a video id", suggestion.youtube_id));
    }

    let created = self
      .suggestions
      .mutate(move |suggestions| {
        let waiting = suggestions.iter().any(|s| {
          s.status == SuggestionStatus::Pending && s.youtube_id == suggestion.youtube_id
        });
        if waiting {
          return Err(eyre!("Video {} is already waiting for review", suggestion.youtube_id));
        }

        let now = Utc::now();
        let created = Suggestion {
          id: suggestions.iter().map(|s| s.id).max().unwrap_or(0) + 1,
          title: suggestion.title,
          link: youtube::watch_url(&suggestion.youtube_id),
          youtube_id: suggestion.youtube_id,
          status: SuggestionStatus::Pending,
          reason: None,
          created_at: now,
          updated_at: now,
        };
        suggestions.push(created.clone());
        Ok(created)
      })
      .await?;

    info!(id = created.id, youtube_id = %created.youtube_id, "Suggestion received");
    Ok(created)
  }

  async fn set_status(
    &self,
    id: u64,
    status: SuggestionStatus,
    reason: Option<String>,
  ) -> Result<Suggestion> {
    let reviewed = self
      .suggestions
      .mutate(move |suggestions| {
        let suggestion = suggestions
          .iter_mut()
          .find(|s| s.id == id)
          .ok_or_else(|| eyre!("Suggestion {} not found", id))?;

        suggestion.status = suggestion.status.transition(status)?;
        suggestion.reason = match status {
          SuggestionStatus::Rejected => reason.filter(|r| !r.trim().is_empty()),
          _ => None,
        };
        suggestion.updated_at = Utc::now();
        Ok(suggestion.clone())
      })
      .await?;

    info!(id, status = %reviewed.status, "Suggestion reviewed");
    Ok(reviewed)
  }

  async fn delete(&self, id: u64) -> Result<()> {
    self
      .suggestions
      .mutate(|suggestions| {
        let before = suggestions.len();
        suggestions.retain(|s| s.id != id);
        if suggestions.len() == before {
          return Err(eyre!("Suggestion {} not found", id));
        }
        Ok(())
      })
      .await?;

    info!(id, "Deleted suggestion");
    Ok(())
  }
}
