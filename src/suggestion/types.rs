use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;
use crate::music::youtube::{self, YoutubeUrlError};

/// Review state of a suggestion.
///
/// Every suggestion starts out pending and is reviewed once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl SuggestionStatus {
  pub const ALL: [SuggestionStatus; 3] = [Self::Pending, Self::Approved, Self::Rejected];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }

  /// Move to `next`, failing unless this is a review of a pending suggestion.
  pub fn transition(self, next: SuggestionStatus) -> Result<SuggestionStatus> {
    match (self, next) {
      (Self::Pending, Self::Approved | Self::Rejected) => Ok(next),
      (Self::Pending, Self::Pending) => Err(eyre!("Suggestion is already pending")),
      (current, _) => Err(eyre!("Suggestion was already {}", current)),
    }
  }
}

impl fmt::Display for SuggestionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SuggestionStatus {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| eyre!("Unknown suggestion status '{}'", s))
  }
}

/// A video a listener asked to have added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
  pub id: u64,
  #[serde(default)]
  pub title: Option<String>,
  pub youtube_id: String,
  pub link: String,
  #[serde(default)]
  pub status: SuggestionStatus,
  /// Why the suggestion was turned down
  #[serde(default)]
  pub reason: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Payload for submitting a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSuggestion {
  pub youtube_id: String,
  pub title: Option<String>,
}

impl NewSuggestion {
  pub fn from_youtube_url(url: &str, title: Option<String>) -> Result<Self, YoutubeUrlError> {
    Ok(Self {
      youtube_id: youtube::video_id(url)?,
      title,
    })
  }
}

impl Cacheable for Suggestion {
  fn id(&self) -> u64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "suggestion"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_review_transitions() {
    use SuggestionStatus::*;

    assert_eq!(Pending.transition(Approved).unwrap(), Approved);
    assert_eq!(Pending.transition(Rejected).unwrap(), Rejected);
    assert!(Pending.transition(Pending).is_err());

    let err = Approved.transition(Rejected).unwrap_err();
    assert_eq!(err.to_string(), "Suggestion was already approved");
    assert!(Rejected.transition(Approved).is_err());
  }

  #[test]
  fn test_status_parsing() {
    assert_eq!("Approved".parse::<SuggestionStatus>().unwrap(), SuggestionStatus::Approved);
    assert_eq!(" rejected ".parse::<SuggestionStatus>().unwrap(), SuggestionStatus::Rejected);
    assert!("maybe".parse::<SuggestionStatus>().is_err());
  }

  #[test]
  fn test_status_defaults_to_pending_when_missing() {
    let suggestion: Suggestion = serde_json::from_str(
      r#"{
        "id": 1,
        "youtube_id": "dQw4w9WgXcQ",
        "link": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
      }"#,
    )
    .unwrap();
    assert_eq!(suggestion.status, SuggestionStatus::Pending);
    assert!(suggestion.reason.is_none());
  }
}
