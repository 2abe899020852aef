use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::youtube::{self, YoutubeUrlError};
use crate::cache::Cacheable;

/// A music video in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Music {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub youtube_id: Option<String>,
  #[serde(default)]
  pub link: Option<String>,
  /// View count, used for ranking
  #[serde(default)]
  pub plays: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Payload for adding a music video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMusic {
  pub title: String,
  pub youtube_id: Option<String>,
  pub link: Option<String>,
  pub plays: u64,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicUpdate {
  pub title: Option<String>,
  pub youtube_id: Option<String>,
  pub link: Option<String>,
  pub plays: Option<u64>,
}

impl NewMusic {
  /// Music for the video behind a YouTube link, linked by its watch URL.
  pub fn from_youtube_url(title: impl Into<String>, url: &str) -> Result<Self, YoutubeUrlError> {
    let youtube_id = youtube::video_id(url)?;
    Ok(Self {
      title: title.into(),
      link: Some(youtube::watch_url(&youtube_id)),
      youtube_id: Some(youtube_id),
      plays: 0,
    })
  }
}

impl MusicUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.youtube_id.is_none()
      && self.link.is_none()
      && self.plays.is_none()
  }
}

impl Cacheable for Music {
  fn id(&self) -> u64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "music"
  }
}
