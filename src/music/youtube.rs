//! YouTube link parsing.
//!
//! Accepted forms, with or without scheme and `www.`:
//! `youtube.com/watch?v=<id>`, `youtube.com/embed/<id>` and `youtu.be/<id>`.
//! Video ids are 11 characters of `[A-Za-z0-9_-]`.

use thiserror::Error;
use url::Url;

use crate::error::ListError;

const VIDEO_ID_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YoutubeUrlError {
  #[error("not a URL")]
  Malformed,
  #[error("unsupported scheme {0}")]
  Scheme(String),
  #[error("not a YouTube address")]
  Host,
  #[error("no video id")]
  MissingId,
  #[error("'{0}' is not a video id")]
  InvalidId(String),
}

impl YoutubeUrlError {
  pub(crate) fn for_url(self, url: &str) -> ListError {
    ListError::InvalidUrl {
      url: url.to_string(),
      reason: self.to_string(),
    }
  }
}

/// Extract the video id from a YouTube link.
pub fn video_id(link: &str) -> Result<String, YoutubeUrlError> {
  let link = link.trim();
  if link.is_empty() || link.contains(char::is_whitespace) {
    return Err(YoutubeUrlError::Malformed);
  }

  let url = if link.contains("://") {
    Url::parse(link)
  } else {
    Url::parse(&format!("https://{}", link))
  }
  .map_err(|_| YoutubeUrlError::Malformed)?;

  if !matches!(url.scheme(), "http" | "https") {
    return Err(YoutubeUrlError::Scheme(url.scheme().to_string()));
  }

  let host = url.host_str().ok_or(YoutubeUrlError::Host)?;
  let host = host.strip_prefix("www.").unwrap_or(host);
  let mut segments = url.path_segments().into_iter().flatten();

  let id = match host {
    "youtu.be" => segments.next().map(str::to_string),
    "youtube.com" => match segments.next() {
      Some("watch") => url
        .query_pairs()
        .find(|(name, _)| name == "v")
        .map(|(_, value)| value.into_owned()),
      Some("embed") => segments.next().map(str::to_string),
      _ => None,
    },
    _ => return Err(YoutubeUrlError::Host),
  };

  match id {
    None => Err(YoutubeUrlError::MissingId),
    Some(id) if id.is_empty() => Err(YoutubeUrlError::MissingId),
    Some(id) if is_video_id(&id) => Ok(id),
    Some(id) => Err(YoutubeUrlError::InvalidId(id)),
  }
}

pub fn is_video_id(id: &str) -> bool {
  id.len() == VIDEO_ID_LEN
    && id
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Canonical watch link for a video id.
pub fn watch_url(id: &str) -> String {
  format!("https://www.youtube.com/watch?v={}", id)
}
