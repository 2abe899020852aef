//! Cache keys for paged music queries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use color_eyre::eyre::{eyre, Report};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::traits::QueryKey;

/// Ordering of a listing by play count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  /// Least played first
  Asc,
  /// Most played first
  #[default]
  Desc,
}

impl SortOrder {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Asc => "asc",
      Self::Desc => "desc",
    }
  }
}

impl fmt::Display for SortOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOrder {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "asc" => Ok(Self::Asc),
      "desc" => Ok(Self::Desc),
      other => Err(eyre!("Unknown sort order '{}', expected asc or desc", other)),
    }
  }
}

/// Identifies one page of a listing: page number, sort order, the set of ids
/// excluded from the results and an optional filter (a suggestion status, for
/// instance).
///
/// The exclusion ids are held as a set, so the caller's ordering never leaks
/// into the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
  page: u32,
  sort: SortOrder,
  exclude: BTreeSet<u64>,
  filter: Option<String>,
}

impl PageKey {
  pub fn new(page: u32, sort: SortOrder, exclude: impl IntoIterator<Item = u64>) -> Self {
    Self {
      page,
      sort,
      exclude: exclude.into_iter().collect(),
      filter: None,
    }
  }

  /// Same query restricted by `filter`.
  pub fn filtered(mut self, filter: Option<String>) -> Self {
    self.filter = filter;
    self
  }

  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn sort(&self) -> SortOrder {
    self.sort
  }

  pub fn exclude(&self) -> &BTreeSet<u64> {
    &self.exclude
  }

  pub fn filter(&self) -> Option<&str> {
    self.filter.as_deref()
  }

  /// Same query on another page.
  pub fn with_page(&self, page: u32) -> Self {
    Self {
      page,
      ..self.clone()
    }
  }
}

impl QueryKey for PageKey {
  fn cache_key(&self) -> String {
    let exclude = self
      .exclude
      .iter()
      .map(u64::to_string)
      .collect::<Vec<_>>()
      .join(",");
    let key = format!("page={}:sort={}:exclude={}", self.page, self.sort, exclude);
    match &self.filter {
      Some(filter) => format!("{}:filter={}", key, filter),
      None => key,
    }
  }

  fn cache_hash(&self) -> String {
    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(self.cache_key().as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    let mut details = vec![self.sort.to_string()];
    if !self.exclude.is_empty() {
      details.push(format!("{} excluded", self.exclude.len()));
    }
    if let Some(filter) = &self.filter {
      details.push(filter.clone());
    }
    format!("page {} ({})", self.page, details.join(", "))
  }
}

impl fmt::Display for PageKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.cache_key())
  }
}

/// Canonical cache key for a page request.
pub fn key(page: u32, sort: SortOrder, exclude_ids: &[u64]) -> String {
  PageKey::new(page, sort, exclude_ids.iter().copied()).cache_key()
}
