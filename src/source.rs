//! Page fetching shared by every paged listing.

use async_trait::async_trait;
use color_eyre::Result;

use crate::cache::{PageMeta, SortOrder};

/// Parameters for fetching one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
  pub page: u32,
  pub per_page: u32,
  pub sort: SortOrder,
  /// Ids to leave out of the results, ascending
  pub exclude: Vec<u64>,
  /// Source specific restriction, e.g. a suggestion status
  pub filter: Option<String>,
}

/// One page of results plus paging metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage<T> {
  pub items: Vec<T>,
  pub meta: PageMeta,
}

/// Anything that serves pages of `T`.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
  async fn fetch_page(&self, request: &PageRequest) -> Result<FetchedPage<T>>;
}
