//! Core of the Clube do Tião music ranking: page navigation, a page cache
//! keyed by (page, sort order, exclusion set) and a list controller that
//! loads pages cache-first from a pluggable music source, plus the review
//! list for listener suggestions.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod music;
pub mod pagination;
pub mod source;
mod store;
pub mod suggestion;

pub use controller::{
  ListView, LoadOutcome, MusicListController, MutationOutcome, PageView, RankedMusic,
  SuggestionListController,
};
pub use error::{ListError, MutationKind};
pub use pagination::PaginationState;
