//! Paged list controllers.
//!
//! [`PagedList`] holds what every listing shares: cache-first loads with one
//! fetch per key in flight, the check that a page is still wanted before it
//! is shown, invalidation and optimistic removal. The music ranking and the
//! suggestion review list are thin layers over it.

mod music;
mod paged;
mod suggestions;

pub use music::{ListView, MusicListController, RankedMusic};
pub use paged::{LoadOutcome, MutationOutcome, PageView, PagedList};
pub use suggestions::SuggestionListController;
