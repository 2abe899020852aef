//! Listener suggestions and their review workflow.

mod catalog;
mod source;
mod types;

pub use catalog::SuggestionCatalog;
pub use source::SuggestionSource;
pub use types::{NewSuggestion, Suggestion, SuggestionStatus};
