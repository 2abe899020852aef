//! Music catalog types and data sources.

mod catalog;
mod source;
mod types;
pub mod youtube;

pub use catalog::CatalogSource;
pub use source::MusicSource;
pub use types::{Music, MusicUpdate, NewMusic};
