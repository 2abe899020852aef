use async_trait::async_trait;
use color_eyre::Result;

use super::types::{Music, MusicUpdate, NewMusic};
use crate::source::PageSource;

/// Where music pages come from and where mutations go.
///
/// Implementations may talk to a REST backend, a database or a local file;
/// the list controller only relies on the calls succeeding or failing.
/// Pages are ranked by plays.
#[async_trait]
pub trait MusicSource: PageSource<Music> {
  /// Add a music video, returning it with its assigned id.
  async fn create(&self, music: NewMusic) -> Result<Music>;

  /// Apply a partial update, returning the updated music.
  async fn update(&self, id: u64, changes: MusicUpdate) -> Result<Music>;

  /// Remove a music video.
  async fn delete(&self, id: u64) -> Result<()>;
}
