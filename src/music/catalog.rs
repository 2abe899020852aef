//! Local catalog of music videos backed by a JSON file.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use super::source::MusicSource;
use super::types::{Music, MusicUpdate, NewMusic};
use crate::cache::SortOrder;
use crate::source::{FetchedPage, PageRequest, PageSource};
use crate::store::{slice_page, JsonStore};

/// Music source over an in-memory list, optionally mirrored to a JSON file.
///
/// The file holds a plain array of music objects and is rewritten after
/// every successful mutation. A mutation whose write fails is not applied.
pub struct CatalogSource {
  musics: JsonStore<Music>,
}

impl CatalogSource {
  /// Catalog that lives only in memory.
  pub fn in_memory(musics: Vec<Music>) -> Self {
    Self {
      musics: JsonStore::in_memory(musics),
    }
  }

  /// Load the catalog from `path`. A missing file yields an empty catalog
  /// that will be created on the first mutation.
  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      musics: JsonStore::open(path)?,
    })
  }

  pub fn count(&self) -> Result<usize> {
    Ok(self.musics.read()?.len())
  }
}

/// Rank, filter and slice `musics` the way the backend pages them.
fn page_of(musics: &[Music], request: &PageRequest) -> FetchedPage<Music> {
  let mut ranked: Vec<&Music> = musics
    .iter()
    .filter(|m| request.exclude.binary_search(&m.id).is_err())
    .collect();

  ranked.sort_by(|a, b| {
    let by_plays = match request.sort {
      SortOrder::Asc => a.plays.cmp(&b.plays),
      SortOrder::Desc => b.plays.cmp(&a.plays),
    };
    by_plays.then(a.id.cmp(&b.id))
  });

  slice_page(ranked, request.page, request.per_page)
}

#[async_trait]
impl PageSource<Music> for CatalogSource {
  async fn fetch_page(&self, request: &PageRequest) -> Result<FetchedPage<Music>> {
    let mut request = request.clone();
    request.exclude.sort_unstable();
    Ok(page_of(&self.musics.read()?, &request))
  }
}

#[async_trait]
impl MusicSource for CatalogSource {
  async fn create(&self, music: NewMusic) -> Result<Music> {
    if music.title.trim().is_empty() {
      return Err(eyre!("Music title must not be empty"));
    }

    let created = self
      .musics
      .mutate(move |musics| {
        if let Some(youtube_id) = &music.youtube_id {
          if musics
            .iter()
            .any(|m| m.youtube_id.as_ref() == Some(youtube_id))
          {
            return Err(eyre!("Video {} is already in the catalog", youtube_id));
          }
        }

        let now = Utc::now();
        let created = Music {
          id: musics.iter().map(|m| m.id).max().unwrap_or(0) + 1,
          title: music.title,
          youtube_id: music.youtube_id,
          link: music.link,
          plays: music.plays,
          created_at: now,
          updated_at: now,
        };
        musics.push(created.clone());
        Ok(created)
      })
      .await?;

    info!(id = created.id, title = %created.title, "Added music");
    Ok(created)
  }

  async fn update(&self, id: u64, changes: MusicUpdate) -> Result<Music> {
    let updated = self
      .musics
      .mutate(move |musics| {
        let music = musics
          .iter_mut()
          .find(|m| m.id == id)
          .ok_or_else(|| eyre!("Music {} not found", id))?;

        if let Some(title) = changes.title {
          music.title = title;
        }
        if let Some(youtube_id) = changes.youtube_id {
          music.youtube_id = Some(youtube_id);
        }
        if let Some(link) = changes.link {
          music.link = Some(link);
        }
        if let Some(plays) = changes.plays {
          music.plays = plays;
        }
        music.updated_at = Utc::now();
        Ok(music.clone())
      })
      .await?;

    info!(id, "Updated music");
    Ok(updated)
  }

  async fn delete(&self, id: u64) -> Result<()> {
    self
      .musics
      .mutate(|musics| {
        let before = musics.len();
        musics.retain(|m| m.id != id);
        if musics.len() == before {
          return Err(eyre!("Music {} not found", id));
        }
        Ok(())
      })
      .await?;

    info!(id, "Deleted music");
    Ok(())
  }
}
