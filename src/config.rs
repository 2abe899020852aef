use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::SortOrder;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// JSON catalog used by the command line front-end
  pub catalog: Option<PathBuf>,
  /// JSON file holding listener suggestions (defaults next to the catalog)
  pub suggestions: Option<PathBuf>,
  #[serde(default)]
  pub listing: ListingConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
  /// Items per page of the general list
  pub per_page: u32,
  /// Size of the highlighted most-played list
  pub top_count: u32,
  pub default_sort: SortOrder,
  /// Items per page of the suggestion list
  pub suggestions_per_page: u32,
}

impl Default for ListingConfig {
  fn default() -> Self {
    Self {
      per_page: 5,
      top_count: 5,
      default_sort: SortOrder::Desc,
      suggestions_per_page: 10,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Pages kept for the lifetime of the process
  #[default]
  Memory,
  /// Pages kept in a SQLite database between runs
  Sqlite,
  /// Caching disabled
  None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// Pages older than this are refetched; unset means no expiry
  pub stale_after_minutes: Option<i64>,
  /// Database file for the sqlite backend (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl CacheConfig {
  pub fn stale_time(&self) -> Option<chrono::Duration> {
    self.stale_after_minutes.map(chrono::Duration::minutes)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter used when TIAO_LOG is not set
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "warn".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tiao.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tiao/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("tiao.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tiao").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.listing.per_page == 0 {
      return Err(eyre!("listing.per_page must be at least 1"));
    }
    if config.listing.suggestions_per_page == 0 {
      return Err(eyre!("listing.suggestions_per_page must be at least 1"));
    }
    if config.cache.stale_after_minutes.is_some_and(|m| m <= 0) {
      return Err(eyre!("cache.stale_after_minutes must be positive"));
    }

    Ok(config)
  }

  /// Catalog path, preferring TIAO_CATALOG over the config file.
  pub fn catalog_path(&self) -> Option<PathBuf> {
    std::env::var_os("TIAO_CATALOG")
      .map(PathBuf::from)
      .or_else(|| self.catalog.clone())
  }

  /// Suggestions path: TIAO_SUGGESTIONS, then the config file, then
  /// `suggestions.json` beside `catalog`.
  pub fn suggestions_path(&self, catalog: &Path) -> PathBuf {
    std::env::var_os("TIAO_SUGGESTIONS")
      .map(PathBuf::from)
      .or_else(|| self.suggestions.clone())
      .unwrap_or_else(|| catalog.with_file_name("suggestions.json"))
  }
}
