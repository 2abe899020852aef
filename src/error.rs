//! Error types for the list core.

use std::fmt;

use color_eyre::Report;
use thiserror::Error;

/// Remote operation that mutates the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Create => "create",
      Self::Update => "update",
      Self::Delete => "delete",
    };
    f.write_str(name)
  }
}

/// Errors surfaced by the cache and the list controller.
///
/// Cloneable so that a single in-flight fetch can hand the same outcome to
/// every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListError {
  /// The data source failed while loading a page.
  #[error("Failed to fetch {key}: {message}")]
  Fetch { key: String, message: String },

  /// A create/update/delete call failed.
  #[error("Failed to {operation} {entity}{}: {message}", id_suffix(.id))]
  Mutation {
    entity: &'static str,
    operation: MutationKind,
    id: Option<u64>,
    message: String,
  },

  /// A YouTube link could not be turned into a video id.
  #[error("Invalid YouTube URL '{url}': {reason}")]
  InvalidUrl { url: String, reason: String },

  /// The cache backend failed.
  #[error("Cache storage error: {0}")]
  Storage(String),
}

impl ListError {
  pub(crate) fn fetch(key: impl Into<String>, report: &Report) -> Self {
    Self::Fetch {
      key: key.into(),
      message: format!("{:#}", report),
    }
  }

  pub(crate) fn mutation(
    entity: &'static str,
    operation: MutationKind,
    id: Option<u64>,
    report: &Report,
  ) -> Self {
    Self::Mutation {
      entity,
      operation,
      id,
      message: format!("{:#}", report),
    }
  }
}

fn id_suffix(id: &Option<u64>) -> String {
  id.map(|id| format!(" {}", id)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ListError>;
