//! Error types for the harvester library.
//!
//! The variants follow how far a failure is allowed to reach:
//! - [`HarvestError::Configuration`] and [`HarvestError::Filesystem`] abort a run before any
//!   request is made
//! - [`HarvestError::Fetch`] halts pagination but keeps every record accepted so far
//! - [`HarvestError::Download`] only ever affects a single record
//!
//! The remaining variants wrap lower-level failures and are usually seen as the `source` of
//! one of the above.
//!
//! # Examples
//!
//! ```
//! use harvester::error::HarvestError;
//!
//! let err = HarvestError::MalformedPage("unexpected end of feed".into());
//! assert!(err.is_transient());
//!
//! let err = HarvestError::Configuration("batch_size must be positive".into());
//! assert!(!err.is_transient());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Error type alias used for the [`harvester`](crate) crate.
pub type Result<T> = core::result::Result<T, HarvestError>;

/// Errors that can occur while harvesting papers.
#[derive(Error, Debug)]
pub enum HarvestError {
  /// The configuration is invalid or contradictory.
  ///
  /// This occurs when:
  /// - Neither keywords nor categories are given
  /// - Both `total_to_fetch` and `fetch_all` are set (or neither is)
  /// - A count such as `batch_size` is zero
  /// - The date range ends before it starts
  /// - The configuration file cannot be read
  #[error("Invalid configuration: {0}")]
  Configuration(String),

  /// A page could not be fetched even after retrying.
  ///
  /// Records accepted from earlier pages are kept; the run stops paginating.
  #[error("Page fetch at offset {offset} failed after {attempts} attempt(s): {source}")]
  Fetch {
    /// Offset of the page that failed
    offset:   usize,
    /// Number of attempts made, including the first
    attempts: u32,
    /// The error returned by the last attempt
    #[source]
    source:   Box<HarvestError>,
  },

  /// Downloading the PDF for one record failed.
  #[error("PDF download for {identifier} failed: {reason}")]
  Download {
    /// Identifier of the record whose PDF could not be stored
    identifier: String,
    /// Human-readable cause
    reason:     String,
  },

  /// An output location cannot be created or written.
  #[error("Cannot use {}: {source}", path.display())]
  Filesystem {
    /// The path that could not be used
    path:   PathBuf,
    /// The underlying IO failure
    #[source]
    source: std::io::Error,
  },

  /// A network request failed.
  ///
  /// This can occur when:
  /// - The server is unreachable or the request times out
  /// - The server answers with an error status
  /// - TLS errors occur
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A response body could not be parsed as an Atom feed.
  #[error("Malformed page response: {0}")]
  MalformedPage(String),

  /// The API answered with an error entry instead of results.
  #[error("API error: {0}")]
  ApiError(String),

  /// Failed to parse a URL.
  #[error(transparent)]
  InvalidUrl(#[from] url::ParseError),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// JSON (de)serialization failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// YAML deserialization failed.
  #[error(transparent)]
  Yaml(#[from] serde_yaml_ng::Error),
}

impl HarvestError {
  /// Whether retrying the same request might succeed.
  ///
  /// Connection problems, timeouts, `5xx` and `429` responses, and unparseable or error pages
  /// are transient. Other client errors (`4xx`), invalid URLs, and configuration problems are
  /// not.
  pub fn is_transient(&self) -> bool {
    match self {
      HarvestError::Network(e) => match e.status() {
        Some(status) =>
          status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
        None => !(e.is_builder() || e.is_redirect()),
      },
      HarvestError::MalformedPage(_) | HarvestError::ApiError(_) | HarvestError::Io(_) => true,
      _ => false,
    }
  }
}
