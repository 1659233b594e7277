//! Error types for the harvester command line application.
//!
//! The CLI adds only a few failure modes of its own on top of the library:
//! - Harvest failures, from configuration problems to a halted fetch
//! - File system operations such as creating the log directory
//! - Log file initialization
//!
//! All variants are transparent so the user sees the underlying message unchanged.

use thiserror::Error;

/// Errors that can occur during CLI operations.
///
/// # Examples
///
/// ```ignore
/// use harvester::config::HarvestConfig;
///
/// # fn example() -> Result<(), HarvesterCliError> {
/// // Invalid or unreadable configuration files surface as harvest errors
/// let config = HarvestConfig::load("harvester.yaml")?;
///
/// // Directory creation may result in IO errors
/// std::fs::create_dir_all(&config.pdf_dir)?;
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum HarvesterCliError {
  /// Errors from the underlying harvester library
  #[error(transparent)]
  Harvest(#[from] harvester::error::HarvestError),

  /// File system and IO operation errors
  #[error(transparent)]
  IO(#[from] std::io::Error),

  /// The log file could not be set up
  #[error(transparent)]
  LogInit(#[from] tracing_appender::rolling::InitError),
}
