//! A library for discovering and downloading papers from the arXiv search API.
//!
//! `harvester` turns a topical search (keywords and arXiv categories) into a paged walk over
//! arXiv's Atom feed, keeps the entries whose last-updated date and title match the configured
//! filters, appends their metadata to a JSONL file, and downloads each paper's PDF once.
//!
//! # Example
//! ```rust,no_run
//! use harvester::{config::HarvestConfig, harvest::Harvester};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let config = HarvestConfig::load("harvester.yaml")?;
//!   let plan = config.plan()?;
//!   let mut sink = plan.targets.prepare(plan.download_pdfs)?;
//!   let client = config.client()?;
//!
//!   let summary = Harvester::new(plan).run(&client, &client, &mut sink).await?;
//!   println!("accepted {} papers", summary.records_accepted);
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`criteria`]: what to look for (keywords, categories, date window, title expressions)
//! - [`query`]: the remote search query built from the criteria
//! - [`filter`]: post-fetch predicates applied to every returned record
//! - [`controller`]: the pagination loop and its stopping policy
//! - [`download`]: PDF deduplication and atomic writes
//! - [`sink`]: metadata persistence
//! - [`harvest`]: the pipeline tying everything together
//! - [`clients`]: the collaborator traits and the arXiv implementation
//! - [`config`]: configuration files and their validation
//! - [`retry`]: bounded retries with backoff for page requests

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::BTreeSet,
  path::{Path, PathBuf},
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)] use {tempfile::tempdir, tracing_test::traced_test};

pub mod clients;
pub mod config;
pub mod controller;
pub mod criteria;
pub mod download;
pub mod error;
pub mod filter;
pub mod format;
pub mod harvest;
pub mod paper;
pub mod query;
pub mod retry;
pub mod sink;
#[cfg(test)] mod tests;

use clients::{PageFetcher, PdfSource};
use criteria::{DateRange, MatchPolicy, SearchCriteria};
use error::{HarvestError, Result};
use filter::ResultFilter;
use paper::PaperRecord;
use query::SearchQuery;
use retry::RetryPolicy;

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use harvester::prelude::*;
/// ```
pub mod prelude {
  pub use crate::{
    clients::{PageFetcher, PdfSource},
    error::{HarvestError, Result},
    sink::MetadataSink,
  };
}
