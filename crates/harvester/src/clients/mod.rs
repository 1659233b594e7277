//! Collaborators that talk to the outside world.
//!
//! The pipeline only depends on two small traits:
//! - [`PageFetcher`] returns one page of search results at a given offset
//! - [`PdfSource`] returns the PDF bytes for a record
//!
//! [`ArxivClient`] implements both against arXiv's Atom API. Tests substitute in-memory
//! implementations.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use harvester::{
//!   clients::{arxiv::DEFAULT_API_URL, ArxivClient, PageFetcher},
//!   criteria::SearchCriteria,
//!   query::build_query,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArxivClient::new(DEFAULT_API_URL, Duration::from_secs(30))?;
//! let criteria = SearchCriteria { keywords: vec!["diffusion".into()], ..Default::default() };
//! let page = client.fetch_page(&build_query(&criteria)?, 0, 50).await?;
//! println!("first page holds {} records", page.len());
//! # Ok(())
//! # }
//! ```

use quick_xml::de::from_str;

pub mod arxiv;

pub use arxiv::ArxivClient;

use super::*;

/// Source of paged search results.
#[async_trait]
pub trait PageFetcher: Send + Sync {
  /// Fetches up to `batch_size` records starting at `offset` in the server's result order.
  ///
  /// An empty page means the result set is exhausted.
  async fn fetch_page(
    &self,
    query: &SearchQuery,
    offset: usize,
    batch_size: usize,
  ) -> Result<Vec<PaperRecord>>;
}

/// Source of PDF content.
#[async_trait]
pub trait PdfSource: Send + Sync {
  /// Fetches the PDF bytes for `record`.
  async fn fetch_pdf(&self, record: &PaperRecord) -> Result<Vec<u8>>;
}
