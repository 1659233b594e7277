//! Client implementation for searching arXiv.org and downloading its PDFs.
//!
//! The client pages through arXiv's Atom feed API (`http://export.arxiv.org/api/query`)
//! using the `start` and `max_results` parameters and converts every feed entry into a
//! [`PaperRecord`].
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use harvester::clients::{
//!   arxiv::{SortBy, SortOrder, DEFAULT_API_URL},
//!   ArxivClient,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArxivClient::new(DEFAULT_API_URL, Duration::from_secs(30))?
//!   .with_sort(SortBy::LastUpdatedDate, SortOrder::Descending);
//! # Ok(())
//! # }
//! ```

use url::Url;

use super::*;

/// The public arXiv query endpoint.
pub const DEFAULT_API_URL: &str = "https://export.arxiv.org/api/query";

/// User agent sent with every request; arXiv asks API clients to identify themselves.
const USER_AGENT: &str =
  concat!("harvester/", env!("CARGO_PKG_VERSION"), " (+https://github.com/autoparallel/learner)");

/// Internal representation of the arXiv API's Atom feed response.
#[derive(Debug, Deserialize)]
struct Feed {
  /// Result entries; absent entirely once the result set is exhausted
  #[serde(rename = "entry", default)]
  entries: Vec<Entry>,
}

/// Internal representation of a paper entry from arXiv's API response.
#[derive(Debug, Deserialize)]
struct Entry {
  /// Abstract page URL (e.g., "http://arxiv.org/abs/2301.07041v1")
  id:         String,
  /// Paper title, may span several lines
  #[serde(default)]
  title:      String,
  /// Paper abstract, may span several lines
  #[serde(default)]
  summary:    String,
  /// List of paper authors
  #[serde(rename = "author", default)]
  authors:    Vec<Author>,
  /// Date of the latest version
  updated:    DateTime<Utc>,
  /// Date of the first version
  #[serde(default)]
  published:  Option<DateTime<Utc>>,
  /// Alternate, PDF, and DOI links
  #[serde(rename = "link", default)]
  links:      Vec<Link>,
  /// Subject classes
  #[serde(rename = "category", default)]
  categories: Vec<Category>,
}

/// Internal representation of an author from arXiv's API response.
#[derive(Debug, Deserialize)]
struct Author {
  /// Author's full name
  name: String,
}

/// An Atom `<link>` element.
#[derive(Debug, Deserialize)]
struct Link {
  /// Link target
  #[serde(rename = "@href")]
  href:  String,
  /// MIME type, `application/pdf` for the PDF link
  #[serde(rename = "@type", default)]
  mime:  Option<String>,
  /// Link title, `pdf` for the PDF link
  #[serde(rename = "@title", default)]
  title: Option<String>,
}

/// An Atom `<category>` element.
#[derive(Debug, Deserialize)]
struct Category {
  /// Category code such as `cs.CL`
  #[serde(rename = "@term")]
  term: String,
}

impl Entry {
  /// Converts the entry into a record, or surfaces the error an error entry carries.
  fn into_record(self, fetched_at_utc: DateTime<Utc>) -> Result<PaperRecord> {
    if self.id.contains("/api/errors") {
      return Err(HarvestError::ApiError(format::collapse_whitespace(&self.summary)));
    }

    let pdf_url = self
      .links
      .iter()
      .find(|link| {
        link.mime.as_deref() == Some("application/pdf") || link.title.as_deref() == Some("pdf")
      })
      .map(|link| link.href.clone())
      .or_else(|| paper::derive_pdf_url(&self.id));

    Ok(PaperRecord {
      identifier: paper::normalize_identifier(&self.id),
      title: format::collapse_whitespace(&self.title),
      summary: format::collapse_whitespace(&self.summary),
      authors: self
        .authors
        .iter()
        .map(|author| format::collapse_whitespace(&author.name))
        .filter(|name| !name.is_empty())
        .collect(),
      last_updated: self.updated.date_naive(),
      updated: self.updated,
      published: self.published,
      abs_url: self.id,
      pdf_url,
      categories: self.categories.into_iter().map(|category| category.term).collect(),
      fetched_at_utc,
    })
  }
}

/// Parses one Atom feed page into records, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<PaperRecord>> {
  let feed: Feed = from_str(xml)
    .map_err(|e| HarvestError::MalformedPage(format!("Failed to parse Atom feed: {e}")))?;

  let fetched_at = Utc::now();
  feed.entries.into_iter().map(|entry| entry.into_record(fetched_at)).collect()
}

/// Result ordering requested from the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
  /// Search relevance
  Relevance,
  /// Date of the latest version
  LastUpdatedDate,
  /// Date of the first version
  #[default]
  SubmittedDate,
}

impl SortBy {
  /// The API's spelling of this ordering.
  pub fn as_str(&self) -> &'static str {
    match self {
      SortBy::Relevance => "relevance",
      SortBy::LastUpdatedDate => "lastUpdatedDate",
      SortBy::SubmittedDate => "submittedDate",
    }
  }
}

/// Result direction requested from the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  /// Oldest or least relevant first
  Ascending,
  /// Newest or most relevant first
  #[default]
  Descending,
}

impl SortOrder {
  /// The API's spelling of this direction.
  pub fn as_str(&self) -> &'static str {
    match self {
      SortOrder::Ascending => "ascending",
      SortOrder::Descending => "descending",
    }
  }
}

/// Client for the arXiv search API and PDF server.
///
/// A single [`reqwest::Client`] is reused for every page and PDF request.
#[derive(Debug, Clone)]
pub struct ArxivClient {
  /// Internal web client used to connect to the API.
  client:     reqwest::Client,
  /// Query endpoint
  api_url:    Url,
  /// Requested ordering
  sort_by:    SortBy,
  /// Requested direction
  sort_order: SortOrder,
}

impl ArxivClient {
  /// Creates a client for the endpoint at `api_url` with a per-request `timeout`.
  pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
    let api_url = Url::parse(api_url)?;
    let client = reqwest::Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?;
    Ok(Self { client, api_url, sort_by: SortBy::default(), sort_order: SortOrder::default() })
  }

  /// Sets the requested result ordering.
  pub fn with_sort(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
    self.sort_by = sort_by;
    self.sort_order = sort_order;
    self
  }

  /// The URL requested for one page.
  pub fn page_url(&self, query: &SearchQuery, offset: usize, batch_size: usize) -> Url {
    let mut url = self.api_url.clone();
    url
      .query_pairs_mut()
      .append_pair("search_query", query.as_str())
      .append_pair("start", &offset.to_string())
      .append_pair("max_results", &batch_size.to_string())
      .append_pair("sortBy", self.sort_by.as_str())
      .append_pair("sortOrder", self.sort_order.as_str());
    url
  }
}

#[async_trait]
impl PageFetcher for ArxivClient {
  async fn fetch_page(
    &self,
    query: &SearchQuery,
    offset: usize,
    batch_size: usize,
  ) -> Result<Vec<PaperRecord>> {
    let url = self.page_url(query, offset, batch_size);
    debug!("Fetching from arXiv via: {url}");

    let response = self.client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    trace!("arXiv response: {body}");

    parse_feed(&body)
  }
}

#[async_trait]
impl PdfSource for ArxivClient {
  async fn fetch_pdf(&self, record: &PaperRecord) -> Result<Vec<u8>> {
    let Some(pdf_url) = &record.pdf_url else {
      return Err(HarvestError::Download {
        identifier: record.identifier.clone(),
        reason:     "no PDF URL available".into(),
      });
    };

    debug!("Fetching PDF for {} via: {pdf_url}", record.identifier);
    let response = self.client.get(pdf_url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
  }
}
