//! Harvest configuration files.
//!
//! A [`HarvestConfig`] is read from YAML (or JSON, for files ending in `.json`) and turned into
//! the validated values each component works with: [`SearchCriteria`], a
//! [`FetchPolicy`](crate::controller::FetchPolicy), a [`RetryPolicy`], and
//! [`OutputTargets`](crate::harvest::OutputTargets). Nothing is validated while parsing, so a
//! file can be loaded and inspected before [`HarvestConfig::plan`] rejects it.
//!
//! # Configuration File Format
//!
//! ```yaml
//! keywords: ["large language model"]
//! keyword_match: any-of          # any-of | all-of
//! categories: ["cs.CL"]          # alias: ArXiv_categories
//! title_expressions: ["survey"]
//! title_match: all-of            # all-of | any-of
//! date_range: { start: 2023-01-01, end: 2023-06-30 }
//! total_to_fetch: 5              # or `fetch_all: true`, never both
//! batch_size: 100
//! out_jsonl: data/papers.jsonl
//! pdf_dir: data/pdfs
//! download_pdfs: true
//! api_url: https://export.arxiv.org/api/query   # alias: ArXiv_api
//! sort_by: submittedDate         # relevance | lastUpdatedDate | submittedDate
//! sort_order: descending
//! request_delay_ms: 1000
//! timeout_secs: 30
//! max_attempts: 3
//! retry_delay_ms: 1000
//! ```

use crate::{
  clients::arxiv::{ArxivClient, SortBy, SortOrder, DEFAULT_API_URL},
  controller::FetchPolicy,
  harvest::{HarvestPlan, OutputTargets},
  query::build_query,
};

use super::*;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "harvester.yaml";

/// The raw contents of a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
  /// Phrases searched for in every field
  #[serde(default)]
  pub keywords:          Vec<String>,
  /// How keywords combine
  #[serde(default = "MatchPolicy::any_of")]
  pub keyword_match:     MatchPolicy,
  /// arXiv category codes
  #[serde(default, alias = "ArXiv_categories")]
  pub categories:        BTreeSet<String>,
  /// Substrings every accepted title must contain
  #[serde(default)]
  pub title_expressions: Vec<String>,
  /// How title expressions combine
  #[serde(default = "MatchPolicy::all_of")]
  pub title_match:       MatchPolicy,
  /// Window for the last-updated date
  #[serde(default)]
  pub date_range:        Option<DateBounds>,
  /// Number of accepted records to collect
  #[serde(default)]
  pub total_to_fetch:    Option<usize>,
  /// Collect every matching record instead
  #[serde(default)]
  pub fetch_all:         bool,
  /// Records requested per page
  #[serde(default = "default_batch_size")]
  pub batch_size:        usize,
  /// JSONL file receiving metadata
  pub out_jsonl:         PathBuf,
  /// Directory receiving PDFs
  pub pdf_dir:           PathBuf,
  /// Whether to download PDFs at all
  #[serde(default = "default_true")]
  pub download_pdfs:     bool,
  /// Search API endpoint
  #[serde(default = "default_api_url", alias = "ArXiv_api", alias = "arxiv_api")]
  pub api_url:           String,
  /// Requested result ordering
  #[serde(default)]
  pub sort_by:           SortBy,
  /// Requested result direction
  #[serde(default)]
  pub sort_order:        SortOrder,
  /// Pause between page requests and between PDF downloads
  #[serde(default = "default_delay_ms")]
  pub request_delay_ms:  u64,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:      u64,
  /// Attempts per page, the first one included
  #[serde(default = "default_max_attempts")]
  pub max_attempts:      u32,
  /// Delay before the first retry; later retries back off exponentially
  #[serde(default = "default_delay_ms")]
  pub retry_delay_ms:    u64,
}

/// Unvalidated date window as written in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
  /// First accepted date
  pub start: NaiveDate,
  /// Last accepted date
  pub end:   NaiveDate,
}

/// Records per page unless configured.
fn default_batch_size() -> usize { 100 }

/// Serde default for flags that are on unless disabled.
fn default_true() -> bool { true }

/// The public arXiv endpoint.
fn default_api_url() -> String { DEFAULT_API_URL.to_string() }

/// One second between consecutive requests.
fn default_delay_ms() -> u64 { 1000 }

/// Per-request timeout in seconds.
fn default_timeout_secs() -> u64 { 30 }

/// Attempts per page unless configured.
fn default_max_attempts() -> u32 { 3 }

impl HarvestConfig {
  /// Reads the configuration at `path`, as JSON if it ends in `.json` and as YAML otherwise.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
      HarvestError::Configuration(format!("cannot read config file {}: {e}", path.display()))
    })?;

    debug!("Loading configuration from {path:?}");
    match path.extension().and_then(|ext| ext.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&content),
      _ => Self::from_yaml_str(&content),
    }
  }

  /// Parses a YAML document.
  pub fn from_yaml_str(content: &str) -> Result<Self> { Ok(serde_yaml_ng::from_str(content)?) }

  /// Parses a JSON document.
  pub fn from_json_str(content: &str) -> Result<Self> { Ok(serde_json::from_str(content)?) }

  /// Where to look for a configuration when none is given.
  ///
  /// `./harvester.yaml` if it exists, otherwise `harvester/config.yaml` under the platform's
  /// configuration directory.
  pub fn default_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
      return local;
    }
    dirs::config_dir().map(|dir| dir.join("harvester").join("config.yaml")).unwrap_or(local)
  }

  /// Replaces the configured fetch mode, as the command line does.
  ///
  /// Passing neither keeps the file's settings.
  pub fn override_limit(&mut self, total: Option<usize>, fetch_all: bool) {
    if let Some(total) = total {
      self.total_to_fetch = Some(total);
      self.fetch_all = false;
    } else if fetch_all {
      self.total_to_fetch = None;
      self.fetch_all = true;
    }
  }

  /// The validated search criteria.
  pub fn criteria(&self) -> Result<SearchCriteria> {
    let date_range = self.date_range.map(|b| DateRange::new(b.start, b.end)).transpose()?;
    Ok(SearchCriteria {
      keywords: self.keywords.clone(),
      keyword_match: self.keyword_match,
      categories: self.categories.clone(),
      title_expressions: self.title_expressions.clone(),
      title_match: self.title_match,
      date_range,
    })
  }

  /// The validated paging parameters.
  pub fn fetch_policy(&self) -> Result<FetchPolicy> {
    FetchPolicy::from_settings(self.total_to_fetch, self.fetch_all, self.batch_size)
  }

  /// The retry behavior for page requests.
  pub fn retry_policy(&self) -> Result<RetryPolicy> {
    if self.max_attempts == 0 {
      return Err(HarvestError::Configuration("max_attempts must be positive".into()));
    }
    Ok(RetryPolicy {
      max_attempts: self.max_attempts,
      initial_delay: Duration::from_millis(self.retry_delay_ms),
      ..RetryPolicy::default()
    })
  }

  /// The metadata file and PDF directory.
  pub fn output_targets(&self) -> OutputTargets {
    OutputTargets { metadata_path: self.out_jsonl.clone(), pdf_directory: self.pdf_dir.clone() }
  }

  /// Validates everything and assembles the values a [`Harvester`](crate::harvest::Harvester)
  /// runs on.
  pub fn plan(&self) -> Result<HarvestPlan> {
    let criteria = self.criteria()?;
    let query = build_query(&criteria)?;
    Ok(HarvestPlan {
      query,
      criteria,
      policy: self.fetch_policy()?,
      retry: self.retry_policy()?,
      targets: self.output_targets(),
      download_pdfs: self.download_pdfs,
      request_delay: Duration::from_millis(self.request_delay_ms),
    })
  }

  /// A client for the configured endpoint.
  pub fn client(&self) -> Result<ArxivClient> {
    Ok(
      ArxivClient::new(&self.api_url, Duration::from_secs(self.timeout_secs))?
        .with_sort(self.sort_by, self.sort_order),
    )
  }
}
