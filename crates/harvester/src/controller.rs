//! The pagination loop.
//!
//! [`FetchController::run`] walks the server's result order one page at a time. The offset
//! always advances by the number of records the server returned, whatever the filter made of
//! them, so filtering can never cause a page to be skipped or requested twice.
//!
//! The loop stops when:
//! - a page comes back empty ([`StopReason::Exhausted`])
//! - in [`FetchMode::Limited`] mode, the accepted count reaches the limit
//!   ([`StopReason::LimitReached`]); later records of that page are dropped
//! - a page keeps failing after retries ([`StopReason::Failed`])
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use harvester::{
//!   clients::{arxiv::DEFAULT_API_URL, ArxivClient},
//!   controller::{FetchController, FetchPolicy},
//!   criteria::SearchCriteria,
//!   query::build_query,
//!   retry::RetryPolicy,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let criteria = SearchCriteria { categories: ["cs.CL".to_string()].into(), ..Default::default() };
//! let query = build_query(&criteria)?;
//! let client = ArxivClient::new(DEFAULT_API_URL, Duration::from_secs(30))?;
//!
//! let controller = FetchController::new(FetchPolicy::limited(25, 100)?, RetryPolicy::default())
//!   .with_request_delay(Duration::from_secs(3));
//! let report = controller.run(&client, &query, &criteria).await;
//! println!("{} accepted, stopped: {}", report.accepted.len(), report.stop);
//! # Ok(())
//! # }
//! ```

use crate::retry::{with_retry, RetryFailure};

use super::*;

/// How many accepted records a run is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
  /// Stop once this many records were accepted
  Limited(usize),
  /// Keep going until the server runs out of results
  FetchAll,
}

/// Validated paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
  /// Stopping mode
  mode:       FetchMode,
  /// Largest page ever requested
  batch_size: usize,
}

impl FetchPolicy {
  /// Collect at most `total` accepted records.
  pub fn limited(total: usize, batch_size: usize) -> Result<Self> {
    if total == 0 {
      return Err(HarvestError::Configuration("total_to_fetch must be positive".into()));
    }
    Self::new(FetchMode::Limited(total), batch_size)
  }

  /// Collect every matching record the server has.
  pub fn fetch_all(batch_size: usize) -> Result<Self> { Self::new(FetchMode::FetchAll, batch_size) }

  /// Builds a policy from the two mutually exclusive settings.
  ///
  /// Exactly one of `total` and `fetch_all` must be given.
  pub fn from_settings(total: Option<usize>, fetch_all: bool, batch_size: usize) -> Result<Self> {
    match (total, fetch_all) {
      (Some(total), false) => Self::limited(total, batch_size),
      (None, true) => Self::fetch_all(batch_size),
      (Some(_), true) => Err(HarvestError::Configuration(
        "total_to_fetch and fetch_all are mutually exclusive".into(),
      )),
      (None, false) =>
        Err(HarvestError::Configuration("one of total_to_fetch or fetch_all is required".into())),
    }
  }

  /// Shared constructor validating the batch size.
  fn new(mode: FetchMode, batch_size: usize) -> Result<Self> {
    if batch_size == 0 {
      return Err(HarvestError::Configuration("batch_size must be positive".into()));
    }
    Ok(Self { mode, batch_size })
  }

  /// The stopping mode.
  pub fn mode(&self) -> FetchMode { self.mode }

  /// The configured page size.
  pub fn batch_size(&self) -> usize { self.batch_size }

  /// Size of every page request.
  ///
  /// A limited run never asks for more records than its limit, but keeps full pages while
  /// accepted records accumulate; surplus matches on the last page are dropped.
  pub fn page_size(&self) -> usize {
    match self.mode {
      FetchMode::Limited(total) => self.batch_size.min(total),
      FetchMode::FetchAll => self.batch_size,
    }
  }
}

impl std::fmt::Display for FetchPolicy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.mode {
      FetchMode::Limited(total) => write!(f, "up to {total} records, {} per page", self.batch_size),
      FetchMode::FetchAll => write!(f, "all records, {} per page", self.batch_size),
    }
  }
}

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  /// The server returned an empty page
  Exhausted,
  /// The requested number of records was accepted
  LimitReached,
  /// A page could not be fetched
  Failed,
}

impl std::fmt::Display for StopReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StopReason::Exhausted => write!(f, "results exhausted"),
      StopReason::LimitReached => write!(f, "limit reached"),
      StopReason::Failed => write!(f, "fetch failed"),
    }
  }
}

/// Everything one pagination run produced.
#[derive(Debug)]
pub struct FetchReport {
  /// Accepted records in server order
  pub accepted:      Vec<PaperRecord>,
  /// Successful page responses, the final empty one included
  pub pages_fetched: usize,
  /// Records returned by the server before filtering
  pub records_seen:  usize,
  /// Why the loop ended
  pub stop:          StopReason,
  /// The error that halted the loop, when `stop` is [`StopReason::Failed`]
  pub error:         Option<HarvestError>,
}

impl FetchReport {
  /// Whether the run ended because of a fetch failure.
  pub fn halted(&self) -> bool { self.stop == StopReason::Failed }
}

/// Drives a [`PageFetcher`] until the [`FetchPolicy`] is satisfied.
#[derive(Debug, Clone)]
pub struct FetchController {
  /// Paging parameters
  policy:        FetchPolicy,
  /// Retry behavior for each page
  retry:         RetryPolicy,
  /// Pause between consecutive page requests
  request_delay: Duration,
}

impl FetchController {
  /// Creates a controller without any pause between pages.
  pub fn new(policy: FetchPolicy, retry: RetryPolicy) -> Self {
    Self { policy, retry, request_delay: Duration::ZERO }
  }

  /// Pauses for `delay` before every page after the first.
  pub fn with_request_delay(mut self, delay: Duration) -> Self {
    self.request_delay = delay;
    self
  }

  /// The paging parameters in use.
  pub fn policy(&self) -> &FetchPolicy { &self.policy }

  /// Runs the pagination loop for `query`, keeping records that satisfy `criteria`.
  ///
  /// Never fails as a whole: a page that cannot be fetched ends the loop with
  /// [`StopReason::Failed`] and the error in [`FetchReport::error`], while the records accepted
  /// before it stay in the report.
  pub async fn run<F: PageFetcher + ?Sized>(
    &self,
    fetcher: &F,
    query: &SearchQuery,
    criteria: &SearchCriteria,
  ) -> FetchReport {
    let filter = ResultFilter::new(criteria);
    let mut report = FetchReport {
      accepted:      Vec::new(),
      pages_fetched: 0,
      records_seen:  0,
      stop:          StopReason::Exhausted,
      error:         None,
    };
    let mut offset = 0;

    info!("Fetching {} for query: {query}", self.policy);
    loop {
      let page_size = self.policy.page_size();
      if report.pages_fetched > 0 && !self.request_delay.is_zero() {
        tokio::time::sleep(self.request_delay).await;
      }

      debug!(offset, page_size, "Requesting page");
      let page =
        match with_retry(&self.retry, || fetcher.fetch_page(query, offset, page_size)).await {
          Ok(page) => page,
          Err(RetryFailure { attempts, error }) => {
            warn!(offset, attempts, "Stopping pagination: {error}");
            report.stop = StopReason::Failed;
            report.error =
              Some(HarvestError::Fetch { offset, attempts, source: Box::new(error) });
            return report;
          },
        };
      report.pages_fetched += 1;

      if page.is_empty() {
        info!(offset, "Server returned an empty page, results exhausted");
        report.stop = StopReason::Exhausted;
        return report;
      }

      report.records_seen += page.len();
      offset += page.len();

      let before = report.accepted.len();
      for record in page {
        if !filter.accepts(&record) {
          continue;
        }
        report.accepted.push(record);
        if let FetchMode::Limited(total) = self.policy.mode {
          if report.accepted.len() >= total {
            info!(total, "Accepted the requested number of records");
            report.stop = StopReason::LimitReached;
            return report;
          }
        }
      }
      debug!(
        offset,
        accepted_on_page = report.accepted.len() - before,
        accepted_total = report.accepted.len(),
        "Page processed"
      );
    }
  }
}
