//! The end-to-end pipeline.
//!
//! A [`Harvester`] runs the three stages of one harvest in order:
//! 1. paginate with a [`FetchController`] until the fetch policy is satisfied
//! 2. append every accepted record to a [`MetadataSink`], in acceptance order
//! 3. download the PDF of every accepted record through a [`DownloadScheduler`]
//!
//! A fetch failure halts stage 1 but not the others: whatever was accepted before it is still
//! written and downloaded, and the failure is reported in [`HarvestSummary::fetch_error`].

use crate::{
  controller::{FetchController, FetchPolicy},
  download::{sweep_partial_downloads, DownloadScheduler, DownloadTally},
  sink::{JsonlSink, MetadataSink},
};

use super::*;

/// Where a harvest writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTargets {
  /// JSONL file receiving one line per accepted record
  pub metadata_path: PathBuf,
  /// Directory receiving `<safe_name>.pdf` files
  pub pdf_directory: PathBuf,
}

impl OutputTargets {
  /// Creates the output locations and opens the metadata file for appending.
  ///
  /// The PDF directory is only created when `with_pdfs` is set, and must accept new files.
  /// Fails with [`HarvestError::Filesystem`] when either location is unusable, before any
  /// request is made.
  pub fn prepare(&self, with_pdfs: bool) -> Result<JsonlSink> {
    if with_pdfs {
      let filesystem =
        |source| HarvestError::Filesystem { path: self.pdf_directory.clone(), source };
      std::fs::create_dir_all(&self.pdf_directory).map_err(filesystem)?;
      // An existing directory passes `create_dir_all` whatever its permissions.
      tempfile::Builder::new()
        .prefix(".harvester-write-check.")
        .tempfile_in(&self.pdf_directory)
        .map_err(filesystem)?;
      debug!("PDF directory ready at {:?}", self.pdf_directory);
    }
    JsonlSink::open(&self.metadata_path)
  }
}

/// Everything a harvest needs, validated.
#[derive(Debug, Clone)]
pub struct HarvestPlan {
  /// Search terms and local filters
  pub criteria:      SearchCriteria,
  /// Remote query built from `criteria`
  pub query:         SearchQuery,
  /// Paging parameters
  pub policy:        FetchPolicy,
  /// Retry behavior for each page
  pub retry:         RetryPolicy,
  /// Output locations
  pub targets:       OutputTargets,
  /// Whether PDFs are downloaded
  pub download_pdfs: bool,
  /// Pause between requests to the same server
  pub request_delay: Duration,
}

/// Counts and outcome of one harvest.
#[derive(Debug, Default)]
pub struct HarvestSummary {
  /// Successful page responses
  pub pages_fetched:    usize,
  /// Records returned by the server before filtering
  pub records_seen:     usize,
  /// Records written to the metadata sink
  pub records_accepted: usize,
  /// PDFs newly stored
  pub pdfs_downloaded:  usize,
  /// PDFs already present
  pub pdfs_skipped:     usize,
  /// PDFs that could not be stored
  pub pdfs_failed:      usize,
  /// Accepted records without a PDF link
  pub pdfs_missing:     usize,
  /// Partial files removed before downloading
  pub partials_swept:   usize,
  /// The error that halted pagination, if any
  pub fetch_error:      Option<HarvestError>,
}

impl HarvestSummary {
  /// Whether pagination stopped on an error.
  pub fn halted(&self) -> bool { self.fetch_error.is_some() }
}

/// Runs a [`HarvestPlan`] against a page fetcher, a PDF source, and a metadata sink.
#[derive(Debug, Clone)]
pub struct Harvester {
  /// The validated settings
  plan: HarvestPlan,
}

impl Harvester {
  /// Creates a harvester for `plan`.
  pub fn new(plan: HarvestPlan) -> Self { Self { plan } }

  /// The settings this harvester runs with.
  pub fn plan(&self) -> &HarvestPlan { &self.plan }

  /// Runs the harvest.
  ///
  /// Only sink and filesystem failures are returned as errors. A halted fetch is reported in
  /// the summary after the records accepted so far have been written and downloaded.
  pub async fn run<F, P, S>(&self, fetcher: &F, pdfs: &P, sink: &mut S) -> Result<HarvestSummary>
  where
    F: PageFetcher + ?Sized,
    P: PdfSource + ?Sized,
    S: MetadataSink + ?Sized, {
    let plan = &self.plan;
    let controller = FetchController::new(plan.policy, plan.retry)
      .with_request_delay(plan.request_delay);
    let report = controller.run(fetcher, &plan.query, &plan.criteria).await;

    let mut summary = HarvestSummary {
      pages_fetched: report.pages_fetched,
      records_seen: report.records_seen,
      records_accepted: report.accepted.len(),
      ..Default::default()
    };

    for record in &report.accepted {
      sink.append(record)?;
    }
    sink.flush()?;
    info!(
      accepted = report.accepted.len(),
      seen = report.records_seen,
      pages = report.pages_fetched,
      "Stored metadata, stopped because {}",
      report.stop
    );

    if plan.download_pdfs {
      let pdf_dir = &plan.targets.pdf_directory;
      summary.partials_swept = sweep_partial_downloads(pdf_dir)?;

      let scheduler = DownloadScheduler::new(pdf_dir).with_delay(plan.request_delay);
      let mut tally = DownloadTally::default();
      for record in &report.accepted {
        if record.pdf_url.is_none() {
          debug!("No PDF link for {}", record.identifier);
          summary.pdfs_missing += 1;
          continue;
        }
        tally.record(&scheduler.maybe_download(pdfs, record).await);
      }

      summary.pdfs_downloaded = tally.downloaded;
      summary.pdfs_skipped = tally.skipped;
      summary.pdfs_failed = tally.failed;
      info!(
        downloaded = tally.downloaded,
        skipped = tally.skipped,
        failed = tally.failed,
        "Finished PDF downloads"
      );
    }

    summary.fetch_error = report.error;
    Ok(summary)
  }
}
