//! PDF downloads that happen at most once per paper.
//!
//! Each record maps to a fixed target `<pdf_dir>/<safe_name>.pdf`. A target that already
//! exists is never requested again, so re-running a harvest only fetches what is missing.
//!
//! Bytes are first written to a hidden `.<safe_name>.*.part` file in the same directory,
//! synced, and then moved onto the target without overwriting. A crash or a rejected
//! response therefore never leaves a truncated file under the final name.
//! [`sweep_partial_downloads`] removes leftovers of interrupted runs.

use std::io::Write;

use super::*;

/// Every PDF file starts with these bytes.
const PDF_MAGIC: &[u8] = b"%PDF";

/// Suffix of in-flight download files.
const PART_SUFFIX: &str = ".part";

/// What happened to one record's PDF.
#[derive(Debug)]
pub enum Outcome {
  /// The PDF was fetched and stored at this path
  Downloaded(PathBuf),
  /// A file already existed at this path; nothing was requested
  Skipped(PathBuf),
  /// The PDF could not be stored; no file was left behind
  Failed(HarvestError),
}

/// Running counts of download outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadTally {
  /// PDFs newly stored
  pub downloaded: usize,
  /// PDFs already present
  pub skipped:    usize,
  /// PDFs that failed
  pub failed:     usize,
}

impl DownloadTally {
  /// Counts `outcome`.
  pub fn record(&mut self, outcome: &Outcome) {
    match outcome {
      Outcome::Downloaded(_) => self.downloaded += 1,
      Outcome::Skipped(_) => self.skipped += 1,
      Outcome::Failed(_) => self.failed += 1,
    }
  }
}

/// Stores PDFs under one directory, skipping those already present.
#[derive(Debug, Clone)]
pub struct DownloadScheduler {
  /// Directory holding the PDFs
  pdf_dir: PathBuf,
  /// Pause after each request made
  delay:   Duration,
}

impl DownloadScheduler {
  /// Creates a scheduler writing into `pdf_dir`, which must already exist.
  pub fn new(pdf_dir: impl Into<PathBuf>) -> Self {
    Self { pdf_dir: pdf_dir.into(), delay: Duration::ZERO }
  }

  /// Pauses for `delay` after every download attempt. Skipped records never wait.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Where the PDF for `record` lives.
  pub fn target_path(&self, record: &PaperRecord) -> PathBuf {
    self.pdf_dir.join(record.pdf_file_name())
  }

  /// Downloads the PDF for `record` unless its target already exists.
  ///
  /// Failures are reported in the returned [`Outcome`] and never affect other records.
  pub async fn maybe_download<S: PdfSource + ?Sized>(
    &self,
    source: &S,
    record: &PaperRecord,
  ) -> Outcome {
    let target = self.target_path(record);
    if target.exists() {
      debug!("PDF for {} already present at {target:?}", record.identifier);
      return Outcome::Skipped(target);
    }

    let outcome = match self.download(source, record, &target).await {
      Ok(()) => {
        info!("Downloaded PDF for {} to {target:?}", record.identifier);
        Outcome::Downloaded(target)
      },
      Err(HarvestError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
        debug!("PDF for {} appeared at {target:?} while downloading", record.identifier);
        Outcome::Skipped(target)
      },
      Err(error) => {
        let error = match error {
          error @ HarvestError::Download { .. } => error,
          other => HarvestError::Download {
            identifier: record.identifier.clone(),
            reason:     other.to_string(),
          },
        };
        warn!("{error}");
        Outcome::Failed(error)
      },
    };

    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    outcome
  }

  /// Fetches, validates, and atomically stores one PDF.
  async fn download<S: PdfSource + ?Sized>(
    &self,
    source: &S,
    record: &PaperRecord,
    target: &Path,
  ) -> Result<()> {
    let bytes = source.fetch_pdf(record).await?;
    if !bytes.starts_with(PDF_MAGIC) {
      return Err(HarvestError::Download {
        identifier: record.identifier.clone(),
        reason:     format!("response of {} bytes is not a PDF", bytes.len()),
      });
    }

    let mut part = tempfile::Builder::new()
      .prefix(&format!(".{}.", record.safe_name()))
      .suffix(PART_SUFFIX)
      .tempfile_in(&self.pdf_dir)?;
    trace!("Writing {} bytes to {:?}", bytes.len(), part.path());
    part.write_all(&bytes)?;
    part.as_file().sync_all()?;
    part.persist_noclobber(target).map_err(|e| HarvestError::Io(e.error))?;
    Ok(())
  }
}

/// Removes `.*.part` files left in `dir` by interrupted downloads.
///
/// Returns how many files were removed.
pub fn sweep_partial_downloads(dir: &Path) -> Result<usize> {
  let pattern = format!("{}/.*{PART_SUFFIX}", glob::Pattern::escape(&dir.to_string_lossy()));
  let entries = glob::glob(&pattern)
    .map_err(|e| HarvestError::Configuration(format!("invalid PDF directory {dir:?}: {e}")))?;

  let mut removed = 0;
  for path in entries.flatten() {
    match std::fs::remove_file(&path) {
      Ok(()) => {
        debug!("Removed partial download {path:?}");
        removed += 1;
      },
      Err(e) => warn!("Could not remove partial download {path:?}: {e}"),
    }
  }
  if removed > 0 {
    info!("Removed {removed} partial download(s) from {dir:?}");
  }
  Ok(removed)
}
