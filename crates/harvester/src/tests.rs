use std::{
  collections::{HashMap, HashSet},
  sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
  },
};

use super::*;
use crate::{
  controller::{FetchController, FetchPolicy, StopReason},
  harvest::{HarvestPlan, Harvester, OutputTargets},
  query::build_query,
};

/// A record last updated at noon UTC on `updated` (`YYYY-MM-DD`).
pub(crate) fn paper(identifier: &str, title: &str, updated: &str) -> PaperRecord {
  let date: NaiveDate = updated.parse().unwrap();
  let timestamp = date.and_hms_opt(12, 0, 0).unwrap().and_utc();
  PaperRecord {
    identifier:     identifier.to_string(),
    title:          title.to_string(),
    summary:        format!("Abstract of {title}."),
    authors:        vec!["Jane Doe".to_string()],
    last_updated:   date,
    updated:        timestamp,
    published:      Some(timestamp),
    abs_url:        format!("http://arxiv.org/abs/{identifier}"),
    pdf_url:        Some(format!("http://arxiv.org/pdf/{identifier}")),
    categories:     vec!["cs.CL".to_string()],
    fetched_at_utc: timestamp,
  }
}

/// One Atom `<entry>` as the API would send it.
pub(crate) fn atom_entry(id: &str, title: &str, updated: &str, pdf_href: Option<&str>) -> String {
  let pdf_link = pdf_href
    .map(|href| format!(r#"<link title="pdf" href="{href}" rel="related" type="application/pdf"/>"#))
    .unwrap_or_default();
  format!(
    r#"<entry>
    <id>http://arxiv.org/abs/{id}</id>
    <updated>{updated}</updated>
    <published>{updated}</published>
    <title>{title}</title>
    <summary>Abstract of {title}.</summary>
    <author><name>Jane Doe</name></author>
    <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
    {pdf_link}
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#
  )
}

/// A complete Atom feed holding `entries`.
pub(crate) fn atom_feed(entries: &[String]) -> String {
  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query</title>
  <id>http://arxiv.org/api/test</id>
  <updated>2023-07-01T00:00:00-04:00</updated>
  {}
</feed>"#,
    entries.concat()
  )
}

/// An in-memory search server over a fixed result list.
struct FakeArchive {
  /// Results in server order
  records:  Vec<PaperRecord>,
  /// `(offset, batch_size)` of every request received
  requests: Mutex<Vec<(usize, usize)>>,
  /// Remaining simulated failures per offset
  failures: Mutex<HashMap<usize, u32>>,
}

impl FakeArchive {
  fn new(records: Vec<PaperRecord>) -> Self {
    Self { records, requests: Mutex::new(Vec::new()), failures: Mutex::new(HashMap::new()) }
  }

  fn failing_at(self, offset: usize, times: u32) -> Self {
    self.failures.lock().unwrap().insert(offset, times);
    self
  }

  fn requests(&self) -> Vec<(usize, usize)> { self.requests.lock().unwrap().clone() }
}

#[async_trait]
impl PageFetcher for FakeArchive {
  async fn fetch_page(
    &self,
    _query: &SearchQuery,
    offset: usize,
    batch_size: usize,
  ) -> Result<Vec<PaperRecord>> {
    self.requests.lock().unwrap().push((offset, batch_size));
    if let Some(remaining) = self.failures.lock().unwrap().get_mut(&offset) {
      if *remaining > 0 {
        *remaining -= 1;
        return Err(HarvestError::MalformedPage("simulated truncated response".into()));
      }
    }
    Ok(self.records.iter().skip(offset).take(batch_size).cloned().collect())
  }
}

/// Serves a small PDF for every record except the ones listed as broken.
#[derive(Default)]
struct FakePdfs {
  /// Identifiers answered with an HTML error page
  broken: HashSet<String>,
  /// Requests received
  calls:  AtomicUsize,
}

#[async_trait]
impl PdfSource for FakePdfs {
  async fn fetch_pdf(&self, record: &PaperRecord) -> Result<Vec<u8>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.broken.contains(&record.identifier) {
      return Ok(b"<html>Service Unavailable</html>".to_vec());
    }
    Ok(format!("%PDF-1.4 {}", record.identifier).into_bytes())
  }
}

/// Records titled `match N` at even positions and `other N` at odd ones.
fn alternating(count: usize) -> Vec<PaperRecord> {
  (0..count)
    .map(|i| {
      let title = if i % 2 == 0 { format!("match {i}") } else { format!("other {i}") };
      paper(&format!("2301.{i:05}v1"), &title, "2023-01-15")
    })
    .collect()
}

fn matching_criteria() -> SearchCriteria {
  SearchCriteria {
    keywords: vec!["llm".into()],
    title_expressions: vec!["match".into()],
    ..Default::default()
  }
}

fn ids(records: &[PaperRecord]) -> Vec<&str> {
  records.iter().map(|r| r.identifier.as_str()).collect()
}

#[traced_test]
#[tokio::test]
async fn test_llm_survey_first_half_2023() {
  let archive = FakeArchive::new(vec![
    paper("2307.00001v1", "A Survey on Large Language Models", "2023-07-02"),
    paper("2306.00002v1", "Large Language Model Agents: A Survey", "2023-06-20"),
    paper("2306.00003v1", "Scaling Laws Revisited", "2023-06-10"),
    paper("2305.00004v2", "A survey of LLM evaluation", "2023-05-30"),
    paper("2305.00005v1", "Instruction Tuning: a Survey", "2023-05-01"),
    paper("2304.00006v1", "Prompt Engineering in Practice", "2023-04-11"),
    paper("2303.00007v3", "Hallucination Survey", "2023-03-03"),
    paper("2302.00008v1", "SURVEY: retrieval for LLMs", "2023-02-14"),
    paper("2301.00009v1", "Tokenizers: A Survey", "2023-01-01"),
    paper("2212.00010v1", "A Survey from Last Year", "2022-12-31"),
  ]);
  let criteria = SearchCriteria {
    keywords: vec!["large language model".into()],
    categories: ["cs.CL".to_string()].into(),
    title_expressions: vec!["survey".into()],
    date_range: Some(
      DateRange::new("2023-01-01".parse().unwrap(), "2023-06-30".parse().unwrap()).unwrap(),
    ),
    ..Default::default()
  };
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::limited(5, 3).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(report.stop, StopReason::LimitReached);
  assert_eq!(ids(&report.accepted), vec![
    "2306.00002v1",
    "2305.00004v2",
    "2305.00005v1",
    "2303.00007v3",
    "2302.00008v1",
  ]);
  let filter = ResultFilter::new(&criteria);
  assert!(report.accepted.iter().all(|r| filter.accepts(r)));
}

#[traced_test]
#[tokio::test]
async fn test_offset_advances_by_raw_page_length() {
  let archive = FakeArchive::new(alternating(20));
  let criteria = matching_criteria();
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::limited(4, 3).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(archive.requests(), vec![(0, 3), (3, 3), (6, 3)]);
  assert_eq!(ids(&report.accepted), vec![
    "2301.00000v1",
    "2301.00002v1",
    "2301.00004v1",
    "2301.00006v1"
  ]);
  assert_eq!(report.records_seen, 9);
  assert_eq!(report.pages_fetched, 3);
  assert_eq!(report.stop, StopReason::LimitReached);
}

#[tokio::test]
async fn test_sparse_matches_keep_full_pages() {
  let records = (0..300)
    .map(|i| {
      let title = if i < 4 || i == 250 { format!("match {i}") } else { format!("other {i}") };
      paper(&format!("2301.{i:05}v1"), &title, "2023-01-15")
    })
    .collect();
  let archive = FakeArchive::new(records);
  let criteria = matching_criteria();
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::limited(5, 100).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  let requests = archive.requests();
  assert_eq!(report.stop, StopReason::LimitReached);
  assert_eq!(report.accepted.last().unwrap().identifier, "2301.00250v1");
  assert_eq!(requests.len(), 51);
  assert!(requests.iter().all(|&(_, size)| size == 5));
  assert_eq!(requests.last(), Some(&(250, 5)));
}

#[tokio::test]
async fn test_limit_truncates_within_a_page() {
  let archive = FakeArchive::new(alternating(10));
  let criteria = SearchCriteria { keywords: vec!["llm".into()], ..Default::default() };
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::limited(3, 10).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(archive.requests(), vec![(0, 3)]);
  assert_eq!(ids(&report.accepted), vec!["2301.00000v1", "2301.00001v1", "2301.00002v1"]);
}

#[tokio::test]
async fn test_fetch_all_runs_until_empty_page() {
  let archive = FakeArchive::new(alternating(7));
  let criteria = matching_criteria();
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::fetch_all(3).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(archive.requests(), vec![(0, 3), (3, 3), (6, 3), (7, 3)]);
  assert_eq!(report.stop, StopReason::Exhausted);
  assert_eq!(report.pages_fetched, 4);
  assert_eq!(report.records_seen, 7);
  assert_eq!(report.accepted.len(), 4);
  assert!(report.error.is_none());
}

#[tokio::test]
async fn test_limit_above_available_matches_returns_all() {
  let archive = FakeArchive::new(alternating(5));
  let criteria = matching_criteria();
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::limited(10, 2).unwrap(), RetryPolicy::immediate(1));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(report.stop, StopReason::Exhausted);
  assert_eq!(ids(&report.accepted), vec!["2301.00000v1", "2301.00002v1", "2301.00004v1"]);
}

#[traced_test]
#[tokio::test]
async fn test_transient_failure_is_retried_at_same_offset() {
  let archive = FakeArchive::new(alternating(6)).failing_at(3, 2);
  let criteria = SearchCriteria { keywords: vec!["llm".into()], ..Default::default() };
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::fetch_all(3).unwrap(), RetryPolicy::immediate(3));

  let report = controller.run(&archive, &query, &criteria).await;

  assert_eq!(archive.requests(), vec![(0, 3), (3, 3), (3, 3), (3, 3), (6, 3)]);
  assert_eq!(report.accepted.len(), 6);
  assert_eq!(report.stop, StopReason::Exhausted);
  assert!(logs_contain("Transient failure, retrying"));
}

#[traced_test]
#[tokio::test]
async fn test_exhausted_retries_keep_accepted_records() {
  let archive = FakeArchive::new(alternating(9)).failing_at(3, u32::MAX);
  let criteria = SearchCriteria { keywords: vec!["llm".into()], ..Default::default() };
  let query = build_query(&criteria).unwrap();
  let controller =
    FetchController::new(FetchPolicy::fetch_all(3).unwrap(), RetryPolicy::immediate(2));

  let report = controller.run(&archive, &query, &criteria).await;

  assert!(report.halted());
  assert_eq!(ids(&report.accepted), vec!["2301.00000v1", "2301.00001v1", "2301.00002v1"]);
  assert_eq!(report.pages_fetched, 1);
  match report.error {
    Some(HarvestError::Fetch { offset, attempts, ref source }) => {
      assert_eq!(offset, 3);
      assert_eq!(attempts, 2);
      assert!(matches!(**source, HarvestError::MalformedPage(_)));
    },
    ref other => panic!("expected a fetch error, got {other:?}"),
  }
}

fn plan_in(dir: &Path, policy: FetchPolicy) -> HarvestPlan {
  let criteria = matching_criteria();
  HarvestPlan {
    query: build_query(&criteria).unwrap(),
    criteria,
    policy,
    retry: RetryPolicy::immediate(1),
    targets: OutputTargets {
      metadata_path: dir.join("out").join("papers.jsonl"),
      pdf_directory: dir.join("pdfs"),
    },
    download_pdfs: true,
    request_delay: Duration::ZERO,
  }
}

fn line_count(path: &Path) -> usize { std::fs::read_to_string(path).unwrap().lines().count() }

#[traced_test]
#[tokio::test]
async fn test_second_run_downloads_nothing() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::fetch_all(4)?);
  let archive = FakeArchive::new(alternating(10));
  let pdfs = FakePdfs::default();
  let harvester = Harvester::new(plan.clone());

  let mut sink = plan.targets.prepare(true)?;
  let first = harvester.run(&archive, &pdfs, &mut sink).await?;
  drop(sink);
  assert_eq!(first.records_accepted, 5);
  assert_eq!(first.pdfs_downloaded, 5);
  assert_eq!(first.pdfs_skipped, 0);
  assert_eq!(line_count(&plan.targets.metadata_path), 5);

  let mut sink = plan.targets.prepare(true)?;
  let second = harvester.run(&archive, &pdfs, &mut sink).await?;
  drop(sink);
  assert_eq!(second.pdfs_downloaded, 0);
  assert_eq!(second.pdfs_skipped, 5);
  assert_eq!(pdfs.calls.load(Ordering::SeqCst), 5);
  assert_eq!(line_count(&plan.targets.metadata_path), 10);

  let stored = std::fs::read(plan.targets.pdf_directory.join("2301.00004v1.pdf"))?;
  assert_eq!(stored, b"%PDF-1.4 2301.00004v1");
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_download_does_not_stop_others() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::limited(3, 10)?);
  let archive = FakeArchive::new(alternating(10));
  let pdfs = FakePdfs { broken: ["2301.00002v1".to_string()].into(), ..Default::default() };

  let mut sink = plan.targets.prepare(true)?;
  let summary = Harvester::new(plan.clone()).run(&archive, &pdfs, &mut sink).await?;

  assert_eq!(summary.pdfs_downloaded, 2);
  assert_eq!(summary.pdfs_failed, 1);
  let pdf_dir = &plan.targets.pdf_directory;
  assert!(pdf_dir.join("2301.00000v1.pdf").exists());
  assert!(!pdf_dir.join("2301.00002v1.pdf").exists());
  assert!(pdf_dir.join("2301.00004v1.pdf").exists());
  assert_eq!(std::fs::read_dir(pdf_dir)?.count(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_halted_fetch_still_writes_partial_results() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::fetch_all(4)?);
  let archive = FakeArchive::new(alternating(12)).failing_at(4, u32::MAX);
  let pdfs = FakePdfs::default();

  let mut records: Vec<PaperRecord> = Vec::new();
  std::fs::create_dir_all(&plan.targets.pdf_directory)?;
  let summary = Harvester::new(plan.clone()).run(&archive, &pdfs, &mut records).await?;

  assert!(summary.halted());
  assert_eq!(ids(&records), vec!["2301.00000v1", "2301.00002v1"]);
  assert_eq!(summary.pdfs_downloaded, 2);
  Ok(())
}

#[tokio::test]
async fn test_stale_partials_are_swept_before_downloading() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::limited(1, 1)?);
  let _sink = plan.targets.prepare(true)?;
  std::fs::write(plan.targets.pdf_directory.join(".2301.00000v1.abc123.part"), b"%PDF-1.4 tr")?;

  let mut records: Vec<PaperRecord> = Vec::new();
  let summary = Harvester::new(plan.clone())
    .run(&FakeArchive::new(alternating(2)), &FakePdfs::default(), &mut records)
    .await?;

  assert_eq!(summary.partials_swept, 1);
  assert_eq!(summary.pdfs_downloaded, 1);
  assert_eq!(std::fs::read_dir(&plan.targets.pdf_directory)?.count(), 1);
  Ok(())
}

#[tokio::test]
async fn test_pdfs_disabled() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let mut plan = plan_in(dir.path(), FetchPolicy::fetch_all(5)?);
  plan.download_pdfs = false;
  let pdfs = FakePdfs::default();

  let mut sink = plan.targets.prepare(false)?;
  let summary =
    Harvester::new(plan.clone()).run(&FakeArchive::new(alternating(4)), &pdfs, &mut sink).await?;

  assert_eq!(summary.records_accepted, 2);
  assert_eq!(pdfs.calls.load(Ordering::SeqCst), 0);
  assert!(!plan.targets.pdf_directory.exists());
  Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_only_pdf_directory_fails_before_fetching() -> anyhow::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::limited(2, 10)?);
  let pdf_dir = &plan.targets.pdf_directory;
  std::fs::create_dir_all(pdf_dir)?;
  std::fs::set_permissions(pdf_dir, std::fs::Permissions::from_mode(0o555))?;

  // Privileged users write through directory permissions.
  if tempfile::tempfile_in(pdf_dir).is_ok() {
    std::fs::set_permissions(pdf_dir, std::fs::Permissions::from_mode(0o755))?;
    return Ok(());
  }

  let result = plan.targets.prepare(true);
  std::fs::set_permissions(pdf_dir, std::fs::Permissions::from_mode(0o755))?;

  match result {
    Err(HarvestError::Filesystem { path, .. }) => assert_eq!(&path, pdf_dir),
    other => panic!("expected a filesystem error, got {other:?}"),
  }
  Ok(())
}

#[test]
fn test_prepare_leaves_pdf_directory_empty() -> anyhow::Result<()> {
  let dir = tempdir()?;
  let plan = plan_in(dir.path(), FetchPolicy::limited(2, 10)?);

  plan.targets.prepare(true)?;

  assert!(plan.targets.pdf_directory.is_dir());
  assert_eq!(std::fs::read_dir(&plan.targets.pdf_directory)?.count(), 0);
  Ok(())
}
