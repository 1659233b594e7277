//! What a harvest looks for.
//!
//! [`SearchCriteria`] carries both halves of a search: keywords and categories go to the
//! remote API through [`query::build_query`](crate::query::build_query), while the date range
//! and title expressions are applied locally by [`ResultFilter`](crate::filter::ResultFilter).

use super::*;

/// How a list of terms combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
  /// Every term must match
  AllOf,
  /// At least one term must match
  AnyOf,
}

impl MatchPolicy {
  /// Default for title expressions.
  pub fn all_of() -> Self { MatchPolicy::AllOf }

  /// Default for keywords.
  pub fn any_of() -> Self { MatchPolicy::AnyOf }
}

impl std::fmt::Display for MatchPolicy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      MatchPolicy::AllOf => write!(f, "all-of"),
      MatchPolicy::AnyOf => write!(f, "any-of"),
    }
  }
}

/// An inclusive window of calendar dates.
///
/// The only way to build one is [`DateRange::new`], which rejects a start after the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  /// First accepted date
  start: NaiveDate,
  /// Last accepted date
  end:   NaiveDate,
}

impl DateRange {
  /// Creates a range, failing with [`HarvestError::Configuration`] when `start > end`.
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(HarvestError::Configuration(format!(
        "date_range start {start} is after its end {end}"
      )));
    }
    Ok(Self { start, end })
  }

  /// First accepted date.
  pub fn start(&self) -> NaiveDate { self.start }

  /// Last accepted date.
  pub fn end(&self) -> NaiveDate { self.end }

  /// Whether `date` falls inside the window, both ends included.
  pub fn contains(&self, date: NaiveDate) -> bool { self.start <= date && date <= self.end }
}

impl std::fmt::Display for DateRange {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}..={}", self.start, self.end)
  }
}

/// Search terms and post-fetch restrictions for one harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
  /// Phrases matched against title and abstract by the remote API
  pub keywords:          Vec<String>,
  /// How keywords combine in the remote query
  pub keyword_match:     MatchPolicy,
  /// arXiv category codes such as `cs.CL`
  pub categories:        BTreeSet<String>,
  /// Case-insensitive substrings the title must contain
  pub title_expressions: Vec<String>,
  /// How title expressions combine
  pub title_match:       MatchPolicy,
  /// Window applied to each record's last-updated date
  pub date_range:        Option<DateRange>,
}

impl Default for SearchCriteria {
  fn default() -> Self {
    Self {
      keywords:          Vec::new(),
      keyword_match:     MatchPolicy::AnyOf,
      categories:        BTreeSet::new(),
      title_expressions: Vec::new(),
      title_match:       MatchPolicy::AllOf,
      date_range:        None,
    }
  }
}
