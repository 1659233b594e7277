//! Post-fetch predicates.
//!
//! A record is accepted when both hold:
//! - its last-updated date lies in the configured [`DateRange`] (inclusive), if any
//! - its title contains the configured expressions as case-insensitive substrings, combined
//!   according to the title [`MatchPolicy`]
//!
//! Filtering never influences pagination; see [`controller`](crate::controller).

use super::*;

/// The compiled form of the local half of [`SearchCriteria`].
///
/// Expressions are lowercased once up front so a long run does not redo it per record.
#[derive(Debug, Clone)]
pub struct ResultFilter {
  /// Window for the last-updated date
  date_range:  Option<DateRange>,
  /// Lowercased, non-blank title expressions
  expressions: Vec<String>,
  /// How the expressions combine
  title_match: MatchPolicy,
}

impl ResultFilter {
  /// Compiles the filter for `criteria`.
  pub fn new(criteria: &SearchCriteria) -> Self {
    let expressions = criteria
      .title_expressions
      .iter()
      .map(|expr| expr.trim().to_lowercase())
      .filter(|expr| !expr.is_empty())
      .collect();

    Self { date_range: criteria.date_range, expressions, title_match: criteria.title_match }
  }

  /// Whether `record` passes both predicates.
  pub fn accepts(&self, record: &PaperRecord) -> bool {
    let accepted = self.matches_date(record.last_updated) && self.matches_title(&record.title);
    trace!(identifier = %record.identifier, accepted, "Filtered record");
    accepted
  }

  /// The date predicate on its own.
  pub fn matches_date(&self, last_updated: NaiveDate) -> bool {
    self.date_range.map_or(true, |range| range.contains(last_updated))
  }

  /// The title predicate on its own.
  pub fn matches_title(&self, title: &str) -> bool {
    if self.expressions.is_empty() {
      return true;
    }

    let title = title.to_lowercase();
    match self.title_match {
      MatchPolicy::AllOf => self.expressions.iter().all(|expr| title.contains(expr.as_str())),
      MatchPolicy::AnyOf => self.expressions.iter().any(|expr| title.contains(expr.as_str())),
    }
  }
}

/// Whether `record` satisfies `criteria`.
///
/// Convenience over [`ResultFilter`] for one-off checks.
pub fn accepts(record: &PaperRecord, criteria: &SearchCriteria) -> bool {
  ResultFilter::new(criteria).accepts(record)
}
