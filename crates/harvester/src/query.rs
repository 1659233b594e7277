//! Remote search query construction.
//!
//! Keywords are matched against every searchable field through arXiv's `all:` prefix and
//! quoted so multi-word keywords stay phrases; categories use the `cat:` prefix. Title
//! expressions and the date range never reach the server. They are applied by
//! [`ResultFilter`](crate::filter::ResultFilter) after each page arrives.
//!
//! # Examples
//!
//! ```
//! use harvester::{criteria::SearchCriteria, query::build_query};
//!
//! let criteria = SearchCriteria {
//!   keywords: vec!["large language model".into(), "LLM".into()],
//!   categories: ["cs.CL".to_string(), "cs.AI".to_string()].into(),
//!   ..Default::default()
//! };
//!
//! let query = build_query(&criteria).unwrap();
//! assert_eq!(
//!   query.as_str(),
//!   r#"(all:"large language model" OR all:"LLM") AND (cat:cs.AI OR cat:cs.CL)"#
//! );
//! ```

use super::*;

/// A search query string in arXiv's field-search syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
  /// The raw query string, before URL encoding.
  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for SearchQuery {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Builds the remote query for `criteria`.
///
/// Blank keywords and categories are ignored. Fails with [`HarvestError::Configuration`] when
/// nothing is left to search for.
pub fn build_query(criteria: &SearchCriteria) -> Result<SearchQuery> {
  let keywords: Vec<String> = criteria
    .keywords
    .iter()
    .map(|kw| kw.trim())
    .filter(|kw| !kw.is_empty())
    .map(|kw| format!("all:\"{}\"", kw.replace('"', "")))
    .collect();

  let categories: Vec<String> = criteria
    .categories
    .iter()
    .map(|cat| cat.trim())
    .filter(|cat| !cat.is_empty())
    .map(|cat| format!("cat:{cat}"))
    .collect();

  let keyword_join = match criteria.keyword_match {
    MatchPolicy::AllOf => " AND ",
    MatchPolicy::AnyOf => " OR ",
  };

  let query = match (keywords.is_empty(), categories.is_empty()) {
    (true, true) =>
      return Err(HarvestError::Configuration(
        "at least one keyword or category is required".into(),
      )),
    (false, true) => format!("({})", keywords.join(keyword_join)),
    (true, false) => format!("({})", categories.join(" OR ")),
    (false, false) => format!("({}) AND ({})", keywords.join(keyword_join), categories.join(" OR ")),
  };

  debug!("Built search query: {query}");
  Ok(SearchQuery(query))
}
