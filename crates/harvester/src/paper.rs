//! Paper records as returned by the search API.
//!
//! A [`PaperRecord`] is built once from a feed entry and never mutated afterwards. Its
//! identifier keys both the metadata line written for it and the name of its PDF file.
//!
//! # Examples
//!
//! ```
//! use harvester::paper::normalize_identifier;
//!
//! assert_eq!(normalize_identifier("http://arxiv.org/abs/2401.12345v2"), "2401.12345v2");
//! assert_eq!(normalize_identifier("http://arxiv.org/abs/math.AG/0601001v1"), "math.AG/0601001v1");
//! assert_eq!(normalize_identifier("2401.12345v2"), "2401.12345v2");
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use super::*;

/// A single paper's metadata.
///
/// Serializes to the JSON object written to the metadata file, one object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
  /// arXiv identifier including the version suffix (e.g. `2301.07041v2`)
  pub identifier:     String,
  /// Title with whitespace collapsed
  pub title:          String,
  /// Abstract with whitespace collapsed
  pub summary:        String,
  /// Author names in feed order
  pub authors:        Vec<String>,
  /// Calendar date (UTC) of the last update, used by the date-range filter
  pub last_updated:   NaiveDate,
  /// Full timestamp of the last update
  pub updated:        DateTime<Utc>,
  /// Timestamp of the first version, if the feed carried one
  pub published:      Option<DateTime<Utc>>,
  /// Abstract page URL
  pub abs_url:        String,
  /// Direct PDF link, if one is known
  pub pdf_url:        Option<String>,
  /// Category terms in feed order
  pub categories:     Vec<String>,
  /// When this record was fetched
  pub fetched_at_utc: DateTime<Utc>,
}

impl PaperRecord {
  /// The filename stem used for this paper's PDF, see [`format::safe_name`](crate::format).
  pub fn safe_name(&self) -> String { format::safe_name(&self.identifier) }

  /// The PDF filename for this paper, `<safe_name>.pdf`.
  pub fn pdf_file_name(&self) -> String { format!("{}.pdf", self.safe_name()) }
}

/// Extracts the identifier from an entry id such as `http://arxiv.org/abs/2401.12345v2`.
///
/// Old-style identifiers keep their archive prefix (`math.AG/0601001v1`). Inputs without an
/// `/abs/` segment are returned unchanged, trimmed.
pub fn normalize_identifier(entry_id: &str) -> String {
  lazy_static! {
    static ref ABS_ID: Regex = Regex::new(r"/abs/(.+?)/?$").unwrap();
  }

  let entry_id = entry_id.trim();
  ABS_ID
    .captures(entry_id)
    .and_then(|cap| cap.get(1))
    .map(|m| m.as_str().to_string())
    .unwrap_or_else(|| entry_id.to_string())
}

/// Derives the PDF link from an abstract page URL (`/abs/<id>` becomes `/pdf/<id>.pdf`).
pub fn derive_pdf_url(abs_url: &str) -> Option<String> {
  abs_url.contains("/abs/").then(|| abs_url.replacen("/abs/", "/pdf/", 1) + ".pdf")
}
