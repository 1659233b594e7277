//! Text formatting utilities for feed text and filenames.
//!
//! Atom feeds wrap long titles and abstracts over several lines, and arXiv identifiers may
//! contain characters that are not legal in filenames (old-style ids such as
//! `math.AG/0601001v1` carry a slash). This module normalizes both.
//!
//! # Examples
//!
//! ```
//! use harvester::format;
//!
//! assert_eq!(format::collapse_whitespace("Attention\n  Is All\tYou Need"), "Attention Is All You Need");
//! assert_eq!(format::safe_name("math.AG/0601001v1"), "math.AG_0601001v1");
//! assert_eq!(format::safe_name("1234.5678v1"), "1234.5678v1");
//! ```

/// Characters replaced by [`safe_name`] in addition to whitespace and control characters.
const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Collapses every run of whitespace (including newlines) into a single space and trims the
/// ends.
pub fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Turns a paper identifier into a filesystem-legal filename stem.
///
/// The transform is deterministic, so the same identifier always maps to the same file:
/// - Path separators and characters reserved on common filesystems become `_`
/// - Whitespace and control characters become `_`
/// - A stem made only of dots (or an empty one) is replaced by underscores so it can never
///   name the current or parent directory
///
/// # Examples
///
/// ```
/// use harvester::format::safe_name;
///
/// assert_eq!(safe_name("2301.07041v2"), "2301.07041v2");
/// assert_eq!(safe_name("hep-th/9901001"), "hep-th_9901001");
/// assert_eq!(safe_name(".."), "__");
/// ```
pub fn safe_name(identifier: &str) -> String {
  let name: String = identifier
    .trim()
    .chars()
    .map(|c| if c.is_whitespace() || c.is_control() || RESERVED.contains(&c) { '_' } else { c })
    .collect();

  if name.trim_matches('.').is_empty() {
    return "_".repeat(name.chars().count().max(1));
  }
  name
}
