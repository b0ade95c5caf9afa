//! Reference normalization and matching.
//!
//! Identifiers arrive from two very different places: the regulator's catalog
//! (`CF-2024-01`) and text extracted from scanned logbooks (`cf 2024 01`,
//! `AD CF-2024-01`, a truncated `2024-01`). Both sides are reduced to a
//! canonical alphanumeric form before comparison.
//!
//! Matching is a heuristic. Containment handles truncated reads but can pair
//! similarly numbered references; callers must treat a match as "found in the
//! paperwork", never as a statement about the aircraft.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix tokens stripped from the front of a reference when they are
/// followed by a separator.
const PREFIX_TOKENS: [&str; 2] = ["AD", "SB"];

// ─── Normalization ───────────────────────────────────────────────────────────

/// Canonicalise a reference for comparison.
///
/// Uppercases, strips a leading `AD`/`SB` token, and drops every character
/// that is not an ASCII letter or digit. Returns an empty string when nothing
/// usable remains; an empty result never matches anything.
pub fn normalize(raw: &str) -> String {
  let upper = raw.trim().to_ascii_uppercase();
  strip_prefix_token(&upper)
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .collect()
}

fn strip_prefix_token(s: &str) -> &str {
  for token in PREFIX_TOKENS {
    if let Some(rest) = s.strip_prefix(token)
      && (rest.is_empty()
        || rest.starts_with(|c: char| c.is_whitespace() || c == ':' || c == '#'))
    {
      return rest;
    }
  }
  s
}

/// How two references matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
  /// One normalized string contains the other.
  Partial,
  /// Normalized forms are identical.
  Exact,
}

/// Compare two raw references. `None` if they do not match.
pub fn match_kind(a: &str, b: &str) -> Option<MatchKind> {
  let (a, b) = (normalize(a), normalize(b));
  match_normalized(&a, &b)
}

/// Like [`match_kind`], for inputs already passed through [`normalize`].
pub fn match_normalized(a: &str, b: &str) -> Option<MatchKind> {
  if a.is_empty() || b.is_empty() {
    return None;
  }
  if a == b {
    Some(MatchKind::Exact)
  } else if a.contains(b) || b.contains(a) {
    Some(MatchKind::Partial)
  } else {
    None
  }
}

/// `true` on exact normalized equality or containment either way.
pub fn matches(a: &str, b: &str) -> bool { match_kind(a, b).is_some() }

/// Normalize a manufacturer or model name: uppercase ASCII alphanumerics only.
pub fn normalize_name(raw: &str) -> String {
  raw
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_uppercase())
    .collect()
}

/// Normalize a registration mark (`c-gabc` → `CGABC`).
pub fn normalize_registration(raw: &str) -> String { normalize_name(raw) }

// ─── Type key ────────────────────────────────────────────────────────────────

/// The grouping key for collaborative detection:
/// `normalize(manufacturer) + "::" + normalize(model)`.
///
/// Never derived from registration, serial number, or owner, so unrelated
/// aircraft of the same make and model share detection state without sharing
/// anything that identifies their owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeKey(String);

impl TypeKey {
  const SEPARATOR: &'static str = "::";

  /// Build the key from raw names. `None` if either half normalizes empty.
  pub fn new(manufacturer: &str, model: &str) -> Option<Self> {
    let manufacturer = normalize_name(manufacturer);
    let model = normalize_name(model);
    if manufacturer.is_empty() || model.is_empty() {
      return None;
    }
    Some(Self(format!("{manufacturer}{}{model}", Self::SEPARATOR)))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for TypeKey {
  type Err = Error;

  /// Parse an already-built key. Both halves are re-normalized, so
  /// `cessna::172m` parses to `CESSNA::172M`.
  fn from_str(s: &str) -> Result<Self> {
    let (manufacturer, model) = s
      .split_once(Self::SEPARATOR)
      .ok_or_else(|| Error::InvalidIdentifier(s.to_owned()))?;
    Self::new(manufacturer, model)
      .ok_or_else(|| Error::InvalidIdentifier(s.to_owned()))
  }
}

impl TryFrom<String> for TypeKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<TypeKey> for String {
  fn from(key: TypeKey) -> Self { key.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_strips_case_and_separators() {
    assert_eq!(normalize("CF-2024-01"), "CF202401");
    assert_eq!(normalize("cf 2024 01"), "CF202401");
    assert_eq!(normalize("  cf_2024.01 "), "CF202401");
  }

  #[test]
  fn normalize_strips_prefix_tokens() {
    assert_eq!(normalize("AD CF-2024-01"), "CF202401");
    assert_eq!(normalize("sb: 172-05-01"), "1720501");
    // A prefix glued to the number is part of the reference.
    assert_eq!(normalize("SB172-05"), "SB17205");
  }

  #[test]
  fn normalize_unparsable_is_empty() {
    assert_eq!(normalize(""), "");
    assert_eq!(normalize(" -- / "), "");
    assert_eq!(normalize("AD "), "");
  }

  #[test]
  fn lowercase_evidence_matches_canonical() {
    assert!(matches("cf-2024-01", "CF-2024-01"));
    assert!(matches("cf202401", "CF-2024-01"));
    assert_eq!(match_kind("cf-2024-01", "CF-2024-01"), Some(MatchKind::Exact));
  }

  #[test]
  fn truncated_read_is_partial_match() {
    assert_eq!(match_kind("2024-01", "CF-2024-01"), Some(MatchKind::Partial));
    assert_eq!(match_kind("CF-2024-01R1", "CF-2024-01"), Some(MatchKind::Partial));
  }

  #[test]
  fn empty_never_matches() {
    assert!(!matches("", "CF-2024-01"));
    assert!(!matches("---", "CF-2024-01"));
    assert!(!matches("", ""));
  }

  #[test]
  fn different_references_do_not_match() {
    assert!(!matches("CF-2024-01", "CF-2023-07"));
  }

  #[test]
  fn type_key_normalizes_both_halves() {
    let key = TypeKey::new("Cessna Aircraft", "172-M").unwrap();
    assert_eq!(key.as_str(), "CESSNAAIRCRAFT::172M");
    assert_eq!(key, "cessna aircraft::172 m".parse().unwrap());
  }

  #[test]
  fn type_key_requires_both_halves() {
    assert!(TypeKey::new("", "172M").is_none());
    assert!(TypeKey::new("Cessna", " - ").is_none());
    assert!("CESSNA".parse::<TypeKey>().is_err());
    assert!("::172M".parse::<TypeKey>().is_err());
  }

  #[test]
  fn registration_is_normalized() {
    assert_eq!(normalize_registration("c-gabc"), "CGABC");
  }
}
