//! Semantic version tags attached to build units.
//!
//! A [`VersionTag`] is a `(major, minor, revision)` triple ordered
//! lexicographically. Its text form zero-pads each field to two digits
//! (`01.02.00`) and is used as part of ledger entry identity. The numeric
//! fields are authoritative for ordering: fields above 99 still compare
//! correctly but their text form no longer sorts alongside two-digit values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`VersionTag`] from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  /// A field was negative.
  #[error("version field {field} must be non-negative, got {value}")]
  Negative { field: &'static str, value: i64 },

  /// A field does not fit in 32 bits.
  #[error("version field {field} is too large: {value}")]
  Overflow { field: &'static str, value: i64 },

  /// Text did not match `major.minor.revision`.
  #[error("invalid version '{0}': expected major.minor.revision")]
  Parse(String),
}

/// Immutable, totally-ordered `(major, minor, revision)` identifier.
///
/// Field order matters: the derived `Ord` compares `major`, then `minor`,
/// then `revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionTag {
  major: u32,
  minor: u32,
  revision: u32,
}

impl VersionTag {
  pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
    Self { major, minor, revision }
  }

  pub fn major(&self) -> u32 {
    self.major
  }

  pub fn minor(&self) -> u32 {
    self.minor
  }

  pub fn revision(&self) -> u32 {
    self.revision
  }

  /// True iff `self` is strictly greater than `other`.
  pub fn is_higher_than(&self, other: &VersionTag) -> bool {
    self > other
  }
}

impl fmt::Display for VersionTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}.{:02}.{:02}", self.major, self.minor, self.revision)
  }
}

fn checked_field(field: &'static str, value: i64) -> Result<u32, VersionError> {
  if value < 0 {
    return Err(VersionError::Negative { field, value });
  }
  u32::try_from(value).map_err(|_| VersionError::Overflow { field, value })
}

impl TryFrom<(i64, i64, i64)> for VersionTag {
  type Error = VersionError;

  fn try_from((major, minor, revision): (i64, i64, i64)) -> Result<Self, Self::Error> {
    Ok(Self::new(
      checked_field("major", major)?,
      checked_field("minor", minor)?,
      checked_field("revision", revision)?,
    ))
  }
}

impl FromStr for VersionTag {
  type Err = VersionError;

  /// Accepts both `1.2.3` and the padded `01.02.03` form.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parse_err = || VersionError::Parse(s.to_string());

    let mut fields = s.trim().split('.');
    let mut next = || -> Result<u32, VersionError> {
      let part = fields.next().ok_or_else(parse_err)?;
      if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_err());
      }
      part.parse::<u32>().map_err(|_| parse_err())
    };

    let tag = Self::new(next()?, next()?, next()?);
    if fields.next().is_some() {
      return Err(parse_err());
    }
    Ok(tag)
  }
}
