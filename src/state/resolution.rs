/// Resolution state definitions for ledger records
///
/// A URL is resolved exactly once per pair. The resolution records whether
/// the page was fetched, failed, or only cross-referenced.
use crate::catalog::Pair;
use std::fmt;

/// How a URL was resolved under a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Page was fetched, extracted and written to a shard
    Fetched,

    /// Fetch, extraction or shard write failed; not retried automatically
    Failed,

    /// URL was already owned by another pair; a placeholder was written
    CrossReference,
}

impl Resolution {
    /// Returns true if the page content was captured
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Converts the resolution to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Failed => "failed",
            Self::CrossReference => "cross_reference",
        }
    }

    /// Parses a resolution from its database string representation
    ///
    /// Returns None if the string doesn't match any known resolution.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "failed" => Some(Self::Failed),
            "cross_reference" => Some(Self::CrossReference),
            _ => None,
        }
    }

    /// Returns all possible resolutions
    pub fn all() -> [Self; 3] {
        [Self::Fetched, Self::Failed, Self::CrossReference]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// What the ledger knows about a URL, asked relative to one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    /// Never resolved; the URL needs fetching
    New,

    /// Already resolved under the pair being asked about; skip it
    SameCategory,

    /// Resolved under a different pair; record a cross-reference instead of
    /// fetching again
    CrossCategory { owner: Pair },
}

impl LedgerStatus {
    /// Returns true if the URL still needs a fetch
    pub fn needs_fetch(&self) -> bool {
        matches!(self, Self::New)
    }
}
