//! Dotted path parsing.
//!
//! A path like `"servers.0.host"` splits strictly on `'.'`; each piece that
//! parses as a non-negative integer becomes an index segment, everything
//! else a label. The conversion is syntactic only: `"05"` parses as index 5.
//! This is intentional, documented behavior, not something to normalize
//! away.

use std::borrow::Cow;
use std::fmt;

use itertools::Itertools;

/// One resolved piece of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Non-negative position in a sequence.
    Index(usize),
    /// Key in a mapping.
    Label(String),
}

impl Segment {
    /// The string form used when this segment addresses a mapping.
    /// Index segments address the decimal string key, so `get("a.0")` finds
    /// an entry stored under the mapping key `"0"`.
    pub fn map_key(&self) -> Cow<'_, str> {
        match self {
            Segment::Label(label) => Cow::Borrowed(label.as_str()),
            Segment::Index(index) => Cow::Owned(index.to_string()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(index) => write!(f, "{}", index),
            Segment::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Parse a dotted path into segments.
///
/// Pure and infallible. The empty string yields a single empty-label
/// segment, not an empty vector; mutating callers reject the empty path
/// before parsing.
pub fn parse(path: &str) -> Vec<Segment> {
    path.split('.')
        .map(|piece| match piece.parse::<usize>() {
            Ok(index) => Segment::Index(index),
            Err(_) => Segment::Label(piece.to_string()),
        })
        .collect()
}

/// Join segments back into a dotted string, used for error diagnostics.
pub fn join(segments: &[Segment]) -> String {
    segments.iter().join(".")
}
