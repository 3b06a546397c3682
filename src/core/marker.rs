//! Inline reference marker scanning.
//!
//! A marker is `[` + ASCII digits + `]`. Offsets are UTF-8 byte offsets into
//! the scanned buffer; since markers are pure ASCII, `end_position - position`
//! always equals the marker's text length.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Exact marker syntax, digits only
pub(crate) static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([0-9]+)\]").expect("marker pattern compiles"));

/// Anchored form used to validate standalone marker tokens
static MARKER_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([0-9]+)\]$").expect("marker token pattern compiles"));

/// One marker occurrence in a text buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marker {
    /// Number inside the brackets
    pub number: u64,
    /// Canonical rendering, always `[number]`
    pub text: String,
    /// Byte offset of `[`
    pub position: usize,
    /// Byte offset just past `]`
    pub end_position: usize,
}

impl Marker {
    pub fn new(number: u64, position: usize) -> Self {
        let text = marker_text(number);
        let end_position = position + text.len();
        Self { number, text, position, end_position }
    }

    /// True when `offset` lies on or inside this marker's brackets
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.position && offset <= self.end_position
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.position)
    }
}

/// Render `n` as marker text
pub fn marker_text(n: u64) -> String {
    format!("[{n}]")
}

/// Parse a standalone `[n]` token; anything else (padding, signs, letters) is rejected
pub fn parse_marker_token(token: &str) -> Option<u64> {
    MARKER_TOKEN_RE
        .captures(token)
        .and_then(|c| c[1].parse::<u64>().ok())
}

/// True when `s` is exactly one marker token
pub fn is_marker_token(s: &str) -> bool {
    parse_marker_token(s).is_some()
}

/// Extract every marker from `text` in left-to-right order.
///
/// Duplicate numbers are kept as separate entries. Bracketed digit runs that
/// overflow `u64` are skipped; the well-formedness check reports those.
pub fn extract_all_markers(text: &str) -> Vec<Marker> {
    // Markerless text is the common case for fresh documents
    if memchr::memchr(b'[', text.as_bytes()).is_none() {
        return Vec::new();
    }

    MARKER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps[1].parse::<u64>().ok()?;
            Some(Marker {
                number,
                text: marker_text(number),
                position: whole.start(),
                end_position: whole.end(),
            })
        })
        .collect()
}

/// Numbers of all markers, in positional order
pub fn marker_numbers(markers: &[Marker]) -> Vec<u64> {
    markers.iter().map(|m| m.number).collect()
}
