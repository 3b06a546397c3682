//! Insertion classification against scanned markers.
//!
//! Classifies where an insertion landed relative to the existing markers and
//! decides whether the tail of the sequence must shift.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::core::marker::{Marker, extract_all_markers, parse_marker_token};

/// Where an insertion landed relative to existing markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionKind {
    NoMarkers,
    BeforeFirst,
    BetweenMarkers,
    AfterLast,
    InsideMarker,
    Unclassified,
}

/// Classification of one insertion event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionClassification {
    pub kind: InsertionKind,
    pub before_marker: Option<Marker>,
    pub after_marker: Option<Marker>,
    pub needs_reindexing: bool,
    /// Markers whose number must increase, in positional order
    pub affected_markers: Vec<Marker>,
}

impl InsertionClassification {
    fn quiet(kind: InsertionKind) -> Self {
        Self {
            kind,
            before_marker: None,
            after_marker: None,
            needs_reindexing: false,
            affected_markers: Vec::new(),
        }
    }
}

/// Classify an insertion at `offset` against markers sorted by position.
///
/// Rules are evaluated in order; the first match wins.
pub fn classify_insertion(offset: usize, markers: &[Marker]) -> InsertionClassification {
    let (Some(first), Some(last)) = (markers.first(), markers.last()) else {
        return InsertionClassification::quiet(InsertionKind::NoMarkers);
    };

    if offset < first.position {
        return InsertionClassification {
            kind: InsertionKind::BeforeFirst,
            before_marker: None,
            after_marker: Some(first.clone()),
            needs_reindexing: true,
            affected_markers: markers.to_vec(),
        };
    }

    // Appending past the tail never breaks ordering
    if offset > last.end_position {
        return InsertionClassification {
            before_marker: Some(last.clone()),
            ..InsertionClassification::quiet(InsertionKind::AfterLast)
        };
    }

    for (i, pair) in markers.windows(2).enumerate() {
        let (cur, next) = (&pair[0], &pair[1]);
        if cur.end_position < offset && offset < next.position {
            return InsertionClassification {
                kind: InsertionKind::BetweenMarkers,
                before_marker: Some(cur.clone()),
                after_marker: Some(next.clone()),
                needs_reindexing: true,
                affected_markers: markers[i + 1..].to_vec(),
            };
        }
    }

    if let Some(hit) = markers.iter().find(|m| m.contains(offset)) {
        trace!(marker = %hit, offset, "insertion touches an existing marker");
        return InsertionClassification {
            before_marker: Some(hit.clone()),
            ..InsertionClassification::quiet(InsertionKind::InsideMarker)
        };
    }

    InsertionClassification::quiet(InsertionKind::Unclassified)
}

/// Everything the reindexing pipeline needs to know about one insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionContext {
    /// Byte offset where the new marker was inserted
    pub insertion_position: usize,
    /// The inserted marker, anchored at `insertion_position`
    pub new_marker: Marker,
    /// Existing markers, excluding the inserted one
    pub markers: Vec<Marker>,
    pub classification: InsertionClassification,
}

impl InsertionContext {
    pub fn new_marker_number(&self) -> u64 {
        self.new_marker.number
    }

    pub fn needs_reindexing(&self) -> bool {
        self.classification.needs_reindexing
    }
}

/// Detect whether inserting `new_marker_text` at `insertion_position` requires
/// reindexing.
///
/// `content` may or may not already contain the new marker; an occurrence of it
/// sitting exactly at `insertion_position` is treated as the inserted marker and
/// left out of the scan. Returns `None` for unusable input and for insertions
/// that need no renumbering.
#[instrument(level = "debug", skip(content), fields(len = content.len()))]
pub fn detect_insertion_between_markers(
    content: &str,
    insertion_position: usize,
    new_marker_text: &str,
) -> Option<InsertionContext> {
    let ctx = build_insertion_context(content, insertion_position, new_marker_text)?;
    if !ctx.needs_reindexing() {
        debug!(kind = ?ctx.classification.kind, "no reindexing needed");
        return None;
    }
    debug!(
        kind = ?ctx.classification.kind,
        affected = ctx.classification.affected_markers.len(),
        "insertion requires reindexing"
    );
    Some(ctx)
}

/// Same as [`detect_insertion_between_markers`] but also returns contexts that
/// need no reindexing.
pub fn build_insertion_context(
    content: &str,
    insertion_position: usize,
    new_marker_text: &str,
) -> Option<InsertionContext> {
    let Some(number) = parse_marker_token(new_marker_text) else {
        debug!(token = new_marker_text, "rejecting malformed new marker");
        return None;
    };
    if insertion_position > content.len() || !content.is_char_boundary(insertion_position) {
        debug!(insertion_position, "insertion offset outside buffer");
        return None;
    }

    let new_marker = Marker::new(number, insertion_position);
    let markers: Vec<Marker> = extract_all_markers(content)
        .into_iter()
        .filter(|m| !(m.position == insertion_position && m.number == number))
        .collect();
    let classification = classify_insertion(insertion_position, &markers);

    Some(InsertionContext { insertion_position, new_marker, markers, classification })
}
