//! Opt-in auto-repair passes.
//!
//! Neither pass runs unless a caller asks for it. Each returns the rewritten
//! text plus a positional change list so offsets taken against the old text
//! (an insertion point, a cursor) can be carried over with [`shift_offset`].

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::marker::{Marker, extract_all_markers, marker_text};
use crate::core::plan::{RenamePlan, RenamePlanEntry};
use crate::core::validate::validate_sequential_integrity;

/// One positional edit made by a repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairChange {
    /// Byte offset in the text before the repair
    pub position: usize,
    pub old_text: String,
    /// Empty for deletions
    pub new_text: String,
}

impl RepairChange {
    fn delta(&self) -> isize {
        self.new_text.len() as isize - self.old_text.len() as isize
    }
}

/// Result of a repair pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub success: bool,
    pub content: String,
    pub changes: Vec<RepairChange>,
    /// Rename plan equivalent, when old numbers were unique
    pub plan: Option<RenamePlan>,
    pub error: Option<String>,
}

impl RepairOutcome {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Which repair passes to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairRequest {
    pub duplicates: bool,
    pub gaps: bool,
}

impl RepairRequest {
    pub fn any(&self) -> bool {
        self.duplicates || self.gaps
    }
}

/// Keep the first occurrence of each marker number and delete later ones.
pub fn fix_duplicate_markers(text: &str) -> RepairOutcome {
    let markers = extract_all_markers(text);
    let mut seen = HashSet::with_capacity(markers.len());
    let changes: Vec<RepairChange> = markers
        .iter()
        .filter(|m| !seen.insert(m.number))
        .map(|m| RepairChange {
            position: m.position,
            old_text: text[m.position..m.end_position].to_string(),
            new_text: String::new(),
        })
        .collect();

    let content = apply_changes(text, &changes);
    let remaining = validate_sequential_integrity(&content, false).stats.duplicates;
    let success = remaining.is_empty();
    if !success {
        warn!(?remaining, "duplicates survived repair");
    }
    debug!(removed = changes.len(), "duplicate markers stripped");

    RepairOutcome {
        success,
        content,
        changes,
        plan: None,
        error: (!success).then(|| format!("duplicates remain: {remaining:?}")),
    }
}

/// Renumber markers 1, 2, 3, ... in positional order.
pub fn close_sequence_gaps(text: &str) -> RepairOutcome {
    let markers = extract_all_markers(text);
    let changes: Vec<RepairChange> = markers
        .iter()
        .zip(1u64..)
        .filter(|(m, n)| m.number != *n || text[m.position..m.end_position] != m.text)
        .map(|(m, n)| RepairChange {
            position: m.position,
            old_text: text[m.position..m.end_position].to_string(),
            new_text: marker_text(n),
        })
        .collect();

    let content = apply_changes(text, &changes);
    let after: Vec<u64> = extract_all_markers(&content).iter().map(|m| m.number).collect();
    let success = after.iter().copied().eq(1..=after.len() as u64);

    debug!(renumbered = changes.len(), "sequence gaps closed");
    RepairOutcome {
        success,
        content,
        plan: renumber_plan(&markers),
        changes,
        error: (!success).then(|| "sequence still not consecutive".to_string()),
    }
}

/// Old→new pairs for a positional renumbering; `None` if old numbers repeat
fn renumber_plan(markers: &[Marker]) -> Option<RenamePlan> {
    let mut seen = HashSet::with_capacity(markers.len());
    if !markers.iter().all(|m| seen.insert(m.number)) {
        return None;
    }
    let entries = markers
        .iter()
        .zip(1u64..)
        .filter(|(m, n)| m.number != *n)
        .map(|(m, n)| RenamePlanEntry::new(m.number, n, m.position, false))
        .collect();
    Some(RenamePlan::new(entries))
}

/// Run the requested passes in order: duplicates first, then gaps.
///
/// The returned change list is expressed against the original text only for
/// the first pass run; use [`shift_offset_through`] to map offsets across all
/// passes.
pub fn run_repairs(text: &str, request: RepairRequest) -> Vec<RepairOutcome> {
    let mut outcomes = Vec::new();
    let mut current = text.to_string();
    if request.duplicates {
        let out = fix_duplicate_markers(&current);
        current = out.content.clone();
        outcomes.push(out);
    }
    if request.gaps {
        outcomes.push(close_sequence_gaps(&current));
    }
    outcomes
}

/// Map an offset in the pre-repair text to the post-repair text.
///
/// Offsets inside a changed span snap to the span's start.
pub fn shift_offset(offset: usize, changes: &[RepairChange]) -> usize {
    let mut delta: isize = 0;
    for c in changes {
        let end = c.position + c.old_text.len();
        if end <= offset {
            delta += c.delta();
        } else if c.position < offset {
            return (c.position as isize + delta).max(0) as usize;
        } else {
            break;
        }
    }
    (offset as isize + delta).max(0) as usize
}

/// [`shift_offset`] across a sequence of repair passes
pub fn shift_offset_through(offset: usize, outcomes: &[RepairOutcome]) -> usize {
    outcomes.iter().fold(offset, |at, out| shift_offset(at, &out.changes))
}

/// Apply sorted, non-overlapping positional changes
fn apply_changes(text: &str, changes: &[RepairChange]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for c in changes {
        out.push_str(&text[cursor..c.position]);
        out.push_str(&c.new_text);
        cursor = c.position + c.old_text.len();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_later_duplicates() {
        let out = fix_duplicate_markers("a [1] b [2] c [1] d [2]");
        assert!(out.success);
        assert_eq!(out.content, "a [1] b [2] c  d ");
        assert_eq!(out.changes.len(), 2);
        assert_eq!(out.changes[0].position, 14);
    }

    #[test]
    fn closes_gaps_positionally() {
        let out = close_sequence_gaps("x [3] y [7] z [9]");
        assert!(out.success);
        assert_eq!(out.content, "x [1] y [2] z [3]");
        let plan = out.plan.unwrap();
        let pairs: Vec<_> = plan.iter().map(|e| (e.old_number, e.new_number)).collect();
        assert_eq!(pairs, vec![(3, 1), (7, 2), (9, 3)]);
    }

    #[test]
    fn gap_close_with_duplicates_has_no_plan() {
        let out = close_sequence_gaps("[2] [2] [5]");
        assert!(out.success);
        assert_eq!(out.content, "[1] [2] [3]");
        assert!(out.plan.is_none());
    }

    #[test]
    fn already_clean_text_is_untouched() {
        let out = close_sequence_gaps("[1] a [2]");
        assert!(!out.changed());
        assert_eq!(out.content, "[1] a [2]");
        assert!(fix_duplicate_markers("").success);
    }

    #[test]
    fn offsets_follow_repairs() {
        let text = "[9] ab [10] cd";
        let out = close_sequence_gaps(text);
        assert_eq!(out.content, "[1] ab [2] cd");
        let cd = text.find("cd").unwrap();
        assert_eq!(&out.content[shift_offset(cd, &out.changes)..], "cd");
        // Inside a changed span snaps to its start
        assert_eq!(shift_offset(8, &out.changes), 7);
        assert_eq!(shift_offset(0, &out.changes), 0);
    }

    #[test]
    fn run_repairs_chains_passes() {
        let text = "[4] a [4] b [6] tail";
        let outs = run_repairs(text, RepairRequest { duplicates: true, gaps: true });
        assert_eq!(outs.len(), 2);
        assert_eq!(outs[1].content, "[1] a  b [2] tail");
        let tail = text.find("tail").unwrap();
        assert_eq!(&outs[1].content[shift_offset_through(tail, &outs)..], "tail");
    }
}
