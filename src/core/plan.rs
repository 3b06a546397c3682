//! Sequential reindexing planner.
//!
//! Turns an insertion into old→new number pairs. The inserted marker takes the
//! slot of the lowest-numbered marker at or after the insertion point and every
//! such marker moves up by exactly one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::classify::InsertionContext;
use crate::core::marker::{Marker, marker_text};

/// One planned rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePlanEntry {
    pub old_marker: String,
    pub new_marker: String,
    pub old_number: u64,
    pub new_number: u64,
    /// Set only on the entry moving the inserted marker to its final number
    pub is_new_marker: bool,
    /// Text offset this entry is anchored to
    pub position: usize,
}

impl RenamePlanEntry {
    pub fn new(old_number: u64, new_number: u64, position: usize, is_new_marker: bool) -> Self {
        Self {
            old_marker: marker_text(old_number),
            new_marker: marker_text(new_number),
            old_number,
            new_number,
            is_new_marker,
            position,
        }
    }

    /// The rename undoing this one
    pub fn inverse(&self) -> Self {
        Self::new(self.new_number, self.old_number, self.position, self.is_new_marker)
    }
}

/// Ordered rename plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePlan {
    pub entries: Vec<RenamePlanEntry>,
}

/// Why a plan is unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanDefect {
    #[error("old number {0} planned more than once")]
    DuplicateOld(u64),
    #[error("new number {0} planned more than once")]
    DuplicateNew(u64),
    #[error("{0} entries flagged as the inserted marker")]
    MultipleNewMarkers(usize),
    #[error("marker [{0}] cannot shift past the largest marker number")]
    NumberOverflow(u64),
}

impl RenamePlan {
    pub fn new(entries: Vec<RenamePlanEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenamePlanEntry> {
        self.entries.iter()
    }

    /// Entry for the inserted marker, if its number changes
    pub fn new_marker_entry(&self) -> Option<&RenamePlanEntry> {
        self.entries.iter().find(|e| e.is_new_marker)
    }

    /// Verify distinct new numbers, at most one inserted-marker entry and
    /// distinct old numbers among shifted markers. The inserted marker is
    /// rewritten by position, so its old number may repeat a shifted one.
    pub fn check(&self) -> Result<(), PlanDefect> {
        let flagged = self.entries.iter().filter(|e| e.is_new_marker).count();
        if flagged > 1 {
            return Err(PlanDefect::MultipleNewMarkers(flagged));
        }

        let mut olds = HashSet::with_capacity(self.entries.len());
        let mut news = HashSet::with_capacity(self.entries.len());
        for e in &self.entries {
            if !e.is_new_marker && !olds.insert(e.old_number) {
                return Err(PlanDefect::DuplicateOld(e.old_number));
            }
            if !news.insert(e.new_number) {
                return Err(PlanDefect::DuplicateNew(e.new_number));
            }
        }
        Ok(())
    }

    /// Entries sorted by descending old number, the mandatory rewrite order
    pub fn rewrite_order(&self) -> Vec<&RenamePlanEntry> {
        let mut ordered: Vec<&RenamePlanEntry> = self.entries.iter().collect();
        ordered.sort_by(|a, b| b.old_number.cmp(&a.old_number));
        ordered
    }

    /// Plan that undoes this one
    pub fn inverse(&self) -> Self {
        Self::new(self.entries.iter().map(RenamePlanEntry::inverse).collect())
    }
}

impl<'a> IntoIterator for &'a RenamePlan {
    type Item = &'a RenamePlanEntry;
    type IntoIter = std::slice::Iter<'a, RenamePlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Build the rename plan for an insertion at `insertion_offset`.
///
/// Markers at or after the offset shift up by one; the inserted marker takes
/// the lowest shifted number. Returns an empty plan when nothing shifts, and
/// also when a marker cannot shift without overflowing.
pub fn plan_reindexing(
    markers: &[Marker],
    insertion_offset: usize,
    new_marker_number: u64,
) -> RenamePlan {
    try_plan_reindexing(markers, insertion_offset, new_marker_number).unwrap_or_else(|defect| {
        warn!(%defect, "no plan");
        RenamePlan::default()
    })
}

/// [`plan_reindexing`] that reports a marker too large to shift
pub fn try_plan_reindexing(
    markers: &[Marker],
    insertion_offset: usize,
    new_marker_number: u64,
) -> Result<RenamePlan, PlanDefect> {
    let mut to_shift: Vec<&Marker> =
        markers.iter().filter(|m| m.position >= insertion_offset).collect();
    if to_shift.is_empty() {
        return Ok(RenamePlan::default());
    }
    // Stable sort keeps positional order among equal numbers
    to_shift.sort_by_key(|m| m.number);

    let final_new_number = to_shift[0].number;
    let mut entries = Vec::with_capacity(to_shift.len() + 1);

    if new_marker_number != final_new_number {
        entries.push(RenamePlanEntry::new(
            new_marker_number,
            final_new_number,
            insertion_offset,
            true,
        ));
    }
    for m in to_shift {
        let next = m.number.checked_add(1).ok_or(PlanDefect::NumberOverflow(m.number))?;
        entries.push(RenamePlanEntry::new(m.number, next, m.position, false));
    }

    Ok(RenamePlan::new(entries))
}

/// Plan for an insertion context; the final number of the inserted marker is
/// returned alongside.
#[instrument(level = "debug", skip_all, fields(at = ctx.insertion_position))]
pub fn plan_for_context(ctx: &InsertionContext) -> Result<(RenamePlan, Option<u64>), PlanDefect> {
    let plan = try_plan_reindexing(&ctx.markers, ctx.insertion_position, ctx.new_marker_number())?;
    let final_number = final_new_marker_number(&ctx.markers, ctx.insertion_position);
    debug!(entries = plan.len(), final_number, "planned reindexing");
    Ok((plan, final_number))
}

/// Number the inserted marker ends up with, `None` when nothing shifts
pub fn final_new_marker_number(markers: &[Marker], insertion_offset: usize) -> Option<u64> {
    markers
        .iter()
        .filter(|m| m.position >= insertion_offset)
        .map(|m| m.number)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::marker::extract_all_markers;

    fn pairs(plan: &RenamePlan) -> Vec<(u64, u64, bool)> {
        plan.iter().map(|e| (e.old_number, e.new_number, e.is_new_marker)).collect()
    }

    #[test]
    fn between_markers_plan() {
        let content = "Texto [16] meio [17] final [18] fim";
        let markers = extract_all_markers(content);
        let at = content.find("[17]").unwrap() - 1;
        let plan = plan_reindexing(&markers, at, 19);
        assert_eq!(pairs(&plan), vec![(19, 17, true), (17, 18, false), (18, 19, false)]);
        assert_eq!(plan.entries[0].position, at);
        assert_eq!(plan.entries[0].old_marker, "[19]");
        assert_eq!(plan.entries[0].new_marker, "[17]");
        assert!(plan.check().is_ok());
    }

    #[test]
    fn before_first_plan_takes_lowest_number() {
        let markers = extract_all_markers("Texto [2] meio [3] final [4] fim");
        let plan = plan_reindexing(&markers, 0, 5);
        assert_eq!(
            pairs(&plan),
            vec![(5, 2, true), (2, 3, false), (3, 4, false), (4, 5, false)]
        );
        assert_eq!(final_new_marker_number(&markers, 0), Some(2));
    }

    #[test]
    fn no_entry_for_new_marker_already_in_place() {
        let markers = extract_all_markers("[1] a [2] b [3]");
        let plan = plan_reindexing(&markers, 5, 2);
        assert_eq!(pairs(&plan), vec![(2, 3, false), (3, 4, false)]);
        assert!(plan.new_marker_entry().is_none());
    }

    #[test]
    fn nothing_to_shift() {
        let markers = extract_all_markers("[1] a [2]");
        assert!(plan_reindexing(&markers, 100, 3).is_empty());
        assert!(plan_reindexing(&[], 0, 1).is_empty());
    }

    #[test]
    fn shifted_markers_sorted_by_number() {
        let markers = extract_all_markers("[1] a [4] b [3]");
        let plan = plan_reindexing(&markers, 4, 9);
        assert_eq!(pairs(&plan), vec![(9, 3, true), (3, 4, false), (4, 5, false)]);
    }

    #[test]
    fn check_flags_defects() {
        let dup_old = RenamePlan::new(vec![
            RenamePlanEntry::new(3, 4, 0, false),
            RenamePlanEntry::new(3, 5, 1, false),
        ]);
        assert_eq!(dup_old.check(), Err(PlanDefect::DuplicateOld(3)));

        let dup_new = RenamePlan::new(vec![
            RenamePlanEntry::new(3, 5, 0, false),
            RenamePlanEntry::new(4, 5, 1, false),
        ]);
        assert_eq!(dup_new.check(), Err(PlanDefect::DuplicateNew(5)));

        let two_new = RenamePlan::new(vec![
            RenamePlanEntry::new(3, 5, 0, true),
            RenamePlanEntry::new(4, 6, 1, true),
        ]);
        assert_eq!(two_new.check(), Err(PlanDefect::MultipleNewMarkers(2)));
    }

    #[test]
    fn inserted_marker_may_reuse_a_shifted_number() {
        let markers = extract_all_markers("[1] a [2] b [3]");
        let plan = plan_reindexing(&markers, 4, 3);
        assert_eq!(pairs(&plan), vec![(3, 2, true), (2, 3, false), (3, 4, false)]);
        assert!(plan.check().is_ok());
    }

    #[test]
    fn largest_number_cannot_shift() {
        let markers = extract_all_markers("a [1] x [18446744073709551615]");
        assert_eq!(
            try_plan_reindexing(&markers, 0, 5),
            Err(PlanDefect::NumberOverflow(u64::MAX))
        );
        assert!(plan_reindexing(&markers, 0, 5).is_empty());
        // Nothing after the offset, nothing to overflow
        assert!(try_plan_reindexing(&markers, 40, 5).unwrap().is_empty());
    }

    #[test]
    fn rewrite_order_is_descending() {
        let markers = extract_all_markers("[1] a [2] b [3]");
        let plan = plan_reindexing(&markers, 4, 4);
        let order: Vec<u64> = plan.rewrite_order().iter().map(|e| e.old_number).collect();
        assert_eq!(order, vec![4, 3, 2]);
    }

    #[test]
    fn inverse_swaps_numbers() {
        let e = RenamePlanEntry::new(17, 18, 9, false);
        let inv = e.inverse();
        assert_eq!((inv.old_number, inv.new_number), (18, 17));
        assert_eq!(inv.inverse(), e);
    }
}
