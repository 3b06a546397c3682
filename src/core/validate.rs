//! Sequential integrity validation.
//!
//! Errors make a result invalid; warnings never do. Duplicates are always
//! errors. Strict mode additionally requires the sequence to start at 1 and to
//! have no gaps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::mapping::ReferenceMapping;
use crate::core::marker::{MARKER_RE, Marker, extract_all_markers, is_marker_token};
use crate::core::plan::RenamePlan;

/// Cap on missing numbers listed per gap
const MAX_LISTED_MISSING: usize = 32;

/// Bracketed numbers that are almost markers: padded, zero-prefixed, or too large
static NEAR_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*[0-9]+\s*\]").expect("near-marker pattern compiles"));

/// A jump in the de-duplicated, sorted sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub after: u64,
    pub before: u64,
    /// Missing numbers, truncated to a bounded listing
    pub missing: Vec<u64>,
    pub missing_count: u64,
}

/// Derived sequence statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub total: usize,
    /// Numbers in positional order
    pub sequence: Vec<u64>,
    pub duplicates: Vec<u64>,
    pub gaps: Vec<Gap>,
    /// Lowest number present
    pub first_number: Option<u64>,
    /// Highest number present
    pub last_number: Option<u64>,
}

/// Result of an integrity check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
    pub stats: SequenceStats,
}

impl ValidationResult {
    fn seal(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }

    /// Fold another report's messages into this one
    pub fn absorb(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
        self.is_valid = self.errors.is_empty();
    }
}

/// Validate the marker sequence in `text`.
pub fn validate_sequential_integrity(text: &str, strict_mode: bool) -> ValidationResult {
    let markers = extract_all_markers(text);
    validate_markers(&markers, strict_mode)
}

/// Validate an already scanned marker list
pub fn validate_markers(markers: &[Marker], strict_mode: bool) -> ValidationResult {
    let mut report = ValidationResult::default();

    if markers.is_empty() {
        report.info.push("no markers found".to_string());
        return report.seal();
    }

    let sequence: Vec<u64> = markers.iter().map(|m| m.number).collect();
    let counts = sequence.iter().counts();
    let duplicates: Vec<u64> = counts
        .iter()
        .filter(|(_, c)| **c > 1)
        .map(|(n, _)| **n)
        .sorted()
        .collect();
    for n in &duplicates {
        report
            .errors
            .push(format!("duplicate marker [{n}] appears {} times", counts[&n]));
    }

    let unique: Vec<u64> = sequence.iter().copied().sorted().dedup().collect();
    let first_number = unique.first().copied();
    let last_number = unique.last().copied();

    if strict_mode {
        if let Some(first) = first_number {
            if first != 1 {
                report
                    .errors
                    .push(format!("sequence starts at [{first}] instead of [1]"));
            }
        }
    }

    let gaps: Vec<Gap> = unique
        .iter()
        .tuple_windows()
        .filter(|(a, b)| **b > **a + 1)
        .map(|(a, b)| Gap {
            after: *a,
            before: *b,
            missing: (*a + 1..*b).take(MAX_LISTED_MISSING).collect(),
            missing_count: b - a - 1,
        })
        .collect();
    for gap in &gaps {
        let listed = gap.missing.iter().map(|n| format!("[{n}]")).join(", ");
        let more = if gap.missing_count as usize > gap.missing.len() { ", ..." } else { "" };
        let msg = format!(
            "gap between [{}] and [{}]: missing {listed}{more}",
            gap.after, gap.before
        );
        if strict_mode {
            report.errors.push(msg);
        } else {
            report.warnings.push(msg);
        }
    }

    for (prev, cur) in markers.iter().tuple_windows() {
        if prev.number > cur.number {
            report.warnings.push(format!(
                "out of order: {} at {} precedes {} at {}",
                prev.text, prev.position, cur.text, cur.position
            ));
        }
    }

    report.stats = SequenceStats {
        total: markers.len(),
        sequence,
        duplicates,
        gaps,
        first_number,
        last_number,
    };

    debug!(
        strict_mode,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "sequence validated"
    );
    report.seal()
}

/// Compare content markers against the reference mapping.
///
/// Orphans (in content, not mapped) and missing entries (mapped, not in
/// content) are warnings; broken bidirectional pairs are errors.
pub fn check_mapping_consistency(text: &str, mapping: &ReferenceMapping) -> ValidationResult {
    let mut report = ValidationResult::default();

    let in_content: BTreeSet<String> =
        extract_all_markers(text).into_iter().map(|m| m.text).collect();
    let in_mapping: BTreeSet<String> = mapping.marker_keys().map(str::to_string).collect();

    for orphan in in_content.difference(&in_mapping) {
        report.warnings.push(format!("orphan marker {orphan}: present in content but not mapped"));
    }
    for missing in in_mapping.difference(&in_content) {
        report.warnings.push(format!("missing marker {missing}: mapped but absent from content"));
    }
    for breakage in mapping.bidirectional_violations() {
        report.errors.push(breakage);
    }

    report.seal()
}

/// Verify a plan actually landed: planned old markers gone (unless reused as a
/// new marker) and planned new markers present.
pub fn check_rewrite_accuracy(text: &str, plan: &RenamePlan) -> ValidationResult {
    let mut report = ValidationResult::default();
    let present: BTreeSet<u64> = extract_all_markers(text).into_iter().map(|m| m.number).collect();
    let new_numbers: BTreeSet<u64> = plan.iter().map(|e| e.new_number).collect();

    for entry in plan {
        if present.contains(&entry.old_number) && !new_numbers.contains(&entry.old_number) {
            report
                .errors
                .push(format!("{} still present after rename to {}", entry.old_marker, entry.new_marker));
        }
        if !present.contains(&entry.new_number) {
            report
                .errors
                .push(format!("{} missing after rename from {}", entry.new_marker, entry.old_marker));
        }
    }

    report.seal()
}

/// Flag malformed bracket contents (warnings) and residual duplicates (errors)
pub fn check_well_formedness(text: &str) -> ValidationResult {
    let mut report = ValidationResult::default();

    for m in NEAR_MARKER_RE.find_iter(text) {
        if !is_marker_token(m.as_str()) || has_leading_zero(m.as_str()) {
            report
                .warnings
                .push(format!("malformed marker {:?} at {}", m.as_str(), m.start()));
        }
    }

    let mut positions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for m in MARKER_RE.find_iter(text) {
        positions.entry(m.as_str()).or_default().push(m.start());
    }
    for (marker, at) in positions.iter().filter(|(_, at)| at.len() > 1) {
        report
            .errors
            .push(format!("residual duplicate {marker} at offsets {at:?}"));
    }

    report.seal()
}

fn has_leading_zero(token: &str) -> bool {
    token.len() > 3 && token.as_bytes()[1] == b'0'
}

/// Everything the orchestrator checks after applying a rewrite
pub fn validate_after_reindex(
    text: &str,
    mapping: &ReferenceMapping,
    plan: &RenamePlan,
    strict_mode: bool,
) -> ValidationResult {
    let mut report = validate_sequential_integrity(text, strict_mode);
    report.absorb(check_mapping_consistency(text, mapping));
    report.absorb(check_rewrite_accuracy(text, plan));
    report.absorb(check_well_formedness(text));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::RenamePlanEntry;

    #[test]
    fn gap_is_strict_error_but_lenient_warning() {
        let content = "[1] a [3] b";
        let strict = validate_sequential_integrity(content, true);
        let lenient = validate_sequential_integrity(content, false);
        assert!(!strict.is_valid);
        assert!(lenient.is_valid);
        assert_eq!(lenient.warnings.len(), 1);
        assert_eq!(lenient.stats.gaps[0].missing, vec![2]);
    }

    #[test]
    fn duplicates_fail_in_both_modes() {
        for strict in [true, false] {
            let r = validate_sequential_integrity("[1] a [1] b", strict);
            assert!(!r.is_valid);
            assert_eq!(r.stats.duplicates, vec![1]);
        }
    }

    #[test]
    fn strict_requires_start_at_one() {
        let r = validate_sequential_integrity("[2] [3]", true);
        assert!(!r.is_valid);
        assert!(r.errors[0].contains("starts at [2]"));
        assert!(validate_sequential_integrity("[2] [3]", false).is_valid);
    }

    #[test]
    fn order_anomaly_is_only_a_warning() {
        let r = validate_sequential_integrity("[2] a [1]", true);
        assert!(r.is_valid);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("[2] at 0 precedes [1] at 6"));
    }

    #[test]
    fn empty_text_is_valid() {
        let r = validate_sequential_integrity("", true);
        assert!(r.is_valid);
        assert_eq!(r.info, vec!["no markers found".to_string()]);
        assert_eq!(r.stats, SequenceStats::default());
    }

    #[test]
    fn huge_gap_listing_is_bounded() {
        let r = validate_sequential_integrity("[1] [1000]", false);
        let gap = &r.stats.gaps[0];
        assert_eq!(gap.missing.len(), MAX_LISTED_MISSING);
        assert_eq!(gap.missing_count, 998);
        assert!(r.warnings[0].ends_with(", ..."));
    }

    #[test]
    fn stats_snapshot() {
        let r = validate_sequential_integrity("[1] x [4] y [3] z [3]", false);
        assert!(!r.is_valid);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(r.warnings.len(), 2);
        insta::assert_yaml_snapshot!(r.stats, @r"
        total: 4
        sequence:
          - 1
          - 4
          - 3
          - 3
        duplicates:
          - 3
        gaps:
          - after: 1
            before: 3
            missing:
              - 2
            missing_count: 1
        first_number: 1
        last_number: 4
        ");
    }

    #[test]
    fn rewrite_accuracy_tolerates_chained_numbers() {
        let plan = RenamePlan::new(vec![
            RenamePlanEntry::new(17, 18, 0, false),
            RenamePlanEntry::new(18, 19, 0, false),
        ]);
        assert!(check_rewrite_accuracy("[16] [18] [19]", &plan).is_valid);
        let bad = check_rewrite_accuracy("[16] [17] [19]", &plan);
        assert!(!bad.is_valid);
        assert!(bad.errors.iter().any(|e| e.contains("[17] still present")));
        assert!(bad.errors.iter().any(|e| e.contains("[18] missing")));
    }

    #[test]
    fn well_formedness_flags_padding_and_duplicates() {
        let r = check_well_formedness("[ 3] and [04] and [5] [5]");
        assert!(!r.is_valid);
        assert_eq!(r.warnings.len(), 2);
        assert!(r.errors[0].contains("[5]"));
    }

    #[test]
    fn mapping_consistency_warns_and_errors() {
        let mut mapping = ReferenceMapping::new();
        mapping.link("Alpha", "[1]");
        mapping.link("Beta", "[9]");
        let r = check_mapping_consistency("[1] [2]", &mapping);
        assert!(r.is_valid);
        assert_eq!(r.warnings.len(), 2);

        mapping.insert_raw("Gamma", "[1]");
        let broken = check_mapping_consistency("[1] [2]", &mapping);
        assert!(!broken.is_valid);
    }
}
