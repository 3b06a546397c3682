//! Property tests for detection, planning, rewriting and mapping updates.

use proptest::prelude::*;
use refmark::core::{
    classify::{InsertionKind, build_insertion_context, detect_insertion_between_markers},
    mapping::{ReferenceMapping, update_reference_mapping},
    marker::{extract_all_markers, is_marker_token, marker_numbers},
    plan::plan_reindexing,
    reindex::reindex_markers_after_insertion,
};

/// Distinct marker numbers in arbitrary order
fn distinct_numbers() -> impl Strategy<Value = Vec<u64>>
{
    prop::collection::hash_set(1u64..200, 1..12)
        .prop_map(|s| s.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Render numbers as "w [n] w [m] ..." with filler words between markers
fn render(numbers: &[u64]) -> String
{
    numbers
        .iter()
        .map(|n| format!("w [{n}]"))
        .collect::<Vec<_>>()
        .join(" ")
}

proptest! {
    #[test]
    fn insert_after_last_marker_never_reindexes(
        numbers in distinct_numbers(),
        tail in "[a-z ]{1,12}",
        new in 1u64..300,
    ) {
        let body = format!("{} {}", render(&numbers), tail);
        let last_end = extract_all_markers(&body).last().unwrap().end_position;
        let at = body.len();
        prop_assume!(at > last_end);

        let content = format!("{body}[{new}]");
        let new_marker = format!("[{new}]");
        prop_assert!(detect_insertion_between_markers(&content, at, &new_marker).is_none());
    }

    #[test]
    fn renumbered_set_is_shifted_plus_final(
        numbers in distinct_numbers(),
        new in 1u64..300,
    ) {
        // New marker in front of every existing one, so all of them shift
        let content = format!("[{new}] {}", render(&numbers));
        let ctx = build_insertion_context(&content, 0, &format!("[{new}]")).unwrap();
        prop_assert!(ctx.needs_reindexing());

        let out = reindex_markers_after_insertion(&content, &ctx).unwrap();
        let min = *numbers.iter().min().unwrap();
        prop_assert_eq!(out.final_new_marker_number, Some(min));

        let mut got = marker_numbers(&extract_all_markers(&out.new_content));
        got.sort_unstable();
        let mut want: Vec<u64> = numbers.iter().map(|n| n + 1).chain([min]).collect();
        want.sort_unstable();
        prop_assert_eq!(&got, &want);

        let mut dedup = got.clone();
        dedup.dedup();
        prop_assert_eq!(dedup.len(), got.len());
    }

    #[test]
    fn only_the_tail_shifts_between_markers(
        numbers in distinct_numbers(),
        cut in 1usize..12,
        new in 1u64..300,
    ) {
        prop_assume!(cut < numbers.len());
        let body = render(&numbers);
        let at = extract_all_markers(&body)[cut].position;
        let content = format!("{}[{new}] {}", &body[..at], &body[at..]);

        let ctx = detect_insertion_between_markers(&content, at, &format!("[{new}]")).unwrap();
        prop_assert_eq!(ctx.classification.kind, InsertionKind::BetweenMarkers);

        let out = reindex_markers_after_insertion(&content, &ctx).unwrap();
        let tail = &numbers[cut..];
        let min = *tail.iter().min().unwrap();
        prop_assert_eq!(out.final_new_marker_number, Some(min));

        // Everything before the insertion point is untouched
        prop_assert_eq!(&out.new_content[..at], &content[..at]);

        let mut got: Vec<u64> = extract_all_markers(&out.new_content)
            .into_iter()
            .filter(|m| m.position >= at)
            .map(|m| m.number)
            .collect();
        got.sort_unstable();
        let mut want: Vec<u64> = tail.iter().map(|n| n + 1).chain([min]).collect();
        want.sort_unstable();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn shifts_never_hit_pending_old_numbers(
        numbers in distinct_numbers(),
        cut in 0usize..12,
        new in 1u64..300,
    ) {
        let content = render(&numbers);
        let markers = extract_all_markers(&content);
        let at = markers.get(cut).map(|m| m.position).unwrap_or(content.len());
        let plan = plan_reindexing(&markers, at, new);

        let order: Vec<_> = plan.rewrite_order().into_iter().filter(|e| !e.is_new_marker).collect();
        for (i, step) in order.iter().enumerate() {
            for pending in &order[i + 1..] {
                prop_assert_ne!(step.new_number, pending.old_number);
            }
        }
        prop_assert!(plan.check().is_ok());
    }

    #[test]
    fn mapping_update_stays_bidirectional(
        numbers in distinct_numbers(),
        cut in 0usize..12,
        new in 1u64..300,
    ) {
        let content = render(&numbers);
        let markers = extract_all_markers(&content);
        let mapping: ReferenceMapping = numbers
            .iter()
            .map(|n| (format!("Title {n}"), format!("[{n}]")))
            .collect();
        prop_assert!(mapping.is_bidirectional());

        let at = markers.get(cut).map(|m| m.position).unwrap_or(content.len());
        let plan = plan_reindexing(&markers, at, new);
        let next = update_reference_mapping(&mapping, &plan);

        for (k, v) in next.iter() {
            if is_marker_token(v) {
                prop_assert_eq!(next.get(v), Some(k));
            }
        }
        prop_assert!(next.is_bidirectional());
    }
}
