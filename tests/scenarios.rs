//! End-to-end reindexing scenarios through the public library API.

use refmark::core::{
    BufferEditor, EditorAdapter, EditorError, ReferenceMapping,
    classify::{InsertionKind, detect_insertion_between_markers},
    marker::{extract_all_markers, marker_numbers},
    orchestrator::{RecoveryOptions, Reindexer, execute_reindexing_with_full_error_handling},
    reindex::reindex_markers_after_insertion,
    repair::RepairRequest,
    validate::validate_sequential_integrity,
};

fn mapping(pairs: &[(&str, &str)]) -> ReferenceMapping
{
    pairs
        .iter()
        .map(|(t, m)| (t.to_string(), m.to_string()))
        .collect()
}

fn sorted_numbers(text: &str) -> Vec<u64>
{
    let mut n = marker_numbers(&extract_all_markers(text));
    n.sort_unstable();
    n
}

#[test]
fn insert_between_high_numbers()
{
    let before = "Texto [16] meio [17] final [18] fim";
    let at = before
        .find("[17]")
        .unwrap()
        - 1;
    let content = format!("{}[19]{}", &before[..at], &before[at..]);

    let ctx = detect_insertion_between_markers(&content, at, "[19]").unwrap();
    assert_eq!(ctx.classification.kind, InsertionKind::BetweenMarkers);

    let out = reindex_markers_after_insertion(&content, &ctx).unwrap();
    let plan: Vec<_> = out
        .reindexing_map
        .iter()
        .map(|e| (e.old_marker.as_str(), e.new_marker.as_str()))
        .collect();
    assert_eq!(plan, vec![("[19]", "[17]"), ("[17]", "[18]"), ("[18]", "[19]")]);
    assert_eq!(sorted_numbers(&out.new_content), vec![16, 17, 18, 19]);
    assert!(out.validation.is_valid);
}

#[test]
fn insert_before_first_marker()
{
    let before = "Texto [2] meio [3] final [4] fim";
    let content = format!("[5]{before}");

    let ctx = detect_insertion_between_markers(&content, 0, "[5]").unwrap();
    assert_eq!(ctx.classification.kind, InsertionKind::BeforeFirst);

    let out = reindex_markers_after_insertion(&content, &ctx).unwrap();
    // The inserted marker takes the lowest shifted number
    assert_eq!(out.final_new_marker_number, Some(2));
    assert_eq!(sorted_numbers(&out.new_content), vec![2, 3, 4, 5]);
    assert_eq!(out.new_content, "[2]Texto [3] meio [4] final [5] fim");

    // Lenient accepts a sequence starting at 2, strict does not
    assert!(out.validation.is_valid);
    assert!(!validate_sequential_integrity(&out.new_content, true).is_valid);
}

/// Appends a stray [1] to every rewritten buffer
struct Corrupting
{
    inner: BufferEditor,
}

impl EditorAdapter for Corrupting
{
    fn content(&self) -> Result<String, EditorError>
    {
        self.inner
            .content()
    }

    fn replace_content(
        &mut self,
        text: &str,
    ) -> Result<(), EditorError>
    {
        // Only the renumbered text carries a [4]
        if text.contains("[4]")
        {
            self.inner
                .replace_content(&format!("{text} [1]"))
        }
        else
        {
            self.inner
                .replace_content(text)
        }
    }
}

#[test]
fn failed_validation_restores_exact_state()
{
    let content = "[1] a [2] [2] b [3]";
    let at = 6;
    let ctx = detect_insertion_between_markers(content, at, "[2]").unwrap();

    let original_map = mapping(&[("A", "[1]"), ("B", "[2]"), ("C", "[3]")]);
    let mut map = original_map.clone();
    let mut editor = Corrupting { inner: BufferEditor::new(content) };

    let result = Reindexer::new().run(content, &ctx, &mut editor, &mut map);

    assert!(!result.success);
    assert_eq!(
        result
            .error
            .as_ref()
            .map(|e| e.stage()),
        Some("validate")
    );
    let report = result
        .rollback
        .expect("rollback ran");
    assert!(report.success);

    // Byte-for-byte content and identical pairs
    assert_eq!(
        editor
            .inner
            .text(),
        content
    );
    assert_eq!(map, original_map);
}

#[test]
fn full_error_handling_commits_and_updates_mapping()
{
    let content = "See [1] then [2] new [2] and [3]";
    let at = content
        .find("[2] new")
        .unwrap();
    let ctx = detect_insertion_between_markers(content, at, "[2]").unwrap();

    let mut map = mapping(&[("One", "[1]"), ("Two", "[2]"), ("Three", "[3]")]);
    let mut editor = BufferEditor::new(content);

    let result = execute_reindexing_with_full_error_handling(
        content,
        &ctx,
        &mut editor,
        &mut map,
        &RecoveryOptions::default(),
    );

    assert!(result.success, "{:?}", result.error);
    assert_eq!(editor.text(), "See [1] then [2] new [3] and [4]");
    assert_eq!(map.get("Two"), Some("[3]"));
    assert_eq!(map.get("[4]"), Some("Three"));
    assert!(map.is_bidirectional());

    // Explicit undo through the handle
    let undo = result
        .rollback(&mut editor, &mut map)
        .expect("handle present");
    assert!(undo.success);
    assert_eq!(editor.text(), content);
    assert_eq!(map.get("Two"), Some("[2]"));
}

#[test]
fn exhausted_retries_enter_fallback()
{
    let content = "[1] a [2] [2] b [3]";
    let ctx = detect_insertion_between_markers(content, 6, "[2]").unwrap();
    let mut map = ReferenceMapping::new();
    let mut editor = Corrupting { inner: BufferEditor::new(content) };

    let options = RecoveryOptions {
        max_retries: 1,
        retry_delay: std::time::Duration::ZERO,
        repair: RepairRequest::default(),
        enable_fallback: true,
    };
    let result = Reindexer::new().run_with_recovery(content, &ctx, &mut editor, &mut map, &options);

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert!(result.in_fallback());
    let fallback = result
        .fallback
        .expect("fallback state");
    assert!(!fallback.reindexing_enabled);
    assert!(fallback.basic_editing_available);
    assert_eq!(
        editor
            .inner
            .text(),
        content
    );
}
