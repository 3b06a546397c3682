//! Pure reindexing pipeline: plan → rewrite → validate.
//!
//! No editor, no mapping, no rollback. The orchestrator wraps this same
//! sequence in a transaction; callers that manage their own state can use it
//! directly.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::classify::InsertionContext;
use crate::core::plan::{RenamePlan, plan_for_context};
use crate::core::rewrite::{ContentRewriter, RegexRewriter, RewriteOutcome};
use crate::core::validate::{ValidationResult, validate_sequential_integrity};

/// Result of one pure reindexing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexOutcome {
    /// Rewrite succeeded and validation passed
    pub success: bool,
    pub new_content: String,
    pub reindexing_map: RenamePlan,
    pub final_new_marker_number: Option<u64>,
    pub rewrite: RewriteOutcome,
    pub validation: ValidationResult,
}

/// Reindex `content` after the insertion described by `ctx`, validating leniently.
///
/// `content` is expected to contain the inserted marker at
/// `ctx.insertion_position`. Returns `None` when nothing needs renumbering or
/// the context does not fit the content.
pub fn reindex_markers_after_insertion(
    content: &str,
    ctx: &InsertionContext,
) -> Option<ReindexOutcome> {
    reindex_with(&RegexRewriter, content, ctx, false)
}

/// [`reindex_markers_after_insertion`] with an explicit rewriter and strictness
#[instrument(level = "debug", skip_all, fields(at = ctx.insertion_position, rewriter = rewriter.name()))]
pub fn reindex_with(
    rewriter: &dyn ContentRewriter,
    content: &str,
    ctx: &InsertionContext,
    strict_mode: bool,
) -> Option<ReindexOutcome> {
    if !ctx.needs_reindexing() || ctx.insertion_position > content.len() {
        debug!("context needs no reindexing");
        return None;
    }

    let (plan, final_new_marker_number) = match plan_for_context(ctx) {
        Ok(planned) => planned,
        Err(defect) => {
            warn!(%defect, "cannot plan reindexing");
            return None;
        }
    };
    if plan.is_empty() {
        debug!("empty plan");
        return None;
    }

    let rewrite = rewriter.rewrite(content, &plan, Some(&ctx.new_marker));
    let validation = validate_sequential_integrity(&rewrite.new_content, strict_mode);
    let success = rewrite.success && validation.is_valid;

    info!(
        success,
        entries = plan.len(),
        replacements = rewrite.replacements,
        "reindexed markers"
    );

    Some(ReindexOutcome {
        success,
        new_content: rewrite.new_content.clone(),
        reindexing_map: plan,
        final_new_marker_number,
        rewrite,
        validation,
    })
}
