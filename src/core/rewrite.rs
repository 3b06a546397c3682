//! Content rewriting for rename plans.
//!
//! Treats the document as one string and substitutes exact marker text. Entries
//! run in descending old-number order and every substitution first writes a
//! private-use placeholder, so a freshly written number can never be matched by
//! a later entry. Placeholders are resolved to `[n]` in a final pass.
//!
//! The [`ContentRewriter`] trait is the seam for a structure-aware rewriter
//! (one that skips code spans, say) without touching planning or validation.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::core::marker::{Marker, marker_text};
use crate::core::plan::RenamePlan;

const PH_OPEN: char = '\u{E000}';
const PH_CLOSE: char = '\u{E001}';
/// Placeholder body for the anchored inserted marker
const PH_ANCHOR: &str = "A";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}([0-9]+|A)\u{E001}").expect("placeholder pattern compiles")
});

/// Outcome of one plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryResult {
    pub old_marker: String,
    pub new_marker: String,
    pub occurrences: usize,
    pub processed: bool,
    pub warning: Option<String>,
}

/// Outcome of rewriting a whole plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteOutcome {
    pub success: bool,
    pub new_content: String,
    /// Total substitutions across all entries
    pub replacements: usize,
    pub entries: Vec<EntryResult>,
    pub error: Option<String>,
}

impl RewriteOutcome {
    fn failed(original: &str, reason: String) -> Self {
        Self {
            success: false,
            new_content: original.to_string(),
            replacements: 0,
            entries: Vec::new(),
            error: Some(reason),
        }
    }

    /// Entries that matched nothing
    pub fn unprocessed(&self) -> impl Iterator<Item = &EntryResult> {
        self.entries.iter().filter(|e| !e.processed)
    }

    pub fn is_partial(&self) -> bool {
        self.unprocessed().next().is_some()
    }
}

/// Applies a rename plan to text
pub trait ContentRewriter {
    /// Rewrite `text` according to `plan`.
    ///
    /// `anchor` is the inserted marker; its occurrence is touched only by the
    /// plan's inserted-marker entry.
    fn rewrite(
        &self,
        text: &str,
        plan: &RenamePlan,
        anchor: Option<&Marker>,
    ) -> RewriteOutcome;

    /// Engine name for logs
    fn name(&self) -> &'static str;
}

/// Exact-text regex substitution over the whole buffer
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexRewriter;

impl ContentRewriter for RegexRewriter {
    fn rewrite(
        &self,
        text: &str,
        plan: &RenamePlan,
        anchor: Option<&Marker>,
    ) -> RewriteOutcome {
        if let Err(defect) = plan.check() {
            warn!(%defect, "refusing inconsistent plan");
            return RewriteOutcome::failed(text, defect.to_string());
        }
        if text.contains(PH_OPEN) || text.contains(PH_CLOSE) {
            return RewriteOutcome::failed(
                text,
                "content contains reserved placeholder characters".to_string(),
            );
        }
        if plan.is_empty() {
            return RewriteOutcome {
                success: true,
                new_content: text.to_string(),
                replacements: 0,
                entries: Vec::new(),
                error: None,
            };
        }

        // Park the inserted marker first so no sweep can catch it
        let mut working = text.to_string();
        let mut anchored = false;
        if let Some(a) = anchor {
            if working.get(a.position..a.end_position) == Some(a.text.as_str()) {
                let ph = format!("{PH_OPEN}{PH_ANCHOR}{PH_CLOSE}");
                working.replace_range(a.position..a.end_position, &ph);
                anchored = true;
            }
        }

        let mut entries = Vec::with_capacity(plan.len());
        let mut replacements = 0usize;
        let mut anchor_target: Option<u64> = None;

        for entry in plan.rewrite_order() {
            let mut result = EntryResult {
                old_marker: entry.old_marker.clone(),
                new_marker: entry.new_marker.clone(),
                occurrences: 0,
                processed: false,
                warning: None,
            };

            if entry.is_new_marker && anchored {
                anchor_target = Some(entry.new_number);
                result.occurrences = 1;
            } else {
                let (next, count) = substitute_exact(&working, &entry.old_marker, entry.new_number);
                working = next;
                result.occurrences = count;
            }

            result.processed = result.occurrences > 0;
            if !result.processed {
                let msg = format!("{} not found in content", entry.old_marker);
                warn!(old = %entry.old_marker, new = %entry.new_marker, "plan entry matched nothing");
                result.warning = Some(msg);
            } else {
                trace!(
                    old = %entry.old_marker,
                    new = %entry.new_marker,
                    count = result.occurrences,
                    "entry applied"
                );
            }
            replacements += result.occurrences;
            entries.push(result);
        }

        let restored_anchor = anchor.map(|a| a.number);
        let new_content = PLACEHOLDER_RE
            .replace_all(&working, |caps: &Captures| {
                if &caps[1] == PH_ANCHOR {
                    // Anchor keeps its number when the plan does not move it
                    marker_text(anchor_target.or(restored_anchor).unwrap_or_default())
                } else {
                    format!("[{}]", &caps[1])
                }
            })
            .into_owned();

        debug!(
            rewriter = self.name(),
            replacements,
            entries = entries.len(),
            "rewrite finished"
        );

        RewriteOutcome { success: true, new_content, replacements, entries, error: None }
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

/// Replace every exact `old_marker` with a placeholder for `new_number`
fn substitute_exact(text: &str, old_marker: &str, new_number: u64) -> (String, usize) {
    let pattern = match Regex::new(&regex::escape(old_marker)) {
        Ok(re) => re,
        Err(_) => return (text.to_string(), 0),
    };
    let count = pattern.find_iter(text).count();
    if count == 0 {
        return (text.to_string(), 0);
    }
    let replacement = format!("{PH_OPEN}{new_number}{PH_CLOSE}");
    let out = pattern.replace_all(text, regex::NoExpand(&replacement)).into_owned();
    (out, count)
}

/// Rewrite with the default engine.
///
/// The inserted-marker entry, if any, anchors the occurrence at its position.
pub fn rewrite_content(text: &str, plan: &RenamePlan) -> RewriteOutcome {
    let anchor = plan
        .new_marker_entry()
        .map(|e| Marker::new(e.old_number, e.position));
    RegexRewriter.rewrite(text, plan, anchor.as_ref())
}
