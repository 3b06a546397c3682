//! Point-in-time editor snapshots for rollback.
//!
//! A backup is taken right before a reindexing attempt, dropped on commit and
//! consumed on rollback. It is never mutated after capture. Capture is
//! best-effort: unreadable editor state shrinks the backup instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::editor::{EditorAdapter, Viewport};
use crate::core::mapping::ReferenceMapping;

/// Content id for restore verification (xxh64, fixed seed)
pub fn content_id(text: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh64::xxh64(text.as_bytes(), 0))
}

/// Snapshot of editor text, mapping, cursor and viewport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBackup {
    /// e.g. 20261019T101530Z_3f9a1c2b
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// `None` when the editor could not be read
    pub content: Option<String>,
    pub content_id: Option<String>,
    pub mapping: ReferenceMapping,
    pub cursor: Option<usize>,
    pub viewport: Option<Viewport>,
}

/// What a rollback managed to restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub success: bool,
    pub restored: Vec<&'static str>,
    pub failures: Vec<String>,
}

impl StateBackup {
    /// Capture editor state and a copy of `mapping`
    pub fn capture(editor: &dyn EditorAdapter, mapping: &ReferenceMapping) -> Self {
        let created_at = Utc::now();
        let content = match editor.content() {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "editor unreadable, backup holds no content");
                None
            }
        };
        let content_id = content.as_deref().map(content_id);
        let id = format!(
            "{}_{}",
            created_at.format("%Y%m%dT%H%M%SZ"),
            content_id.as_deref().map(|c| &c[..8]).unwrap_or("empty")
        );

        let backup = Self {
            id,
            created_at,
            content,
            content_id,
            mapping: mapping.clone(),
            cursor: editor.cursor(),
            viewport: editor.viewport(),
        };
        debug!(id = %backup.id, has_content = backup.content.is_some(), "state backup captured");
        backup
    }

    /// True when the text itself was captured
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Restore everything captured into `editor` and `mapping`.
    ///
    /// Never panics or returns early on a failed step; every step is attempted
    /// and failures are collected in the report.
    pub fn restore(
        &self,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
    ) -> RollbackReport {
        let mut report = RollbackReport::default();

        match &self.content {
            Some(text) => match editor.replace_content(text) {
                Ok(()) => {
                    report.restored.push("content");
                    self.verify_content(editor, &mut report);
                }
                Err(e) => report.failures.push(format!("content: {e}")),
            },
            None => report.failures.push("content: not captured".to_string()),
        }

        *mapping = self.mapping.clone();
        report.restored.push("mapping");

        if let Some(cursor) = self.cursor {
            match editor.set_cursor(cursor) {
                Ok(()) => report.restored.push("cursor"),
                Err(e) => report.failures.push(format!("cursor: {e}")),
            }
        }
        if let Some(viewport) = self.viewport {
            match editor.restore_viewport(viewport) {
                Ok(()) => report.restored.push("viewport"),
                Err(e) => report.failures.push(format!("viewport: {e}")),
            }
        }

        report.success = report.failures.is_empty();
        if report.success {
            info!(id = %self.id, "rollback complete");
        } else {
            warn!(id = %self.id, failures = ?report.failures, "rollback incomplete");
        }
        report
    }

    fn verify_content(&self, editor: &dyn EditorAdapter, report: &mut RollbackReport) {
        let Some(expected) = self.content_id.as_deref() else {
            return;
        };
        match editor.content() {
            Ok(now) if content_id(&now) == expected => {}
            Ok(_) => report
                .failures
                .push("content: restored text differs from backup".to_string()),
            Err(e) => report.failures.push(format!("content verify: {e}")),
        }
    }
}
