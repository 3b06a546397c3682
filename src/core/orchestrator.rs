//! Transactional reindexing with backup, validation and rollback.
//!
//! One attempt walks `BACKUP → PLAN → REWRITE → APPLY → REMAP → VALIDATE` and
//! ends in `COMMIT` or `ROLLBACK`. Nothing here returns `Err` or panics out to
//! the caller: every failure, including a panicking editor adapter, becomes a
//! structured [`RollbackableResult`].
//!
//! [`Reindexer::run_with_recovery`] adds bounded retries, opt-in repairs
//! between attempts and a degraded fallback mode once retries run out.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::backup::{RollbackReport, StateBackup};
use crate::core::classify::{InsertionContext, build_insertion_context};
use crate::core::editor::EditorAdapter;
use crate::core::error::ReindexError;
use crate::core::mapping::{ReferenceMapping, update_reference_mapping};
use crate::core::marker::{extract_all_markers, marker_text};
use crate::core::plan::{RenamePlan, plan_for_context};
use crate::core::repair::{RepairOutcome, RepairRequest, run_repairs, shift_offset_through};
use crate::core::rewrite::{ContentRewriter, RegexRewriter};
use crate::core::validate::{ValidationResult, validate_after_reindex, validate_sequential_integrity};

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Backup,
    Plan,
    Rewrite,
    Apply,
    Remap,
    Validate,
    Commit,
    Rollback,
}

/// Retained backup allowing a committed reindex to be undone later
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackHandle {
    backup: StateBackup,
}

impl RollbackHandle {
    pub fn backup(&self) -> &StateBackup {
        &self.backup
    }

    /// Restore the pre-reindex state
    pub fn rollback(
        &self,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
    ) -> RollbackReport {
        self.backup.restore(editor, mapping)
    }
}

/// Degraded service state entered once retries are exhausted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackState {
    pub reindexing_enabled: bool,
    pub basic_editing_available: bool,
    pub reason: String,
    pub recommendations: Vec<String>,
}

impl FallbackState {
    fn after(reason: String) -> Self {
        Self {
            reindexing_enabled: false,
            basic_editing_available: true,
            reason,
            recommendations: vec![
                "Reload the document to resynchronize reference markers".to_string(),
                "Check the log output (REFMARK_LOG=debug) for the failing stage".to_string(),
                "Save your work before continuing to edit".to_string(),
                "Renumber markers manually or run `rmk repair` on the file".to_string(),
            ],
        }
    }
}

/// Outcome of a reindexing transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackableResult {
    pub success: bool,
    /// Committed text, `None` on failure
    pub new_content: Option<String>,
    /// Committed mapping, `None` on failure
    pub mapping: Option<ReferenceMapping>,
    pub plan: RenamePlan,
    pub final_new_marker_number: Option<u64>,
    pub validation: Option<ValidationResult>,
    pub error: Option<ReindexError>,
    pub failed_stage: Option<Stage>,
    /// Report of the automatic rollback, if one ran
    pub rollback: Option<RollbackReport>,
    /// Undo handle for committed results
    #[serde(skip)]
    pub handle: Option<RollbackHandle>,
    pub attempts: u32,
    pub repairs: Vec<RepairOutcome>,
    pub fallback: Option<FallbackState>,
}

impl RollbackableResult {
    fn failed(stage: Stage, error: ReindexError) -> Self {
        Self {
            success: false,
            new_content: None,
            mapping: None,
            plan: RenamePlan::default(),
            final_new_marker_number: None,
            validation: None,
            error: Some(error),
            failed_stage: Some(stage),
            rollback: None,
            handle: None,
            attempts: 1,
            repairs: Vec::new(),
            fallback: None,
        }
    }

    pub fn in_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Undo a committed result; `None` when there is nothing to undo
    pub fn rollback(
        &self,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
    ) -> Option<RollbackReport> {
        self.handle.as_ref().map(|h| h.rollback(editor, mapping))
    }
}

/// Retry and repair policy for [`Reindexer::run_with_recovery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub repair: RepairRequest,
    pub enable_fallback: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(25),
            repair: RepairRequest::default(),
            enable_fallback: true,
        }
    }
}

/// State carried from a successful pipeline run to commit
struct Committed {
    content: String,
    mapping: ReferenceMapping,
    plan: RenamePlan,
    final_new_marker_number: Option<u64>,
    validation: ValidationResult,
}

type StageResult<T> = Result<T, (Stage, ReindexError, Option<ValidationResult>)>;

/// Reindexing transaction runner
#[derive(Debug, Clone)]
pub struct Reindexer<R = RegexRewriter> {
    rewriter: R,
    strict_mode: bool,
}

impl Default for Reindexer<RegexRewriter> {
    fn default() -> Self {
        Self::new()
    }
}

impl Reindexer<RegexRewriter> {
    pub fn new() -> Self {
        Self { rewriter: RegexRewriter, strict_mode: true }
    }
}

impl<R: ContentRewriter> Reindexer<R> {
    /// Swap the content rewriter
    pub fn with_rewriter<S: ContentRewriter>(self, rewriter: S) -> Reindexer<S> {
        Reindexer { rewriter, strict_mode: self.strict_mode }
    }

    /// Strict validation requires a gap-free sequence starting at 1
    pub fn with_strict(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// Run one transactional attempt.
    ///
    /// `mapping` is the caller-owned current mapping; it is replaced on commit
    /// and restored on rollback.
    #[instrument(level = "debug", skip_all, fields(at = ctx.insertion_position, strict = self.strict_mode))]
    pub fn run(
        &self,
        content: &str,
        ctx: &InsertionContext,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
    ) -> RollbackableResult {
        let backup = StateBackup::capture(&*editor, mapping);
        let stage = Cell::new(Stage::Backup);

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline(content, ctx, &mut *editor, &mut *mapping, &stage)
        }));
        let outcome = attempt.unwrap_or_else(|payload| {
            Err((stage.get(), ReindexError::Internal(panic_message(payload.as_ref())), None))
        });

        match outcome {
            Ok(done) => {
                info!(
                    entries = done.plan.len(),
                    warnings = done.validation.warnings.len(),
                    "reindex committed"
                );
                RollbackableResult {
                    success: true,
                    new_content: Some(done.content),
                    mapping: Some(done.mapping),
                    plan: done.plan,
                    final_new_marker_number: done.final_new_marker_number,
                    validation: Some(done.validation),
                    error: None,
                    failed_stage: None,
                    rollback: None,
                    handle: Some(RollbackHandle { backup }),
                    attempts: 1,
                    repairs: Vec::new(),
                    fallback: None,
                }
            }
            Err((failed, error, validation)) => {
                warn!(stage = ?failed, %error, "reindex failed, rolling back");
                let report = restore_guarded(&backup, editor, mapping);
                let mut result = RollbackableResult::failed(failed, error);
                result.validation = validation;
                result.rollback = Some(report);
                result
            }
        }
    }

    fn pipeline(
        &self,
        content: &str,
        ctx: &InsertionContext,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
        stage: &Cell<Stage>,
    ) -> StageResult<Committed> {
        stage.set(Stage::Plan);
        if !ctx.needs_reindexing() {
            return Err((
                Stage::Plan,
                ReindexError::Planning("insertion needs no reindexing".to_string()),
                None,
            ));
        }
        let (plan, final_new_marker_number) = plan_for_context(ctx)
            .map_err(|d| (Stage::Plan, ReindexError::Planning(d.to_string()), None))?;
        if plan.is_empty() {
            return Err((Stage::Plan, ReindexError::Planning("empty plan".to_string()), None));
        }
        plan.check()
            .map_err(|d| (Stage::Plan, ReindexError::Planning(d.to_string()), None))?;

        stage.set(Stage::Rewrite);
        let rewrite = self.rewriter.rewrite(content, &plan, Some(&ctx.new_marker));
        if !rewrite.success {
            let reason = rewrite.error.unwrap_or_else(|| "unknown".to_string());
            return Err((Stage::Rewrite, ReindexError::Rewrite(reason), None));
        }
        for skipped in rewrite.unprocessed() {
            debug!(old = %skipped.old_marker, "entry left unprocessed");
        }

        stage.set(Stage::Apply);
        editor
            .replace_content(&rewrite.new_content)
            .map_err(|e| (Stage::Apply, ReindexError::from(e), None))?;

        stage.set(Stage::Remap);
        let next_mapping = update_reference_mapping(mapping, &plan);
        if mapping.is_bidirectional() && !next_mapping.is_bidirectional() {
            return Err((
                Stage::Remap,
                ReindexError::Remap(next_mapping.bidirectional_violations().join("; ")),
                None,
            ));
        }
        *mapping = next_mapping.clone();

        // Validate what the editor actually holds
        stage.set(Stage::Validate);
        let applied = editor
            .content()
            .map_err(|e| (Stage::Validate, ReindexError::from(e), None))?;
        let validation = validate_after_reindex(&applied, &next_mapping, &plan, self.strict_mode);
        if !validation.is_valid {
            let errors = validation.errors.clone();
            return Err((Stage::Validate, ReindexError::Validation(errors), Some(validation)));
        }

        stage.set(Stage::Commit);
        Ok(Committed {
            content: applied,
            mapping: next_mapping,
            plan,
            final_new_marker_number,
            validation,
        })
    }

    /// Run with retries, opt-in repairs and fallback.
    ///
    /// Makes up to `1 + max_retries` attempts. Between attempts the requested
    /// repairs run on the current text; if the repaired text already validates
    /// it is committed as is, otherwise the insertion context is re-derived
    /// from it and the next attempt proceeds. When every attempt fails the
    /// editor and mapping are restored to their state before the first attempt.
    #[instrument(level = "debug", skip_all, fields(max_retries = options.max_retries))]
    pub fn run_with_recovery(
        &self,
        content: &str,
        ctx: &InsertionContext,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
        options: &RecoveryOptions,
    ) -> RollbackableResult {
        let origin = StateBackup::capture(&*editor, mapping);
        let mut content = content.to_string();
        let mut ctx = ctx.clone();
        let mut repairs: Vec<RepairOutcome> = Vec::new();
        let mut attempts = 0u32;
        let mut last;

        loop {
            attempts += 1;
            last = self.run(&content, &ctx, editor, mapping);
            if last.success {
                last.attempts = attempts;
                last.repairs = repairs;
                last.handle = Some(RollbackHandle { backup: origin });
                return last;
            }
            if attempts > options.max_retries {
                break;
            }

            if options.repair.any() {
                match self.repair_between_attempts(&content, &ctx, editor, mapping, options.repair) {
                    RepairStep::Committed(mut result, outs) => {
                        repairs.extend(outs);
                        result.attempts = attempts;
                        result.repairs = repairs;
                        result.handle = Some(RollbackHandle { backup: origin });
                        return result;
                    }
                    RepairStep::Retry(next_content, next_ctx, outs) => {
                        repairs.extend(outs);
                        content = next_content;
                        ctx = next_ctx;
                    }
                    RepairStep::GiveUp(outs) => {
                        repairs.extend(outs);
                    }
                }
            }

            debug!(attempt = attempts, delay_ms = options.retry_delay.as_millis() as u64, "retrying");
            if !options.retry_delay.is_zero() {
                std::thread::sleep(options.retry_delay);
            }
        }

        if !repairs.is_empty() {
            // Repairs may have touched the editor; put the original back
            last.rollback = Some(restore_guarded(&origin, editor, mapping));
        }
        last.attempts = attempts;
        last.repairs = repairs;
        if options.enable_fallback {
            let reason = last
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "reindexing failed".to_string());
            warn!(%reason, attempts, "entering fallback mode");
            last.fallback = Some(FallbackState::after(reason));
        }
        last
    }

    fn repair_between_attempts(
        &self,
        content: &str,
        ctx: &InsertionContext,
        editor: &mut dyn EditorAdapter,
        mapping: &mut ReferenceMapping,
        request: RepairRequest,
    ) -> RepairStep {
        let outs = run_repairs(content, request);
        let Some(repaired) = outs.last().map(|o| o.content.clone()) else {
            return RepairStep::GiveUp(outs);
        };
        if !outs.iter().any(RepairOutcome::changed) || !outs.iter().all(|o| o.success) {
            debug!("repairs changed nothing or failed");
            return RepairStep::GiveUp(outs);
        }

        let shifted = shift_offset_through(ctx.insertion_position, &outs);
        let new_marker_text = extract_all_markers(&repaired)
            .into_iter()
            .find(|m| m.position == shifted)
            .map(|m| m.text)
            .unwrap_or_else(|| marker_text(ctx.new_marker_number()));

        let gap_plan = outs.iter().rev().find_map(|o| o.plan.clone()).unwrap_or_default();
        let next_mapping = update_reference_mapping(mapping, &gap_plan);

        if validate_sequential_integrity(&repaired, self.strict_mode).is_valid {
            if let Err(e) = editor.replace_content(&repaired) {
                warn!(error = %e, "could not apply repaired content");
                return RepairStep::GiveUp(outs);
            }
            let validation =
                validate_after_reindex(&repaired, &next_mapping, &gap_plan, self.strict_mode);
            if validation.is_valid {
                info!(repairs = outs.len(), "repaired content committed");
                *mapping = next_mapping.clone();
                let final_new_marker_number =
                    crate::core::marker::parse_marker_token(&new_marker_text);
                return RepairStep::Committed(
                    RollbackableResult {
                        success: true,
                        new_content: Some(repaired),
                        mapping: Some(next_mapping),
                        plan: gap_plan,
                        final_new_marker_number,
                        validation: Some(validation),
                        error: None,
                        failed_stage: None,
                        rollback: None,
                        handle: None,
                        attempts: 0,
                        repairs: Vec::new(),
                        fallback: None,
                    },
                    outs,
                );
            }
            // Leave the editor as the attempt found it
            if let Err(e) = editor.replace_content(content) {
                warn!(error = %e, "could not restore content after rejected repair");
                return RepairStep::GiveUp(outs);
            }
        }

        match build_insertion_context(&repaired, shifted, &new_marker_text) {
            Some(next_ctx) if next_ctx.needs_reindexing() => {
                // The next attempt runs against renumbered text
                *mapping = next_mapping;
                RepairStep::Retry(repaired, next_ctx, outs)
            }
            _ => RepairStep::GiveUp(outs),
        }
    }
}

/// Restore a backup even if the editor adapter panics midway
fn restore_guarded(
    backup: &StateBackup,
    editor: &mut dyn EditorAdapter,
    mapping: &mut ReferenceMapping,
) -> RollbackReport {
    match panic::catch_unwind(AssertUnwindSafe(|| backup.restore(&mut *editor, &mut *mapping))) {
        Ok(report) => report,
        Err(payload) => {
            *mapping = backup.mapping.clone();
            let msg = panic_message(payload.as_ref());
            warn!(%msg, "editor panicked during rollback");
            RollbackReport {
                success: false,
                restored: vec!["mapping"],
                failures: vec![format!("editor panicked: {msg}")],
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

enum RepairStep {
    Committed(RollbackableResult, Vec<RepairOutcome>),
    Retry(String, InsertionContext, Vec<RepairOutcome>),
    GiveUp(Vec<RepairOutcome>),
}

/// One transactional attempt with the default rewriter and strict validation
pub fn reindex_with_error_handling(
    content: &str,
    ctx: &InsertionContext,
    editor: &mut dyn EditorAdapter,
    mapping: &mut ReferenceMapping,
) -> RollbackableResult {
    Reindexer::new().run(content, ctx, editor, mapping)
}

/// Retries, repairs and fallback around [`reindex_with_error_handling`]
pub fn execute_reindexing_with_full_error_handling(
    content: &str,
    ctx: &InsertionContext,
    editor: &mut dyn EditorAdapter,
    mapping: &mut ReferenceMapping,
    options: &RecoveryOptions,
) -> RollbackableResult {
    Reindexer::new().run_with_recovery(content, ctx, editor, mapping, options)
}
