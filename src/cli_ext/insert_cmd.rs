//! `rmk insert`: insert a marker and renumber everything after it.
//!
//! The file is loaded into a [`BufferEditor`], the marker is typed in at the
//! requested byte offset and the reindexing transaction runs against that
//! buffer with the configured retry and repair policy. Nothing touches disk
//! unless `--write` is given and the transaction committed.

use anyhow::{Result, bail};
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    cli::{AppContext, InsertArgs, OutputFormat},
    cli_ext::render::{Palette, print_diff, print_json},
    core::{
        classify::detect_insertion_between_markers,
        editor::BufferEditor,
        marker::is_marker_token,
        mapping::ReferenceMapping,
        orchestrator::{Reindexer, RollbackableResult},
    },
    infra::{
        config::Config,
        io::{read_mapping, read_text, write_atomic, write_mapping},
    },
};

/// Returns whether the insertion went through
#[instrument(skip(ctx, cfg), fields(file = %args.file.display(), at = args.at))]
pub fn run(
    args: InsertArgs,
    ctx: &AppContext,
    cfg: &Config,
) -> Result<bool>
{
    if !is_marker_token(&args.marker)
    {
        bail!("--marker must look like [n], got {:?}", args.marker);
    }

    let original = read_text(&args.file)?;
    if args.at > original.len() || !original.is_char_boundary(args.at)
    {
        bail!(
            "offset {} is not a character boundary inside {} ({} bytes)",
            args.at,
            args.file.display(),
            original.len()
        );
    }

    let mut mapping = match &args.mapping
    {
        Some(path) => read_mapping(path)?,
        None => ReferenceMapping::new(),
    };

    let mut editor = BufferEditor::new(original.as_str()).with_cursor(args.at);
    editor.insert(args.at, &format!("{}{}", args.marker, args.text))?;
    let inserted = editor
        .text()
        .to_string();

    let outcome = match detect_insertion_between_markers(&inserted, args.at, &args.marker)
    {
        None =>
        {
            info!("insertion needs no renumbering");
            Outcome::Plain(editor.into_text())
        }
        Some(insertion) =>
        {
            let result = Reindexer::new()
                .with_strict(
                    cfg.reindex
                        .strict_mode,
                )
                .run_with_recovery(
                    &inserted,
                    &insertion,
                    &mut editor,
                    &mut mapping,
                    &cfg.recovery_options(),
                );
            Outcome::Reindexed(Box::new(result))
        }
    };

    let final_text = outcome.text();
    let ok = final_text.is_some();
    let written = args.write && ok;

    if let (true, Some(text)) = (written, final_text)
    {
        write_atomic(&args.file, text.as_bytes())?;
        if let Some(path) = &args.mapping
        {
            write_mapping(path, &mapping)?;
        }
        info!(path = %args.file.display(), "file written");
    }

    match ctx.format
    {
        OutputFormat::Json => print_json(&outcome.to_json(written))?,
        OutputFormat::Text => print_text(&outcome, &original, &args, written, ctx),
    }

    Ok(ok)
}

enum Outcome
{
    /// Marker landed where no renumbering applies
    Plain(String),
    Reindexed(Box<RollbackableResult>),
}

impl Outcome
{
    fn text(&self) -> Option<&str>
    {
        match self
        {
            Outcome::Plain(t) => Some(t.as_str()),
            Outcome::Reindexed(r) => r
                .new_content
                .as_deref(),
        }
    }

    fn to_json(
        &self,
        written: bool,
    ) -> serde_json::Value
    {
        match self
        {
            Outcome::Plain(t) => json!({
                "success": true,
                "reindexed": false,
                "written": written,
                "new_content": t,
            }),
            Outcome::Reindexed(r) => json!({
                "success": r.success,
                "reindexed": r.success,
                "written": written,
                "result": r,
            }),
        }
    }
}

fn print_text(
    outcome: &Outcome,
    original: &str,
    args: &InsertArgs,
    written: bool,
    ctx: &AppContext,
)
{
    let palette = Palette::new(ctx);
    let name = args
        .file
        .display()
        .to_string();

    match outcome
    {
        Outcome::Plain(_) =>
        {
            if !ctx.quiet
            {
                println!(
                    "{} inserted {} (no renumbering needed)",
                    palette.good("ok"),
                    palette.marker(&args.marker)
                );
            }
        }
        Outcome::Reindexed(r) if r.success =>
        {
            if !ctx.quiet
            {
                let final_marker = r
                    .final_new_marker_number
                    .map(|n| format!("[{n}]"))
                    .unwrap_or_else(|| args.marker.clone());
                println!(
                    "{} inserted {} and renumbered {} marker(s) in {} attempt(s)",
                    palette.good("ok"),
                    palette.marker(&final_marker),
                    r.plan
                        .len(),
                    r.attempts
                );
                for e in &r.plan
                {
                    println!(
                        "  {} -> {}",
                        palette.marker(&e.old_marker),
                        palette.marker(&e.new_marker)
                    );
                }
                for w in r
                    .validation
                    .iter()
                    .flat_map(|v| &v.warnings)
                {
                    println!("  {} {}", palette.warn("warning:"), w);
                }
            }
        }
        Outcome::Reindexed(r) =>
        {
            let reason = r
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "reindexing failed".to_string());
            println!("{} {}", palette.bad("failed:"), reason);
            if let Some(rb) = &r.rollback
            {
                let state = if rb.success { "complete" } else { "incomplete" };
                println!("  rollback {}: {}", state, rb.restored.join(", "));
                for f in &rb.failures
                {
                    println!("  {} {}", palette.bad("rollback error:"), f);
                }
            }
            if let Some(fb) = &r.fallback
            {
                println!("{}", palette.warn("reindexing disabled, basic editing still available"));
                for rec in &fb.recommendations
                {
                    println!("  - {rec}");
                }
            }
        }
    }

    if args.diff
    {
        if let Some(text) = outcome.text()
        {
            print_diff(original, text, &name, palette);
        }
    }

    if !ctx.quiet && outcome.text().is_some()
    {
        if written
        {
            println!("{}", palette.good(&format!("wrote {name}")));
        }
        else
        {
            println!("{}", palette.dim("dry run, pass --write to save"));
        }
    }
}
