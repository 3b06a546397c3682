//! `rmk repair`: duplicate stripping and gap closing on a file.

use anyhow::Result;
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    cli::{AppContext, OutputFormat, RepairArgs},
    cli_ext::render::{Palette, print_json},
    core::repair::{RepairRequest, run_repairs},
    infra::io::{read_text, write_atomic},
};

/// Returns whether every requested pass succeeded
#[instrument(skip(ctx), fields(file = %args.file.display()))]
pub fn run(
    args: RepairArgs,
    ctx: &AppContext,
) -> Result<bool>
{
    let text = read_text(&args.file)?;

    // No flags means both passes
    let request = if args.duplicates || args.gaps
    {
        RepairRequest { duplicates: args.duplicates, gaps: args.gaps }
    }
    else
    {
        RepairRequest { duplicates: true, gaps: true }
    };

    let outcomes = run_repairs(&text, request);
    let ok = outcomes
        .iter()
        .all(|o| o.success);
    let repaired = outcomes
        .last()
        .map(|o| o.content.as_str())
        .unwrap_or(text.as_str());
    let changed = repaired != text;

    let written = args.write && ok && changed;
    if written
    {
        write_atomic(&args.file, repaired.as_bytes())?;
        info!(path = %args.file.display(), "repaired file written");
    }

    match ctx.format
    {
        OutputFormat::Json => print_json(&json!({
            "success": ok,
            "changed": changed,
            "written": written,
            "passes": outcomes,
        }))?,
        OutputFormat::Text =>
        {
            let palette = Palette::new(ctx);
            for out in &outcomes
            {
                if let Some(err) = &out.error
                {
                    println!("{} {}", palette.bad("error:"), err);
                }
                for c in &out.changes
                {
                    if c.new_text
                        .is_empty()
                    {
                        println!("  @{} removed {}", c.position, palette.marker(&c.old_text));
                    }
                    else
                    {
                        println!(
                            "  @{} {} -> {}",
                            c.position,
                            palette.marker(&c.old_text),
                            palette.marker(&c.new_text)
                        );
                    }
                }
            }
            if !ctx.quiet
            {
                let summary = match (changed, written)
                {
                    (false, _) => palette.dim("nothing to repair"),
                    (true, true) => palette.good(&format!("wrote {}", args.file.display())),
                    (true, false) => palette.warn("dry run, pass --write to save"),
                };
                println!("{summary}");
            }
        }
    }

    Ok(ok)
}
