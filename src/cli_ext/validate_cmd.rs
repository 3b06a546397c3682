//! `rmk validate`: sequence integrity, optionally against a mapping file.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::{
    cli::{AppContext, OutputFormat, ValidateArgs},
    cli_ext::render::{Palette, print_json, print_validation},
    core::validate::{check_mapping_consistency, check_well_formedness, validate_sequential_integrity},
    infra::io::{read_mapping, read_text},
};

/// Returns whether the file validated
#[instrument(skip(ctx), fields(file = %args.file.display()))]
pub fn run(
    args: ValidateArgs,
    ctx: &AppContext,
) -> Result<bool>
{
    let text = read_text(&args.file)?;
    let strict = !args.lenient;

    let mut report = validate_sequential_integrity(&text, strict);
    report.absorb(check_well_formedness(&text));
    if let Some(path) = &args.mapping
    {
        let mapping = read_mapping(path)?;
        debug!(entries = mapping.len(), "checking mapping");
        report.absorb(check_mapping_consistency(&text, &mapping));
    }

    match ctx.format
    {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text =>
        {
            if !ctx.quiet || !report.is_valid
            {
                print_validation(&report, Palette::new(ctx));
            }
        }
    }

    Ok(report.is_valid)
}
