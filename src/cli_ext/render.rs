//! Shared terminal rendering for the command handlers.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use similar::TextDiff;

use crate::{cli::AppContext, core::validate::ValidationResult};

/// Color switch derived from `--no-color` and `output.color`
#[derive(Debug, Clone, Copy)]
pub struct Palette
{
    enabled: bool,
}

impl Palette
{
    pub fn new(ctx: &AppContext) -> Self
    {
        Self { enabled: !ctx.no_color }
    }

    pub fn good(
        &self,
        s: &str,
    ) -> String
    {
        if self.enabled { s.green().bold().to_string() } else { s.to_string() }
    }

    pub fn warn(
        &self,
        s: &str,
    ) -> String
    {
        if self.enabled { s.yellow().bold().to_string() } else { s.to_string() }
    }

    pub fn bad(
        &self,
        s: &str,
    ) -> String
    {
        if self.enabled { s.red().bold().to_string() } else { s.to_string() }
    }

    pub fn marker(
        &self,
        s: &str,
    ) -> String
    {
        if self.enabled { s.cyan().to_string() } else { s.to_string() }
    }

    pub fn dim(
        &self,
        s: &str,
    ) -> String
    {
        if self.enabled { s.dimmed().to_string() } else { s.to_string() }
    }
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()>
{
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Unified line diff between two versions of a file
pub fn unified_diff(
    old: &str,
    new: &str,
    name: &str,
) -> String
{
    let diff = TextDiff::from_lines(old, new);
    let (a, b) = (format!("a/{name}"), format!("b/{name}"));
    let rendered = diff
        .unified_diff()
        .context_radius(2)
        .header(&a, &b)
        .to_string();
    rendered
}

/// Print a unified diff, coloring added and removed lines
pub fn print_diff(
    old: &str,
    new: &str,
    name: &str,
    palette: Palette,
)
{
    if old == new
    {
        println!("{}", palette.dim("(no changes)"));
        return;
    }

    for line in unified_diff(old, new, name).lines()
    {
        if line.starts_with("---") || line.starts_with("+++") || line.starts_with("@@")
        {
            println!("{}", palette.dim(line));
        }
        else if line.starts_with('-')
        {
            println!("{}", palette.bad(line));
        }
        else if line.starts_with('+')
        {
            println!("{}", palette.good(line));
        }
        else
        {
            println!("{line}");
        }
    }
}

/// Human-readable validation report
pub fn print_validation(
    report: &ValidationResult,
    palette: Palette,
)
{
    let status = if report.is_valid { palette.good("valid") } else { palette.bad("invalid") };
    println!("{} ({} markers)", status, report.stats.total);

    for e in &report.errors
    {
        println!("  {} {}", palette.bad("error:"), e);
    }
    for w in &report.warnings
    {
        println!("  {} {}", palette.warn("warning:"), w);
    }
    for i in &report.info
    {
        println!("  {}", palette.dim(i));
    }
}
