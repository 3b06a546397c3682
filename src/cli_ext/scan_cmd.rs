//! `rmk scan`: list markers with their byte spans.

use anyhow::Result;
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};
use tracing::instrument;

use crate::{
    cli::{AppContext, OutputFormat, ScanArgs},
    cli_ext::render::{Palette, print_json},
    core::marker::{Marker, extract_all_markers},
    infra::io::read_text,
};

#[derive(Tabled)]
struct MarkerRow
{
    #[tabled(rename = "#")]
    index: usize,
    marker: String,
    start: usize,
    end: usize,
}

#[instrument(skip(ctx), fields(file = %args.file.display()))]
pub fn run(
    args: ScanArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let text = read_text(&args.file)?;
    let markers = extract_all_markers(&text);

    match ctx.format
    {
        OutputFormat::Json => print_json(&json!({
            "file": args.file.display().to_string(),
            "count": markers.len(),
            "markers": markers,
        })),
        OutputFormat::Text =>
        {
            print_table(&markers, ctx);
            Ok(())
        }
    }
}

fn print_table(
    markers: &[Marker],
    ctx: &AppContext,
)
{
    let palette = Palette::new(ctx);
    if markers.is_empty()
    {
        if !ctx.quiet
        {
            println!("{}", palette.dim("no markers found"));
        }
        return;
    }

    let rows: Vec<MarkerRow> = markers
        .iter()
        .enumerate()
        .map(|(i, m)| MarkerRow {
            index: i + 1,
            marker: m
                .text
                .clone(),
            start: m.position,
            end: m.end_position,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");

    if !ctx.quiet
    {
        println!("{} markers", palette.marker(&markers.len().to_string()));
    }
}
