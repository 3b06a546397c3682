use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use refmark::cli::{AppContext, Cli, Commands};
use refmark::{cli_ext, infra};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    infra::logging::init(cli.verbose, cli.no_color);
    let cfg = infra::config::load_config()?;

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color || !cfg.output.color,
        verbose: cli.verbose,
        format: cli.format.unwrap_or(cfg.output.format),
    };

    let ok = match cli.command {
        Commands::Scan(args) => cli_ext::scan_cmd::run(args, &ctx).map(|()| true),
        Commands::Validate(args) => cli_ext::validate_cmd::run(args, &ctx),
        Commands::Insert(args) => cli_ext::insert_cmd::run(args, &ctx, &cfg),
        Commands::Repair(args) => cli_ext::repair_cmd::run(args, &ctx),
        Commands::Init(args) => infra::config::init(args, &ctx).map(|()| true),
        Commands::Completions(args) => refmark::completion::run(args, &ctx).map(|()| true),
    }?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
