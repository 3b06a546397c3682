use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs, OutputFormat};
use crate::core::orchestrator::RecoveryOptions;
use crate::core::repair::RepairRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Reindexing and recovery settings
    pub reindex: ReindexConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig
{
    /// Require sequences to start at 1 with no gaps
    pub strict_mode: bool,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay_ms: u64,
    /// Strip repeated markers between attempts
    pub repair_duplicates: bool,
    /// Renumber 1..n between attempts
    pub close_gaps: bool,
    /// Degrade instead of failing once retries are exhausted
    pub enable_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig
{
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self { reindex: ReindexConfig::default(), output: OutputConfig::default() }
    }
}

impl Default for ReindexConfig
{
    fn default() -> Self
    {
        Self {
            strict_mode: true,
            max_retries: 2,
            retry_delay_ms: 25,
            repair_duplicates: false,
            close_gaps: false,
            enable_fallback: true,
        }
    }
}

impl Default for OutputConfig
{
    fn default() -> Self
    {
        Self { format: OutputFormat::Text, color: true }
    }
}

impl Config
{
    /// Engine recovery policy from the `[reindex]` section
    pub fn recovery_options(&self) -> RecoveryOptions
    {
        RecoveryOptions {
            max_retries: self
                .reindex
                .max_retries,
            retry_delay: Duration::from_millis(
                self.reindex
                    .retry_delay_ms,
            ),
            repair: RepairRequest {
                duplicates: self
                    .reindex
                    .repair_duplicates,
                gaps: self
                    .reindex
                    .close_gaps,
            },
            enable_fallback: self
                .reindex
                .enable_fallback,
        }
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Layer the first config file found in `dir` with `REFMARK_` env vars
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_names = ["refmark.toml", "refmark.yaml", "refmark.json", ".refmark.toml"];

    for name in &config_names
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // REFMARK_REINDEX__MAX_RETRIES=5 style overrides
    builder = builder.add_source(
        config::Environment::with_prefix("REFMARK")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("refmark.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
