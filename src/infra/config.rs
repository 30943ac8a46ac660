use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::budgeter::CounterKind;
use crate::core::git::DEFAULT_MAX_FILES;

/// Config file names tried in order; the first one found wins
pub const CONFIG_FILES: [&str; 4] = ["diffpack.toml", "diffpack.yaml", "diffpack.json", ".diffpack.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Diff acquisition defaults
    pub diff: DiffConfig,

    /// Context assembly defaults
    pub context: ContextConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig
{
    /// Ref the changes are compared against
    pub target: String,
    pub max_files: usize,
    pub ignore_whitespace: bool,

    /// Globs a path must match (any) when non-empty
    pub include: Vec<String>,

    /// Globs that always drop a path
    pub exclude: Vec<String>,
    pub skip_binary: bool,

    /// Seconds before a single git invocation is killed
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig
{
    pub max_tokens: usize,
    pub counter: CounterKind,
    pub model: String,

    /// Line cap for `dpack file`
    pub file_max_lines: usize,
}

impl Default for DiffConfig
{
    fn default() -> Self
    {
        Self {
            target: "main".to_string(),
            max_files: DEFAULT_MAX_FILES,
            ignore_whitespace: true,
            include: Vec::new(),
            exclude: Vec::new(),
            skip_binary: false,
            timeout_secs: 30,
        }
    }
}

impl Default for ContextConfig
{
    fn default() -> Self
    {
        Self {
            max_tokens: 8000,
            counter: CounterKind::Tiktoken,
            model: "gpt-4o".to_string(),
            file_max_lines: 500,
        }
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_in(Path::new("."))
}

/// Load the first config file found in `dir`, then `DIFFPACK_*` env overrides
/// (`DIFFPACK_DIFF__MAX_FILES=10`)
pub fn load_config_in(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            tracing::debug!(path = %path.display(), "loading config");
            builder = builder.add_source(config::File::from(path.as_path()));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DIFFPACK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("diff.include")
            .with_list_parse_key("diff.exclude"),
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
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
