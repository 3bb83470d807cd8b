//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use recipeloader_core::steps::sort_by_path_desc;
use recipeloader_core::{SourceRegistry, SourceStep, normalize, partition};
use recipeloader_shared::{AppConfig, RecipeError, SourceFile, init_config, load_config};
use tracing::info;

use crate::fs_source::GlobSource;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Build and inspect configured source pipelines.
#[derive(Parser)]
#[command(
    name = "recipeloader",
    version,
    about = "Normalize source definitions into pipelines and run them against the filesystem.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of the default lookup.
    #[arg(long, env = "RECIPELOADER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the groups and metadata of configured sources as JSON.
    Inspect {
        /// Source key to inspect (defaults to all).
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Run a configured source and list the files it produces.
    Run {
        /// Source key to run.
        #[arg(short, long)]
        key: String,

        /// List files sorted by path, greatest first.
        #[arg(long)]
        sorted: bool,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a starter config file into the current directory.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "recipeloader=info",
        1 => "recipeloader=debug",
        _ => "recipeloader=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Inspect { key } => {
            let config = load_config(config_path.as_deref())?;
            cmd_inspect(&config, key.as_deref())
        }
        Command::Run { key, sorted } => {
            let config = load_config(config_path.as_deref())?;
            cmd_run(&config, &key, sorted).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&load_config(config_path.as_deref())?),
        },
    }
}

fn registry(config: &AppConfig) -> SourceRegistry<SourceFile> {
    let step: Arc<dyn SourceStep<SourceFile>> = Arc::new(GlobSource);
    SourceRegistry::from_config(&config.sources, step)
}

fn cmd_inspect(config: &AppConfig, key: Option<&str>) -> Result<()> {
    let registry = registry(config);
    let keys: Vec<String> = match key {
        Some(key) => vec![key.to_string()],
        None => registry.keys().map(String::from).collect(),
    };
    info!(sources = keys.len(), "inspecting sources");

    let mut report = serde_json::Map::new();
    for key in keys {
        let pipeline = registry.get(&key)?;
        let spec = registry
            .spec(&key)
            .ok_or_else(|| eyre!("no source defined for `{key}`"))?;
        let groups = partition(&normalize(spec)?, registry.default_base());
        report.insert(
            key,
            serde_json::json!({
                "groups": groups,
                "meta": pipeline.meta(),
            }),
        );
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_run(config: &AppConfig, key: &str, sorted: bool) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let files = collect_files(config, key, sorted, &spinner).await?;
    spinner.finish_and_clear();

    for file in &files {
        match &file.contents {
            Some(contents) => {
                println!("{}  ({} bytes)", file.relative().display(), contents.len())
            }
            None => println!("{}", file.relative().display()),
        }
    }
    println!();
    println!("  Files: {}", files.len());
    Ok(())
}

/// Run the source configured under `key` and collect its files.
async fn collect_files(
    config: &AppConfig,
    key: &str,
    sorted: bool,
    progress: &ProgressBar,
) -> Result<Vec<SourceFile>> {
    let mut pipeline = registry(config).get(key)?;
    if sorted {
        pipeline = pipeline.pipe(&sort_by_path_desc());
    }
    info!(key, globs = pipeline.globs().len(), sorted, "running source");

    let mut files = Vec::new();
    let mut stream = pipeline.invoke();
    while let Some(item) = stream.next().await {
        let file = item.map_err(|e| RecipeError::recipe(key, e))?;
        progress.set_message(format!("[{}] {}", files.len() + 1, file.path.display()));
        files.push(file);
    }
    Ok(files)
}

fn cmd_config_init() -> Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
    let path = init_config(&cwd)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
