//! CLI argument parsing and command dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokrate_core::{OrchestratorBuilder, Report};
use tokrate_report::{ArtifactWriter, TextSummary};
use tokrate_vendors::{HttpClientPool, HttpConfig, HttpEndpointClient};

use crate::config::{ConfigFile, ResolvedRun, RunOverrides, DEFAULT_API_KEY_ENV};

/// tokrate - token throughput benchmark for streaming LLM endpoints
#[derive(Parser, Debug)]
#[command(name = "tokrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a token rate test against the selected profile
    Run(RunArgs),
    /// Load and validate a profile without sending requests
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Profile name (defaults to the active profile)
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Write an example configuration file
    Init {
        /// Path of the file to create
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Profile name (defaults to the active profile)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Concurrency levels, comma separated (e.g. 1,2,4)
    #[arg(short, long, value_delimiter = ',')]
    pub levels: Option<Vec<usize>>,

    /// File with one prompt per line
    #[arg(long)]
    pub prompts_file: Option<PathBuf>,

    /// Environment variable holding the API key
    #[arg(long, default_value = DEFAULT_API_KEY_ENV)]
    pub api_key_env: String,

    /// Directory for report artifacts
    #[arg(short, long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Pause between levels, in seconds
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Skip the SVG chart
    #[arg(long)]
    pub no_chart: bool,
}

impl RunArgs {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            profile: self.profile.clone(),
            levels: self.levels.clone(),
            prompts_file: self.prompts_file.clone(),
            api_key_env: Some(self.api_key_env.clone()),
            cooldown_secs: self.cooldown_secs,
        }
    }
}

impl Cli {
    /// Dispatch the selected command
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Run(args) => run(args).await,
            Commands::Validate { config, profile } => validate(config, profile.as_deref()),
            Commands::Init { config } => init(config),
        }
    }
}

async fn run(args: &RunArgs) -> Result<()> {
    let file = ConfigFile::load(&args.config)?;
    let resolved = ResolvedRun::resolve(&file, &args.overrides())?;
    print_banner(&resolved);

    // Per-request deadlines are enforced by the workers; the pool timeout
    // only has to stay out of their way.
    let http = HttpConfig::default()
        .with_request_timeout(resolved.config.timeout + Duration::from_secs(5))
        .with_pool_max_idle(max_level(&resolved));
    let pool = HttpClientPool::new(&http).context("failed to build HTTP client")?;
    let client = HttpEndpointClient::new(&pool, &resolved.config, resolved.api_type)
        .context("failed to create endpoint client")?;

    let orchestrator = OrchestratorBuilder::new()
        .config(resolved.config.clone())
        .client(Arc::new(client))
        .api_type(resolved.api_type.id())
        .build()?;

    let report = orchestrator.run_with_signal_handling().await?;

    println!();
    println!("{}", TextSummary::render(&report));

    let paths = ArtifactWriter::new(&args.output_dir)
        .with_chart(!args.no_chart)
        .write(&report)?;
    println!();
    println!("Report saved to {}", paths.text.display());
    println!("JSON saved to   {}", paths.json.display());
    if let Some(chart) = &paths.chart {
        println!("Chart saved to  {}", chart.display());
    }

    warn_if_partial(&report);
    Ok(())
}

fn validate(config: &Path, profile: Option<&str>) -> Result<()> {
    let file = ConfigFile::load(config)?;
    let overrides = RunOverrides {
        profile: profile.map(str::to_string),
        ..Default::default()
    };
    let resolved = ResolvedRun::resolve(&file, &overrides)?;

    println!(
        "Profile '{}' is valid: {} {} at {}",
        resolved.profile_name,
        resolved.api_type.display_name(),
        resolved.config.model,
        resolved.config.endpoint
    );
    println!(
        "  Levels: {:?}, prompts: {}, timeout: {}s, API key: {}",
        resolved.config.concurrency_levels,
        resolved.config.prompts.len(),
        resolved.config.timeout.as_secs(),
        if resolved.config.api_key.is_some() { "set" } else { "not set" }
    );
    Ok(())
}

fn init(config: &Path) -> Result<()> {
    ConfigFile::example().write_new(config)?;
    println!("Wrote example configuration to {}", config.display());
    Ok(())
}

fn print_banner(resolved: &ResolvedRun) {
    let rule = "=".repeat(70);
    println!("\n{}", rule);
    println!("   tokrate - Token Rate Test");
    println!("{}", rule);
    println!("  Profile:      {}", resolved.profile_name);
    println!("  API type:     {}", resolved.api_type.display_name());
    println!("  Endpoint:     {}", resolved.config.endpoint);
    println!("  Model:        {}", resolved.config.model);
    println!("  Levels:       {:?}", resolved.config.concurrency_levels);
    println!("  Prompts:      {}", resolved.config.prompts.len());
    println!("{}", rule);
    println!("Press Ctrl+C to stop after the current level, twice to abort.\n");
}

fn max_level(resolved: &ResolvedRun) -> usize {
    resolved
        .config
        .concurrency_levels
        .iter()
        .copied()
        .max()
        .unwrap_or(1)
}

fn warn_if_partial(report: &Report) {
    if !report.is_complete() {
        tracing::warn!(
            measured = report.levels.len(),
            configured = report.metadata.concurrency_levels.len(),
            "Run was cancelled; the report is partial"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "tokrate",
            "run",
            "--config",
            "bench.json",
            "--profile",
            "ollama",
            "--levels",
            "1,2,8",
            "--cooldown-secs",
            "0",
            "--no-chart",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("bench.json"));
        assert_eq!(args.levels, Some(vec![1, 2, 8]));
        assert_eq!(args.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(args.output_dir, PathBuf::from("outputs"));
        assert!(args.no_chart);

        let overrides = args.overrides();
        assert_eq!(overrides.profile.as_deref(), Some("ollama"));
        assert_eq!(overrides.cooldown_secs, Some(0));
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["tokrate", "init", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Init { .. }));
    }

    #[test]
    fn test_rejects_bad_levels() {
        assert!(Cli::try_parse_from(["tokrate", "run", "-c", "x.json", "--levels", "1,two"]).is_err());
    }

    #[test]
    fn test_validate_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        init(&path).unwrap();

        validate(&path, None).unwrap();
        validate(&path, Some("local-ollama")).unwrap();
        assert!(validate(&path, Some("nope")).is_err());
        assert!(init(&path).is_err());
    }
}
