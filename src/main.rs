// Proposal Forge - command line entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use proposal_forge::config::Settings;
use proposal_forge::logging::init_logging;
use proposal_forge::services::agent_composer::AgentEvent;
use proposal_forge::services::proposal::{
    apply_overrides, build_root_agent, default_pipeline, load_pipeline_file, render_banner,
    render_pipeline, render_report, PipelineFormat, PipelineOverrides, DEFAULT_QUERY,
};
use proposal_forge::services::{InMemorySessionService, Runner};
use proposal_forge::utils::paths;
use proposal_forge_llm::create_provider;

#[derive(Parser)]
#[command(name = "proposal-forge", version)]
#[command(about = "Research a winning science competition topic and write a proposal for it")]
struct Cli {
    /// Extra config file layered over the user and project files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the research proposal pipeline (default)
    Run(RunArgs),
    /// Print the default pipeline definition
    Pipeline {
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Check that the model provider is reachable
    Check,
    /// Write a starter config file
    InitConfig {
        /// Destination (defaults to ./proposal-forge.toml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Default)]
struct RunArgs {
    /// User query sent to the pipeline
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,
    /// Read the user query from a file
    #[arg(long)]
    query_file: Option<PathBuf>,
    /// Model used by every agent
    #[arg(long)]
    model: Option<String>,
    /// Cap on writer/evaluator refinement rounds
    #[arg(long)]
    max_refinements: Option<u32>,
    /// Pipeline definition (.json or .toml) to run instead of the default
    #[arg(long)]
    pipeline: Option<PathBuf>,
    /// Write the run summary as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Toml,
}

impl From<Format> for PipelineFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => PipelineFormat::Json,
            Format::Toml => PipelineFormat::Toml,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_command(config, args).await,
        Commands::Pipeline { format } => pipeline_command(config, format),
        Commands::Check => check_command(config).await,
        Commands::InitConfig { path, force } => init_config_command(path, force),
    }
}

async fn run_command(config: Option<&Path>, args: RunArgs) -> Result<()> {
    let (mut settings, sources) =
        Settings::load_with_sources(config).context("Failed to load configuration")?;
    if let Some(ref model) = args.model {
        settings.llm.model = model.clone();
    }
    if let Some(max) = args.max_refinements {
        settings.pipeline.max_refinements = max;
    }

    let log_file = init_logging(&settings.logging).context("Failed to initialize logging")?;
    println!("✅ Logging configured - log file: {}", log_file.display());
    sources.log();

    if !settings.has_api_key() {
        let var = settings.llm.provider.api_key_env();
        println!("⚠️  Warning: {} not found in environment variables.", var);
        println!("Please set it in your .env file or environment.");
        println!("Example: export {}='your-api-key-here'", var);
    }

    let query = match (args.query, args.query_file) {
        (Some(query), _) => query,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read query file {}", path.display()))?,
        (None, None) => settings
            .pipeline
            .query
            .clone()
            .unwrap_or_else(|| DEFAULT_QUERY.to_string()),
    };

    let pipeline = match args.pipeline {
        Some(path) => {
            let mut pipeline = load_pipeline_file(&path)?;
            apply_overrides(
                &mut pipeline,
                &PipelineOverrides {
                    model: args.model,
                    max_refinements: args.max_refinements,
                },
            );
            pipeline
        }
        None => default_pipeline(&settings.pipeline_options()),
    };
    let root = build_root_agent(&pipeline)?;

    let provider = create_provider(settings.provider_config())?;
    let sessions = Arc::new(InMemorySessionService::new());
    let session = sessions
        .create_session(
            &settings.session.app_name,
            &settings.session.user_id,
            Some(&settings.session.session_id),
        )
        .await?;
    let runner = Runner::new(settings.session.app_name.clone(), root, sessions, provider)
        .with_config(settings.agent_config());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    print!("{}", render_banner(&query));
    let summary = runner
        .run_with(
            &settings.session.user_id,
            &session.id,
            &query,
            cancel,
            |event| {
                if let AgentEvent::Started { agent } = event {
                    println!("   ▶ {}", agent);
                }
            },
        )
        .await?;

    println!("{}", render_report(&summary.final_state));

    if let Some(path) = args.output {
        paths::ensure_parent_dir(&path)?;
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }
    Ok(())
}

fn pipeline_command(config: Option<&Path>, format: Format) -> Result<()> {
    let settings = Settings::load(config)?;
    let pipeline = default_pipeline(&settings.pipeline_options());
    println!("{}", render_pipeline(&pipeline, format.into())?);
    Ok(())
}

async fn check_command(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config)?;
    let provider = create_provider(settings.provider_config())?;
    provider
        .health_check()
        .await
        .with_context(|| format!("{} provider check failed", provider.name()))?;
    println!("✅ {} is reachable (model {})", provider.name(), provider.model());

    if let Some(models) = provider.list_models().await? {
        println!("Available models:");
        for model in models {
            println!("  - {}", model);
        }
    }
    Ok(())
}

fn init_config_command(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(paths::local_config_path);
    Settings::write_starter(&path, force)?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}
