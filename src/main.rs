use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reel_compositor::{
    config::{Config, DataSourceKind},
    pipeline::{JobInput, JobStatus, Orchestrator},
    script::format::format_price,
    sources::{data_source_from_config, PropertyRecord},
    Job, TransitionStyle,
};

#[derive(Parser)]
#[command(
    name = "reel-compositor",
    version,
    about = "Turn property facts or narration scripts into narrated slideshow videos",
    long_about = "Reel-Compositor writes a narration script for a property auction case (or takes yours), \
                  synthesizes the narration, spreads it across the property images and renders one video \
                  with cross-fade transitions."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Property data source (mock, json); overrides the configuration
    #[arg(short, long, global = true)]
    source: Option<DataSourceKind>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a video for a property case
    Case {
        /// Case number, e.g. 2024타경12345
        case_number: String,

        /// Narrate this script file instead of writing one
        #[arg(long)]
        script: Option<PathBuf>,

        /// Transition style (fade, slide, zoom, dissolve, wipe, none)
        #[arg(short, long)]
        transition: Option<TransitionStyle>,
    },

    /// Write a narration script from an appraisal document, optionally render it
    Document {
        /// Document path or identifier
        reference: String,

        /// Save the generated script here for editing
        #[arg(long)]
        script_out: Option<PathBuf>,

        /// Render with this edited script
        #[arg(long, conflicts_with = "approve")]
        edited: Option<PathBuf>,

        /// Render with the generated script as-is
        #[arg(long)]
        approve: bool,

        /// Transition style (fade, slide, zoom, dissolve, wipe, none)
        #[arg(short, long)]
        transition: Option<TransitionStyle>,
    },

    /// List properties the data source knows about
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Write an example property JSON file
    Template {
        #[arg(short, long, default_value = "property_template.json")]
        output: PathBuf,
    },

    /// Write the default configuration
    InitConfig {
        #[arg(short, long, default_value = "reel.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Reel-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path).map_err(|e| anyhow::anyhow!(e.user_message()))?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    if let Some(source) = cli.source {
        config.sources.data = source;
    }

    match cli.command {
        Command::Case { case_number, script, transition } => {
            let input = match script {
                Some(path) => JobInput::Script {
                    case_number,
                    script: read_text(&path).await?,
                },
                None => JobInput::Case { case_number },
            };

            let orchestrator = Orchestrator::from_config(config);
            let job = run_job(&orchestrator, input, transition).await?;
            report(&job)
        }

        Command::Document { reference, script_out, edited, approve, transition } => {
            let orchestrator = Orchestrator::from_config(config);
            let job = run_job(&orchestrator, JobInput::Document { reference }, transition).await?;
            if job.status != JobStatus::ScriptReady {
                return report(&job);
            }

            let script = orchestrator.review_script(&job.id)?;
            match &script_out {
                Some(path) => {
                    tokio::fs::write(path, &script).await?;
                    info!("📝 Script saved to {:?}", path);
                }
                None => println!("{}", script),
            }

            let edited = match edited {
                Some(path) => Some(read_text(&path).await?),
                None if approve => None,
                None => {
                    info!("Review the script, then rerun with --approve or --edited <file> to render");
                    return Ok(());
                }
            };

            orchestrator.regenerate(&job.id, edited, transition)?;
            let job = orchestrator.wait_until_settled(&job.id).await?;
            report(&job)
        }

        Command::List { limit } => {
            let source = data_source_from_config(&config);
            let properties = source.search(limit).await?;
            if properties.is_empty() {
                warn!("Data source '{}' has no properties", source.name());
            }
            for p in properties {
                println!(
                    "{}\t{}\t{}\t{}",
                    p.case_number,
                    p.asset_type_name,
                    format_price(p.minimum_bid),
                    p.full_address()
                );
            }
            Ok(())
        }

        Command::Template { output } => {
            let json = serde_json::to_string_pretty(&PropertyRecord::template())?;
            tokio::fs::write(&output, json).await?;
            info!("Template written to {:?}", output);
            Ok(())
        }

        Command::InitConfig { output } => {
            if output.exists() {
                bail!("{:?} already exists", output);
            }
            Config::default().save_to_file(&output)?;
            info!("Default configuration written to {:?}", output);
            Ok(())
        }
    }
}

async fn run_job(
    orchestrator: &Orchestrator,
    input: JobInput,
    transition: Option<TransitionStyle>,
) -> Result<Job> {
    let job_id = orchestrator.create_job(input, transition)?;
    info!("Job {} started", job_id);
    Ok(orchestrator.wait_until_settled(&job_id).await?)
}

fn report(job: &Job) -> Result<()> {
    match (&job.status, &job.artifact_path) {
        (JobStatus::Completed, Some(path)) => {
            info!("Composition complete! Output saved to: {:?}", path);
            println!("{}", path.display());
            Ok(())
        }
        _ => bail!(
            "Job {} ended {}: {}",
            job.id,
            job.status,
            job.error.as_deref().unwrap_or("no output produced")
        ),
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}
