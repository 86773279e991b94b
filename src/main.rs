//! hero-trivia CLI - Checkpointed trivia generation for hero profiles.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hero_trivia::models::{PersistenceMode, load_records};
use hero_trivia::{AppendLogStore, CheckpointManager, Config, Processor, client, store};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "hero-trivia")]
#[command(version)]
#[command(about = "Generate trivia questions for hero profiles with resumable checkpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Path overrides shared by the subcommands that touch the data files.
#[derive(clap::Args)]
struct PathArgs {
    /// Path to input hero profiles (JSON array)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to output questions file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to checkpoint file
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

impl PathArgs {
    fn apply(self, config: &mut Config) {
        if let Some(input) = self.input {
            config.paths.input = input;
        }
        if let Some(output) = self.output {
            config.paths.output = output;
        }
        if let Some(checkpoint) = self.checkpoint {
            config.paths.checkpoint = checkpoint;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate questions, resuming after the last checkpoint
    Generate {
        #[command(flatten)]
        paths: PathArgs,

        /// Append results to a JSON-lines log instead of rewriting the document
        #[arg(long)]
        append_log: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show checkpoint progress against the input file
    Status {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Delete the checkpoint so the next run starts from the first hero
    Reset {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Fold a JSON-lines output log into a regular output document
    Compact {
        /// Output log to read
        #[arg(long)]
        log: PathBuf,

        /// Document to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir {log_dir:?}"))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("hero_trivia_generator")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)
        .context("Failed to create log file appender")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_ansi(false)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set subscriber")?;

    Ok(guard)
}

fn print_example_config() {
    let example = r#"# hero-trivia configuration file

[service]
provider = "anthropic"            # or "openai_compatible"
# api_key = "${ANTHROPIC_API_KEY}"
# api_key_env = "ANTHROPIC_API_KEY"
# base_url = "https://api.anthropic.com"
model = "claude-3-sonnet-20240229"
max_tokens = 4000
temperature = 0.2
timeout_secs = 180

[generation]
question_count = 15
max_answer_words = 5
excluded_options = ["Amazon", "Google", "AWS", "Microsoft"]
strict_items = true
# prompt_template = "prompts/trivia.txt"

[retry]
max_attempts = 3
delay_secs = 5.0
backoff = "fixed"                 # or "exponential"
# factor = 2.0
# max_delay_secs = 60.0

[paths]
input = "aws_heroes.json"
output = "aws_heroes_questions.json"
checkpoint = "processing_state.json"
log_dir = "logs"
persistence = "rewrite"           # or "append_log"
"#;
    println!("{example}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Example = cli.command {
        print_example_config();
        return Ok(());
    }

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    let _log_guard = setup_logging(cli.verbose, &config.paths.log_dir)?;

    match cli.command {
        Commands::Example => {}

        Commands::Validate => {
            config.validate().context("Invalid configuration")?;
            config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            info!("Configuration is valid");
            info!(
                "  Service: {:?} {} at {}",
                config.service.provider,
                config.service.model,
                config.service.resolved_base_url()
            );
            info!(
                "  Retry: {} attempts, {:?} backoff from {}s",
                config.retry.max_attempts, config.retry.backoff, config.retry.delay_secs
            );
            info!("  Persistence: {:?}", config.paths.persistence);
        }

        Commands::Generate {
            paths,
            append_log,
            no_progress,
        } => {
            paths.apply(&mut config);
            if append_log {
                config.paths.persistence = PersistenceMode::AppendLog;
            }
            config.validate().context("Invalid configuration")?;

            let records = load_records(&config.paths.input).context("Failed to load heroes")?;
            let service = client::from_config(&config).context("Failed to create client")?;
            let store = store::open_store(config.paths.persistence, &config.paths.output)
                .context("Failed to open output store")?;
            let checkpoint = CheckpointManager::open(&config.paths.checkpoint)
                .context("Failed to open checkpoint")?;

            let mut processor = Processor::from_config(&config, service, store, checkpoint)?
                .with_progress(!no_progress);

            let stats = processor
                .run_from_checkpoint(&records)
                .await
                .context("Trivia generation stopped; rerun to resume from the checkpoint")?;

            println!("\n=== Trivia Generation Complete ===");
            println!("Heroes:      {}", stats.total_records);
            println!("Started at:  {}", stats.start_index);
            println!("Processed:   {}", stats.processed);
            println!("New:         {}", stats.inserted);
            println!("Replaced:    {}", stats.replaced);
            println!("Attempts:    {} ({} failed)", stats.attempts, stats.failed_attempts);
            println!("Checkpoint:  {}", stats.last_processed_index);
            println!("Remaining:   {}", stats.remaining());
            println!("Throughput:  {:.0}/hr", stats.throughput_per_hour);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("Output:      {:?}", config.paths.output);
        }

        Commands::Status { paths } => {
            paths.apply(&mut config);
            let records = load_records(&config.paths.input).context("Failed to load heroes")?;
            let checkpoint = CheckpointManager::open(&config.paths.checkpoint)
                .context("Failed to open checkpoint")?;

            let total = records.len();
            let next = checkpoint.resume_index();
            println!("Heroes:      {total}");
            println!(
                "Checkpoint:  {}",
                checkpoint.state().last_processed_index
            );
            println!("Remaining:   {}", total.saturating_sub(next));
            match records.get(next) {
                Some(hero) => println!("Next hero:   {} (index {next})", hero.name),
                None => println!("Next hero:   none, all heroes processed"),
            }
        }

        Commands::Reset { paths } => {
            paths.apply(&mut config);
            if CheckpointManager::reset(&config.paths.checkpoint)? {
                println!("Removed checkpoint {:?}", config.paths.checkpoint);
            } else {
                println!("No checkpoint at {:?}", config.paths.checkpoint);
            }
        }

        Commands::Compact { log, output } => {
            if log == output {
                bail!("--log and --output must be different files");
            }
            let doc = AppendLogStore::open(&log)
                .with_context(|| format!("Failed to open output log {log:?}"))?
                .compact(&output)?;
            println!("Wrote {} heroes to {output:?}", doc.len());
        }
    }

    Ok(())
}
