//! Parcelgraph CLI
//!
//! - `run`: one property seed → entity graph directory
//! - `classify`: resolve a single raw use-code value
//! - `clean`: delete previously generated files from a directory

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use parcelgraph_ingest::{run_property, PipelineError, PropertySeed, RunConfig};
use parcelgraph_store::{remove_stale_outputs, OutputPatterns};
use parcelgraph_taxonomy::{classify_property, ClassificationError, UseCodeClassifier, PROPERTY_TYPE_FIELD};

#[derive(Parser)]
#[command(name = "parcelgraph")]
#[command(author, version, about = "Parcelgraph: property records to a file-based entity graph")]
struct Cli {
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Log progress at info level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TaxonomyArgs {
    /// Use-code table to load instead of the embedded one.
    #[arg(long)]
    taxonomy: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a seed and write its entities and edges.
    Run {
        /// Seed JSON document.
        seed: PathBuf,
        /// Output directory.
        #[arg(short, long, default_value = "output")]
        out: PathBuf,
        /// Keep files from earlier runs instead of deleting them first.
        #[arg(long)]
        keep_stale: bool,
        #[command(flatten)]
        taxonomy: TaxonomyArgs,
    },

    /// Print the attribute record for one raw use-code value.
    Classify {
        value: String,
        /// Field path reported on failure.
        #[arg(long, default_value = PROPERTY_TYPE_FIELD)]
        field: String,
        #[command(flatten)]
        taxonomy: TaxonomyArgs,
    },

    /// Delete generated files from a directory.
    Clean { dir: PathBuf },
}

fn main() {
    if let Err(error) = run() {
        match classification_failure(&error) {
            Some(failure) => eprintln!("{}", failure.to_json()),
            None => eprintln!("parcelgraph error: {error:#}"),
        }
        std::process::exit(1);
    }
}

fn classification_failure(error: &anyhow::Error) -> Option<&ClassificationError> {
    if let Some(err) = error.downcast_ref::<ClassificationError>() {
        return Some(err);
    }
    error
        .downcast_ref::<PipelineError>()
        .and_then(PipelineError::as_classification)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Commands::Run {
            seed,
            out,
            keep_stale,
            taxonomy,
        } => {
            let config = RunConfig {
                output_dir: out,
                taxonomy_path: taxonomy.taxonomy,
                clean_stale: !keep_stale,
                ..RunConfig::default()
            };
            cmd_run(&seed, &config)
        }
        Commands::Classify { value, field, taxonomy } => {
            let config = RunConfig {
                taxonomy_path: taxonomy.taxonomy,
                ..RunConfig::default()
            };
            cmd_classify(&value, &field, &config)
        }
        Commands::Clean { dir } => cmd_clean(&dir),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("PARCELGRAPH_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn cmd_run(seed_path: &std::path::Path, config: &RunConfig) -> Result<()> {
    let taxonomy = config.load_taxonomy().context("failed to load use-code taxonomy")?;
    let classifier = UseCodeClassifier::new(&taxonomy);
    let seed = PropertySeed::from_path(seed_path)?;

    let mut writer = config.edge_writer();
    let summary = run_property(&seed, &classifier, config, &mut writer)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_classify(value: &str, field: &str, config: &RunConfig) -> Result<()> {
    let taxonomy = config.load_taxonomy().context("failed to load use-code taxonomy")?;
    let classifier = UseCodeClassifier::new(&taxonomy);
    let attributes = classify_property(&classifier, Some(value), field)?;
    println!("{}", serde_json::to_string_pretty(&attributes)?);
    Ok(())
}

fn cmd_clean(dir: &std::path::Path) -> Result<()> {
    let removed = remove_stale_outputs(dir, &OutputPatterns::generated())
        .with_context(|| format!("failed to clean `{}`", dir.display()))?;
    for name in &removed {
        println!("{name}");
    }
    tracing::info!(dir = %dir.display(), removed = removed.len(), "clean complete");
    Ok(())
}
