//! Binary entry point for datalayer.
//!
//! Reads, writes and concatenates configured datasets from the command line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use datalayer::config::LayerConfig;
use datalayer::io::{
    CodecRegistry, Dataset, EntityReadService, EntityWriteService, ReadOptions, concatenate_parts,
};
use datalayer::models::{BatchInfo, Entity};
use datalayer::observability::{self, LoggingConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Datalayer - moves records between files and the entity graph.
#[derive(Parser)]
#[command(name = "datalayer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(
        short,
        long,
        global = true,
        env = "DATALAYER_CONFIG",
        default_value = "datalayer.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List configured datasets.
    Datasets,

    /// Read a dataset file and print its entities as a JSON array.
    Read {
        /// Dataset name.
        dataset: String,

        /// Encoded input file.
        input: PathBuf,

        /// Abort on the first invalid record.
        #[arg(long)]
        strict: bool,
    },

    /// Encode a JSON array of entities into a dataset file.
    Write {
        /// Dataset name.
        dataset: String,

        /// JSON file holding an array of entities.
        entities: PathBuf,

        /// Output file.
        output: PathBuf,

        /// Sync identifier recorded in the logs.
        #[arg(long, default_value = "cli")]
        sync_id: String,

        /// Abort on the first invalid entity.
        #[arg(long)]
        strict: bool,
    },

    /// Merge already encoded parts into one file.
    Concat {
        /// Dataset name.
        dataset: String,

        /// Output file.
        output: PathBuf,

        /// Parts, in order.
        #[arg(required = true)]
        parts: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(config.logging.as_ref(), cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads the configuration file, or an empty configuration if it is absent.
fn load_config(path: &Path) -> anyhow::Result<LayerConfig> {
    if !path.exists() {
        return Ok(LayerConfig::new());
    }
    let config = LayerConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// Runs the selected command.
fn run_command(command: Commands, config: &LayerConfig) -> anyhow::Result<()> {
    let registry = CodecRegistry::with_defaults();
    match command {
        Commands::Datasets => cmd_datasets(config),
        Commands::Read {
            dataset,
            input,
            strict,
        } => cmd_read(&open_dataset(config, &registry, &dataset)?, &input, strict),
        Commands::Write {
            dataset,
            entities,
            output,
            sync_id,
            strict,
        } => cmd_write(
            &open_dataset(config, &registry, &dataset)?,
            &entities,
            &output,
            sync_id,
            strict,
        ),
        Commands::Concat {
            dataset,
            output,
            parts,
        } => cmd_concat(&open_dataset(config, &registry, &dataset)?, &output, &parts),
    }
}

fn open_dataset(
    config: &LayerConfig,
    registry: &CodecRegistry,
    name: &str,
) -> anyhow::Result<Arc<Dataset>> {
    let Some(definition) = config.dataset(name) else {
        bail!("no dataset named {name}");
    };
    let dataset = Dataset::from_definition(definition, registry)
        .with_context(|| format!("dataset {name} is misconfigured"))?;
    Ok(Arc::new(dataset))
}

fn cmd_datasets(config: &LayerConfig) -> anyhow::Result<()> {
    if config.datasets.is_empty() {
        println!("No datasets configured");
        return Ok(());
    }
    for definition in &config.datasets {
        match definition.source_config.encoding() {
            Ok(encoding) => println!(
                "{}\t{encoding}\t*.{}",
                definition.name,
                encoding.extension()
            ),
            Err(e) => println!("{}\t-\t{e}", definition.name),
        }
    }
    Ok(())
}

fn cmd_read(dataset: &Arc<Dataset>, input: &Path, strict: bool) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("cannot open {}", input.display()))?;
    let options = ReadOptions::default().with_skip_invalid(!strict);
    let result = EntityReadService::new(Arc::clone(dataset))
        .read_entities(Box::new(BufReader::new(file)), options)?;

    for error in &result.errors {
        eprintln!("{error}");
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &result.entities)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_write(
    dataset: &Arc<Dataset>,
    entities: &Path,
    output: &Path,
    sync_id: String,
    strict: bool,
) -> anyhow::Result<()> {
    let file =
        File::open(entities).with_context(|| format!("cannot open {}", entities.display()))?;
    let entities: Vec<Entity> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a JSON array of entities", entities.display()))?;

    let out = File::create(output).with_context(|| format!("cannot create {}", output.display()))?;
    let result = EntityWriteService::new(Arc::clone(dataset))
        .with_skip_invalid(!strict)
        .write_complete(&entities, Box::new(BufWriter::new(out)), &BatchInfo::single(sync_id))?;

    for error in &result.errors {
        eprintln!("{error}");
    }
    println!(
        "Wrote {} entities to {} ({} skipped, {} empty)",
        result.written,
        output.display(),
        result.skipped_invalid,
        result.suppressed
    );
    Ok(())
}

fn cmd_concat(dataset: &Arc<Dataset>, output: &Path, parts: &[PathBuf]) -> anyhow::Result<()> {
    let files = parts
        .iter()
        .map(|path| {
            File::open(path)
                .map(BufReader::new)
                .with_context(|| format!("cannot open {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let out = File::create(output).with_context(|| format!("cannot create {}", output.display()))?;
    let merged = concatenate_parts(dataset, files, Box::new(BufWriter::new(out)))?;
    println!("Merged {merged} parts into {}", output.display());
    Ok(())
}
