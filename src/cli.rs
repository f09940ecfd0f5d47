use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, info_span};

use stylenet::data::{DatasetSource, Split};
use stylenet::models::catalog::select;
use stylenet::{catalog, perf, run, run_autoencoder, ExperimentConfig};

#[derive(Parser, Debug)]
#[command(name = "stylenet", about = "Train and evaluate CNNs across stylised dataset variants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the selected models, then sweep their checkpoints
    Train(ExperimentArgs),

    /// Report stored checkpoints and re-evaluate them
    Perf(PerfArgs),
}

/// Flags override the JSON config, which overrides the built-in defaults.
#[derive(Args, Debug)]
pub struct ExperimentArgs {
    /// JSON file with an `ExperimentConfig`
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding `datasets/`; checkpoints go to `<root>/models`
    #[arg(long)]
    pub root_path: Option<PathBuf>,

    #[arg(long)]
    pub input_size: Option<u32>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Image decoding threads per batch
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Catalog entry to use; repeat for several (default: all)
    #[arg(long = "model")]
    pub models: Vec<String>,

    #[arg(long)]
    pub similarity_weight: Option<f64>,

    /// Stop every pass at its first logging point
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug)]
pub struct PerfArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Only print stored metrics, skip re-evaluation
    #[arg(long)]
    pub only_existing: bool,
}

impl ExperimentArgs {
    fn into_config(self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::load_json(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(v) = self.root_path { config.root_path = v; }
        if let Some(v) = self.input_size { config.input_size = v; }
        if let Some(v) = self.batch_size { config.batch_size = v; }
        if let Some(v) = self.workers { config.num_workers = v; }
        if let Some(v) = self.epochs { config.epochs = v; }
        if let Some(v) = self.learning_rate { config.learning_rate = v; }
        if let Some(v) = self.similarity_weight { config.similarity_weight = v; }
        if !self.models.is_empty() {
            config.models = self.models;
        }
        config.debug |= self.debug;
        Ok(config)
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => {
                let config = args.into_config()?;
                log_config(&config)?;
                train_all(&config)?;
                sweep(&config)
            }
            Commands::Perf(args) => {
                let mut config = args.experiment.into_config()?;
                config.only_existing |= args.only_existing;
                log_config(&config)?;
                sweep(&config)
            }
        }
    }
}

fn log_config(config: &ExperimentConfig) -> Result<()> {
    info!("config: {}", serde_json::to_string(config)?);
    Ok(())
}

fn train_all(config: &ExperimentConfig) -> Result<()> {
    let source = config.source();
    let num_classes = source.num_classes(&config.train_dataset)?;
    let entries = select(catalog(), &config.models)?;
    let run_config = config.run_config();

    let train_loader = source.loader(&config.train_dataset, Split::Train)?;
    let val_loader = source.loader(&config.train_dataset, Split::Val)?;

    for entry in &entries {
        let span = info_span!("run", model = entry.name);
        let _enter = span.enter();
        info!("Model Name {}", entry.name);

        let mut model = entry.build(&config.catalog_options(num_classes));
        if entry.capabilities.autoencoder {
            let pair_train = source.pair_loader(&config.train_dataset, Split::Train)?;
            let pair_val = source.pair_loader(&config.train_dataset, Split::Val)?;
            run_autoencoder(
                entry.name,
                model.as_mut(),
                pair_train.as_ref(),
                pair_val.as_ref(),
                train_loader.as_ref(),
                val_loader.as_ref(),
                &source,
                &run_config,
            )
            .with_context(|| format!("autoencoder run of {}", entry.name))?;
        } else {
            run(
                entry.name,
                model.as_mut(),
                train_loader.as_ref(),
                val_loader.as_ref(),
                &source,
                &run_config,
            )
            .with_context(|| format!("run of {}", entry.name))?;
        }
    }
    Ok(())
}

fn sweep(config: &ExperimentConfig) -> Result<()> {
    let source = config.source();
    let num_classes = source.num_classes(&config.train_dataset)?;
    let entries = select(catalog(), &config.models)?;
    perf(
        &entries,
        &config.catalog_options(num_classes),
        &source,
        &config.perf_options(),
        &mut |line: &str| println!("{line}"),
    );
    Ok(())
}
