//! Command line front end
//!
//! - `train`: fit a BCM or Hopfield model on the configured dataset and save
//!   its weights
//! - `predict`: encode the configured dataset with saved weights, as CSV
//! - `info`: version and available options

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use tracing::info;

use plasticity::{
    setup_logging, ActivationType, BcmRule, Config, Dataset, HopfieldRule, OptimizerKind,
    PlasticityModel, PlasticityRule, RuleKind, WeightInit, VERSION,
};

#[derive(Parser)]
#[command(name = "plasticity")]
#[command(version)]
#[command(about = "Unsupervised BCM and Hopfield plasticity models", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and save its weights
    Train {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Output weights path, overrides [training] output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode the configured dataset with trained weights
    Predict {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Weights written by `train`
        #[arg(short, long)]
        weights: PathBuf,

        /// CSV output path, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version and available options
    Info,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Train { config, output } => {
            let config = load_config(&config, cli.verbose)?;
            let output = output.unwrap_or_else(|| config.training.output.clone());
            let dataset = config.load_dataset().context("Failed to load training data")?;
            info!(
                "Training {} model on {} samples with {} features",
                config.model.rule,
                dataset.n_samples(),
                dataset.n_features()
            );

            match config.rule()? {
                RuleKind::Bcm => {
                    train::<BcmRule>(&config, config.bcm_params()?, &dataset, &output)
                }
                RuleKind::Hopfield => {
                    train::<HopfieldRule>(&config, config.hopfield_params(), &dataset, &output)
                }
            }
        }

        Commands::Predict {
            config,
            weights,
            output,
        } => {
            let config = load_config(&config, cli.verbose)?;
            let dataset = config.load_dataset().context("Failed to load data")?;

            let encoded = match config.rule()? {
                RuleKind::Bcm => predict::<BcmRule>(&config, config.bcm_params()?, &dataset, &weights)?,
                RuleKind::Hopfield => {
                    predict::<HopfieldRule>(&config, config.hopfield_params(), &dataset, &weights)?
                }
            };

            match output {
                Some(path) => {
                    let writer = csv::Writer::from_path(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_csv(writer, &encoded, dataset.labels())?;
                    info!("Wrote {} encoded samples to {}", encoded.ncols(), path.display());
                }
                None => write_csv(csv::Writer::from_writer(std::io::stdout()), &encoded, dataset.labels())?,
            }
            Ok(())
        }

        Commands::Info => {
            println!("plasticity {}", VERSION);
            println!("rules:        bcm, hopfield");
            println!(
                "optimizers:   {}",
                OptimizerKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
            );
            println!("initializers: {}", WeightInit::TAGS.join(", "));
            println!(
                "activations:  {}",
                ActivationType::ALL.iter().map(|a| a.name()).collect::<Vec<_>>().join(", ")
            );
            println!("datasets:     mnist, cifar10");
            Ok(())
        }
    }
}

fn load_config(path: &Path, verbose: u8) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    // Setup logging based on verbosity
    let log_level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    setup_logging(log_level)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn build<R: PlasticityRule>(config: &Config, params: R::Params) -> Result<PlasticityModel<R>> {
    let model = PlasticityModel::<R>::new(
        config.model_config(),
        params,
        config.optimizer()?,
        config.weight_initializer()?,
    )?;
    Ok(model)
}

fn train<R: PlasticityRule>(
    config: &Config,
    params: R::Params,
    dataset: &Dataset,
    output: &Path,
) -> Result<()> {
    let mut model = build::<R>(config, params)?;
    let summary = model.fit(dataset.view(), config.training.epochs, config.training.seed)?;
    info!(
        "Training finished after {} epochs ({} iterations, converged: {}, final learning rate {:.3e})",
        summary.epochs_run, summary.iterations, summary.converged, summary.learning_rate
    );
    model
        .save_weights(output)
        .with_context(|| format!("Failed to save weights to {}", output.display()))?;
    Ok(())
}

fn predict<R: PlasticityRule>(
    config: &Config,
    params: R::Params,
    dataset: &Dataset,
    weights: &Path,
) -> Result<Array2<f32>> {
    let mut model = build::<R>(config, params)?;
    model.load_weights(weights)?;
    Ok(model.predict(dataset.view())?)
}

/// One row per sample, one column per output unit, plus the label if known
fn write_csv<W: std::io::Write>(
    mut writer: csv::Writer<W>,
    encoded: &Array2<f32>,
    labels: Option<&[u8]>,
) -> Result<()> {
    let mut header: Vec<String> = (0..encoded.nrows()).map(|i| format!("h{}", i)).collect();
    if labels.is_some() {
        header.push("label".to_string());
    }
    writer.write_record(&header)?;

    for (j, sample) in encoded.columns().into_iter().enumerate() {
        let mut record: Vec<String> = sample.iter().map(|v| v.to_string()).collect();
        if let Some(label) = labels.and_then(|l| l.get(j)) {
            record.push(label.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
