//! Main entry point for the hybrid attention anomaly detector
//!
//! This binary provides a unified CLI interface:
//! - Model training on a CSV series
//! - Evaluation and per-window anomaly scoring
//! - Feature attribution for a single window

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use hybrid_attention_anomaly::{
    load_csv, preprocess, score_windows, train_test_split,
    utils::{level_from_verbosity, setup_logging, Config},
    AnomalyThreshold, ExecutionContext, GradientExplainer, HybridModel, MinMaxScaler, Trainer,
    WindowDataset,
};

#[derive(Parser)]
#[command(name = "attention-anomaly")]
#[command(version = "0.1.0")]
#[command(about = "CNN-LSTM attention autoencoder for time-series anomaly detection", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on a CSV series
    Train {
        /// Path to training data CSV
        #[arg(short, long)]
        data: String,

        /// Output model path (.ot or .safetensors)
        #[arg(short, long, default_value = "models/hybrid.ot")]
        output: String,

        /// Number of epochs (overrides config)
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Mean reconstruction loss of a trained model on a series
    Evaluate {
        #[arg(short, long)]
        data: String,

        #[arg(short, long)]
        model: String,
    },

    /// Score every window and flag anomalies
    Score {
        #[arg(short, long)]
        data: String,

        #[arg(short, long)]
        model: String,

        /// Threshold percentile (overrides config)
        #[arg(short, long)]
        percentile: Option<f64>,
    },

    /// Attribute one window's reconstruction to its input features
    Explain {
        #[arg(short, long)]
        data: String,

        #[arg(short, long)]
        model: String,

        /// Index of the window to explain
        #[arg(short, long)]
        index: usize,
    },

    /// Show configuration and model summary
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config);
    setup_logging(level_from_verbosity(cli.verbose, &config.logging.level))?;
    info!("Using configuration from {}", cli.config);

    match cli.command {
        Commands::Train { data, output, epochs } => train(config, &data, &output, epochs),
        Commands::Evaluate { data, model } => evaluate(&config, &data, &model),
        Commands::Score {
            data,
            model,
            percentile,
        } => score(&config, &data, &model, percentile),
        Commands::Explain { data, model, index } => explain(&config, &data, &model, index),
        Commands::Info => show_info(&config),
    }
}

/// Sidecar file stored next to the model parameters
fn sidecar(model_path: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{}", model_path, suffix))
}

fn read_series(config: &Config, path: &str) -> Result<(Array2<f32>, Vec<String>)> {
    let skip: Vec<&str> = config.data.skip_columns.iter().map(String::as_str).collect();
    let (series, names) = load_csv(path, &skip).with_context(|| format!("reading {}", path))?;
    info!("Loaded {} timesteps x {} features", series.nrows(), series.ncols());
    Ok((series, names))
}

fn train(mut config: Config, data: &str, output: &str, epochs: Option<usize>) -> Result<()> {
    let (series, names) = read_series(&config, data)?;
    config.model.input_size = series.ncols() as i64;
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }

    let (train_raw, val_raw) = train_test_split(&series, config.data.train_ratio)?;
    let (train_scaled, scaler) = preprocess(&train_raw, config.data.normalize)?;
    let train_set = WindowDataset::new(train_scaled, config.data.window_size)?;

    let val_set = if val_raw.nrows() > config.data.window_size {
        let val_scaled = match &scaler {
            Some(scaler) => scaler.transform(&val_raw)?,
            None => val_raw,
        };
        Some(WindowDataset::new(val_scaled, config.data.window_size)?)
    } else {
        warn!("Validation split too short for one window; training without validation");
        None
    };

    let ctx = ExecutionContext::auto();
    let mut model = HybridModel::new(config.model.clone(), ctx.device())?;
    info!(
        "Model with {} parameters, features: {}",
        model.num_parameters(),
        names.join(", ")
    );

    let trainer = Trainer::with_context(config.training.clone(), ctx);
    let history = trainer.train(&mut model, &train_set, val_set.as_ref())?;

    if let Some(parent) = Path::new(output).parent() {
        std::fs::create_dir_all(parent)?;
    }
    model.save(output)?;
    if let Some(scaler) = &scaler {
        scaler.save(sidecar(output, "scaler.json"))?;
    }
    config.save(sidecar(output, "toml"))?;

    let scores = score_windows(&model, &train_set, &ctx, config.training.batch_size)?;
    let threshold =
        AnomalyThreshold::from_percentile(&scores, config.detection.threshold_percentile)?;

    if let Some(last) = history.last() {
        println!("Final epoch: {}", last);
    }
    println!(
        "Training-set threshold (p{}): {:.6}",
        config.detection.threshold_percentile, threshold.value
    );
    println!("Saved model to {}", output);

    Ok(())
}

/// Rebuild the model and scaler saved by `train`
fn load_artifacts(config: &Config, model_path: &str) -> Result<(Config, HybridModel, Option<MinMaxScaler>)> {
    let config_path = sidecar(model_path, "toml");
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        warn!(
            "No {} found; assuming the architecture in the CLI configuration",
            config_path.display()
        );
        config.clone()
    };

    let scaler_path = sidecar(model_path, "scaler.json");
    let scaler = if scaler_path.exists() {
        Some(MinMaxScaler::load(&scaler_path)?)
    } else {
        None
    };

    let mut model = HybridModel::new(config.model.clone(), ExecutionContext::auto().device())?;
    model
        .load(model_path)
        .with_context(|| format!("loading parameters from {}", model_path))?;

    Ok((config, model, scaler))
}

fn windows_for(config: &Config, scaler: Option<&MinMaxScaler>, data: &str) -> Result<(WindowDataset, Vec<String>)> {
    let (series, names) = read_series(config, data)?;
    let series = match scaler {
        Some(scaler) => scaler.transform(&series)?,
        None => series,
    };
    Ok((WindowDataset::new(series, config.data.window_size)?, names))
}

fn evaluate(config: &Config, data: &str, model_path: &str) -> Result<()> {
    let (config, model, scaler) = load_artifacts(config, model_path)?;
    let (dataset, _) = windows_for(&config, scaler.as_ref(), data)?;

    let trainer = Trainer::with_context(config.training.clone(), ExecutionContext::new(model.device()));
    let loss = trainer.evaluate(&model, &dataset)?;
    println!("Mean reconstruction loss over {} windows: {:.6}", dataset.len(), loss);
    Ok(())
}

fn score(config: &Config, data: &str, model_path: &str, percentile: Option<f64>) -> Result<()> {
    let (config, model, scaler) = load_artifacts(config, model_path)?;
    let (dataset, _) = windows_for(&config, scaler.as_ref(), data)?;

    let ctx = ExecutionContext::new(model.device());
    let scores = score_windows(&model, &dataset, &ctx, config.training.batch_size)?;

    let percentile = percentile.unwrap_or(config.detection.threshold_percentile);
    let threshold =
        AnomalyThreshold::from_leading(&scores, config.data.train_ratio, percentile)?;
    let report = threshold.detect(&scores);

    println!(
        "Threshold (p{} of leading {:.0}% of windows): {:.6}",
        percentile,
        config.data.train_ratio * 100.0,
        threshold.value
    );
    println!(
        "Anomalous windows: {} / {} ({:.2}%)",
        report.anomaly_count(),
        scores.len(),
        report.anomaly_rate() * 100.0
    );
    for index in report.anomaly_indices() {
        println!("  window {:>6}  score {:.6}", index, report.scores[index]);
    }
    Ok(())
}

fn explain(config: &Config, data: &str, model_path: &str, index: usize) -> Result<()> {
    let (config, model, scaler) = load_artifacts(config, model_path)?;
    let (dataset, names) = windows_for(&config, scaler.as_ref(), data)?;

    let background_size = config.explain.background_size.min(dataset.len());
    if background_size == 0 {
        bail!("no windows available for the background set");
    }
    let device = model.device();
    let background_indices: Vec<usize> = (0..background_size).collect();
    let background = dataset.batch(&background_indices, device)?;
    let target = dataset.batch(&[index], device)?;

    let explainer = GradientExplainer::new(&model, &background, config.explain.clone())?;
    let attribution = explainer.explain(&target, dataset.num_features())?;

    println!("Window {} explained against {} background windows", index, background_size);
    println!("Feature ranking (mean |attribution|):");
    for (rank, (feature, score)) in attribution.ranked_features().into_iter().enumerate() {
        let name = names.get(feature).map(String::as_str).unwrap_or("?");
        println!("  {:>2}. {:<20} {:.6}", rank + 1, name, score);
    }
    Ok(())
}

fn show_info(config: &Config) -> Result<()> {
    println!("\nHybrid Attention Anomaly Detector v0.1.0");
    println!("═══════════════════════════════════════════════════════════════\n");

    println!("Data:");
    println!("  Window Size:     {}", config.data.window_size);
    println!("  Normalize:       {}", config.data.normalize);
    println!("  Train Ratio:     {}", config.data.train_ratio);
    println!();

    println!("Model Architecture:");
    println!("  Input Features:  {}", config.model.input_size);
    println!("  CNN Channels:    {}", config.model.cnn_out_channels);
    println!("  Kernel Size:     {}", config.model.kernel_size);
    println!("  LSTM Hidden:     {}", config.model.lstm_hidden_size);
    println!("  LSTM Layers:     {}", config.model.lstm_layers);
    println!("  AE Hidden:       {}", config.model.ae_hidden_size);

    let model = HybridModel::new(config.model.clone(), tch::Device::Cpu)?;
    println!("  Parameters:      {}", model.num_parameters());
    println!();

    println!("Training Settings:");
    println!("  Epochs:          {}", config.training.epochs);
    println!("  Batch Size:      {}", config.training.batch_size);
    println!("  Learning Rate:   {}", config.training.learning_rate);
    println!("  Lambda Entropy:  {}", config.training.lambda_entropy);
    println!();

    println!("Explanation:");
    println!("  Samples:         {}", config.explain.n_samples);
    println!("  Background:      {}", config.explain.background_size);
    println!();

    println!("Device: {:?}", tch::Device::cuda_if_available());
    println!("═══════════════════════════════════════════════════════════════\n");
    Ok(())
}
