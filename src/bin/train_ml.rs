use anyhow::{Context, Result};
use clap::Parser;
use cryptocast::application::ml::{ModelTrainer, TrainingReport};
use cryptocast::config::{StorageConfig, TrainingConfig};
use cryptocast::infrastructure::observability::init_tracing;
use cryptocast::infrastructure::persistence::csv_store::read_features_from;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Trains the baseline models on a single features CSV.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a features CSV written by the preprocess stage
    #[arg(long)]
    input: PathBuf,

    /// Symbol used in logs and model file names, e.g. BTC/USDT
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    /// Directory for the saved models
    #[arg(long, default_value = "data/models")]
    output_dir: PathBuf,

    /// Fraction of the most recent rows held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    /// Number of trees in the random forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum depth of trees (unlimited when omitted)
    #[arg(long)]
    max_depth: Option<u16>,

    /// Minimum samples required to split an internal node
    #[arg(long, default_value_t = 2)]
    min_split: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Evaluate only, do not write model files
    #[arg(long)]
    no_save: bool,
}

fn print_report(report: &TrainingReport) {
    println!("\n══════════════════════════════════════════════════════");
    println!("  {} BASELINE MODELS", report.symbol);
    println!("══════════════════════════════════════════════════════");
    println!(
        "  Train rows: {:>6}   Test rows: {:>6}",
        report.train_rows, report.test_rows
    );
    println!("\n  {:<20} {:>12} {:>12} {:>8}", "Model", "MAE", "RMSE", "R2");
    for score in &report.scores {
        println!(
            "  {:<20} {:>12.4} {:>12.4} {:>8.4}",
            score.label, score.metrics.mae, score.metrics.rmse, score.metrics.r2
        );
    }
    for score in &report.scores {
        if let Some(path) = &score.saved_to {
            println!("  Saved {} to {}", score.model, path.display());
        }
    }
    println!("══════════════════════════════════════════════════════\n");
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(false);

    let config = TrainingConfig {
        test_size: args.test_size,
        n_trees: args.n_trees,
        max_depth: args.max_depth,
        min_samples_split: args.min_split,
        seed: args.seed,
        save_models: !args.no_save,
    };
    config.validate()?;

    println!("Loading features from {:?}", args.input);
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let dataset = read_features_from(
        BufReader::new(file),
        &args.symbol,
        &args.input.display().to_string(),
    )?;
    println!(
        "Loaded {} rows with {} features",
        dataset.len(),
        dataset.feature_names.len()
    );

    let storage = StorageConfig {
        models_dir: args.output_dir,
        ..StorageConfig::default()
    };
    let report = ModelTrainer::new(config, storage).train(&dataset)?;
    print_report(&report);
    Ok(())
}
