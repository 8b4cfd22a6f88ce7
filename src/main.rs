use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cryptocast::application::pipeline::{BatchDriver, BatchReport};
use cryptocast::config::{FeatureSetKind, Mode, PipelineConfig, StorageConfig, parse_symbols};
use cryptocast::domain::market::symbol::normalize_crypto_symbol;
use cryptocast::domain::ports::HistoricalDataService;
use cryptocast::domain::validation::SeriesCleaner;
use cryptocast::infrastructure::observability::init_tracing;
use cryptocast::infrastructure::persistence::CsvStore;
use cryptocast::infrastructure::{BinanceHistoricalDataService, MockHistoricalDataService};
use cryptocast::interfaces::TerminalChart;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily crypto price features and baseline models", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated symbols, e.g. BTC/USDT,ETH/USDT
    #[arg(long, global = true)]
    symbols: Option<String>,

    /// Root for raw/, processed/ and models/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Data source: mock or binance
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Feature set: basic or extended
    #[arg(long, global = true)]
    feature_set: Option<String>,

    /// Preprocess symbols in parallel
    #[arg(long, global = true)]
    parallel: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download daily bars into the raw directory
    Fetch,
    /// Clean raw data and write feature tables
    Preprocess,
    /// Train the baseline models on the feature tables
    Train,
    /// Fetch, preprocess and train
    Run,
    /// Chart the closing prices of one symbol from its raw file
    Plot {
        symbol: String,
        #[arg(long, default_value_t = 80)]
        width: usize,
        #[arg(long, default_value_t = 20)]
        height: usize,
    },
}

impl Cli {
    /// CLI flags go on top of file and environment settings.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if let Some(symbols) = &self.symbols {
            config.symbols = parse_symbols(symbols)?;
        }
        if let Some(dir) = &self.data_dir {
            config.storage = StorageConfig::under(dir);
        }
        if let Some(mode) = &self.mode {
            config.mode = Mode::from_str(mode)?;
        }
        if let Some(kind) = &self.feature_set {
            config.features.kind = FeatureSetKind::from_str(kind)?;
        }
        if self.parallel {
            config.parallel = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn data_source(config: &PipelineConfig) -> Arc<dyn HistoricalDataService> {
    match config.mode {
        Mode::Mock => Arc::new(MockHistoricalDataService::new(config.source.mock_seed)),
        Mode::Binance => Arc::new(BinanceHistoricalDataService::new(
            config.source.binance_base_url.clone(),
        )),
    }
}

fn plot(config: &PipelineConfig, symbol: &str, width: usize, height: usize) -> Result<()> {
    let symbol = normalize_crypto_symbol(&symbol.to_uppercase()).map_err(|e| anyhow::anyhow!(e))?;
    let store = CsvStore::new(config.storage.clone(), config.source.raw_layout);
    let raw = store.read_raw(&symbol)?;
    let series = SeriesCleaner::clean(&symbol, raw)?;
    print!("{}", TerminalChart::new(width, height).render(&series));
    Ok(())
}

fn finish(report: BatchReport) -> Result<()> {
    println!("{}", report);
    if report.all_failed() {
        anyhow::bail!("every symbol failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.pipeline_config().context("Invalid configuration")?;
    info!(
        "cryptocast {}: mode={:?} symbols={}",
        env!("CARGO_PKG_VERSION"),
        config.mode,
        config.symbols.join(",")
    );

    if let Command::Plot {
        symbol,
        width,
        height,
    } = &cli.command
    {
        return plot(&config, symbol, *width, *height);
    }

    let source = data_source(&config);
    let driver = BatchDriver::new(config, source)?;
    let report = match cli.command {
        Command::Fetch => driver.fetch_all().await,
        Command::Preprocess => driver.preprocess_all(),
        Command::Train => driver.train_all(),
        Command::Run => driver.run_all().await,
        Command::Plot { .. } => BatchReport::default(),
    };
    finish(report)
}
