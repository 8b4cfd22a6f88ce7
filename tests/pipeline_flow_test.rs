use chrono::NaiveDate;
use cryptocast::application::pipeline::{BatchDriver, Stage, StageOutput};
use cryptocast::config::{FeatureSetKind, PipelineConfig, RawLayout, StorageConfig};
use cryptocast::domain::errors::ErrorKind;
use cryptocast::domain::ports::HistoricalDataService;
use cryptocast::infrastructure::MockHistoricalDataService;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_root() -> PathBuf {
    std::env::temp_dir().join(format!("cryptocast-{}", uuid::Uuid::new_v4()))
}

/// Jan 1 to Jun 30 2023: 181 daily bars per symbol.
fn config(root: &PathBuf) -> PipelineConfig {
    let mut config = PipelineConfig {
        symbols: vec![
            "BTC/USDT".to_string(),
            "ETH/USDT".to_string(),
            "SOL/USDT".to_string(),
        ],
        start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 6, 30),
        storage: StorageConfig::under(root),
        ..PipelineConfig::default()
    };
    config.training.n_trees = 10;
    config
}

fn driver(config: PipelineConfig, failing: &[&str]) -> BatchDriver {
    let source = MockHistoricalDataService::new(config.source.mock_seed)
        .with_failing_symbols(failing.iter().copied());
    BatchDriver::new(config, Arc::new(source)).unwrap()
}

#[tokio::test]
async fn test_failed_symbol_does_not_stop_the_batch() {
    let root = temp_root();
    let driver = driver(config(&root), &["ETH/USDT"]);

    let report = driver.run_all().await;

    let eth = report.outcome("ETH/USDT", Stage::Fetch).unwrap();
    assert_eq!(eth.result.as_ref().unwrap_err().kind, ErrorKind::Fetch);
    // A symbol that failed to fetch is not preprocessed or trained
    assert!(report.outcome("ETH/USDT", Stage::Preprocess).is_none());
    assert!(report.outcome("ETH/USDT", Stage::Train).is_none());

    assert_eq!(
        report.succeeded(Stage::Train),
        vec!["BTC/USDT".to_string(), "SOL/USDT".to_string()]
    );
    assert!(report.has_failures());
    assert!(!report.all_failed());

    let storage = &driver.config().storage;
    assert!(storage.features_path("BTC/USDT").exists());
    assert!(!storage.features_path("ETH/USDT").exists());
    assert!(storage.model_path("SOL/USDT", "random_forest").exists());
    assert!(storage.model_path("SOL/USDT", "linear_regression").exists());

    let summary = report.to_string();
    assert!(summary.contains("FAILED [fetch]"));
    assert!(summary.ends_with("7 ok, 1 failed"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn test_features_file_layout() {
    let root = temp_root();
    let driver = driver(config(&root), &[]);

    driver.fetch_all().await;
    let report = driver.preprocess_all();

    match &report.outcome("BTC/USDT", Stage::Preprocess).unwrap().result {
        // 181 bars minus the 29-row MA_30 warm-up
        Ok(StageOutput::Preprocessed { rows, .. }) => assert_eq!(*rows, 152),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let content =
        std::fs::read_to_string(driver.config().storage.features_path("BTC/USDT")).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Date,Close,Open,High,Low,Volume,Daily_Return,MA_7,MA_30,EMA_12,EMA_26,\
         MACD,MACD_Signal,MACD_Diff,Volatility_7,RSI_14,BB_Mid,BB_Std,BB_Upper,\
         BB_Lower,BB_Width,BB_Pct,Volume_MA_7"
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 152);
    // First fully defined day is the 30th
    assert!(rows[0].starts_with("2023-01-30,"));
    assert!(rows.last().unwrap().starts_with("2023-06-30,"));
    assert!(rows.iter().all(|r| !r.contains(",,") && !r.contains("NaN")));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn test_reruns_are_byte_identical() {
    let first = temp_root();
    let second = temp_root();

    for root in [&first, &second] {
        let mut config = config(root);
        config.parallel = root == &second;
        let driver = driver(config, &[]);
        driver.fetch_all().await;
        assert!(!driver.preprocess_all().has_failures());
    }

    for symbol in ["BTC/USDT", "ETH/USDT", "SOL/USDT"] {
        let a = std::fs::read(StorageConfig::under(&first).features_path(symbol)).unwrap();
        let b = std::fs::read(StorageConfig::under(&second).features_path(symbol)).unwrap();
        assert_eq!(a, b, "{} differs between runs", symbol);
    }

    // Preprocessing the same raw files again rewrites the same bytes
    let driver = driver(config(&first), &[]);
    let path = StorageConfig::under(&first).features_path("BTC/USDT");
    let before = std::fs::read(&path).unwrap();
    driver.preprocess_all();
    assert_eq!(before, std::fs::read(&path).unwrap());

    let _ = std::fs::remove_dir_all(first);
    let _ = std::fs::remove_dir_all(second);
}

#[tokio::test]
async fn test_basic_feature_set() {
    let root = temp_root();
    let mut config = config(&root);
    config.symbols = vec!["BTC/USDT".to_string()];
    config.features.kind = FeatureSetKind::Basic;
    let driver = driver(config, &[]);

    driver.fetch_all().await;
    assert!(!driver.preprocess_all().has_failures());

    let content =
        std::fs::read_to_string(driver.config().storage.features_path("BTC/USDT")).unwrap();
    assert_eq!(
        content.lines().next().unwrap(),
        "Date,Close,Open,High,Low,Volume,Daily_Return,MA_7,MA_30,Volatility_7"
    );

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn test_missing_raw_file_is_reported() {
    let root = temp_root();
    let driver = driver(config(&root), &[]);

    let report = driver.preprocess_all();
    assert!(report.all_failed());
    for outcome in report.stage(Stage::Preprocess) {
        assert_eq!(
            outcome.result.as_ref().unwrap_err().kind,
            ErrorKind::MissingInput
        );
    }
}

#[tokio::test]
async fn test_yahoo_layout_keeps_fetched_closes() {
    let root = temp_root();
    let mut config = config(&root);
    config.symbols = vec!["BTC/USDT".to_string()];
    config.end_date = NaiveDate::from_ymd_opt(2023, 3, 31);
    config.source.raw_layout = RawLayout::Yahoo;
    config.features.kind = FeatureSetKind::Basic;
    let (start, end, seed) = (config.start_date, config.end_date.unwrap(), config.source.mock_seed);
    let driver = driver(config, &[]);

    let report = driver.run_all().await;
    assert!(!report.has_failures(), "{}", report);
    match &report.outcome("BTC/USDT", Stage::Preprocess).unwrap().result {
        // 90 bars minus the 29-row MA_30 warm-up
        Ok(StageOutput::Preprocessed { rows, .. }) => assert_eq!(*rows, 61),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let bars = MockHistoricalDataService::new(seed)
        .get_daily_bars("BTC/USDT", start, end)
        .await
        .unwrap();
    let content =
        std::fs::read_to_string(driver.config().storage.features_path("BTC/USDT")).unwrap();
    let mut lines = content.lines();
    assert!(lines.next().unwrap().starts_with("Date,Close,Open,"));
    for (line, bar) in lines.zip(&bars[29..]) {
        let cells: Vec<&str> = line.split(',').collect();
        assert_eq!(cells[0], bar.date.to_string());
        assert_eq!(cells[1].parse::<f64>().unwrap(), bar.close);
        assert_eq!(cells[2].parse::<f64>().unwrap(), bar.open.unwrap());
    }

    let _ = std::fs::remove_dir_all(root);
}
