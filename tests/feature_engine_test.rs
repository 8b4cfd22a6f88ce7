use chrono::{Days, NaiveDate};
use cryptocast::application::feature_engineering_service::FeatureEngine;
use cryptocast::config::FeatureConfig;
use cryptocast::domain::market::{PriceBar, PriceSeries};

fn series(closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::from_close(start + Days::new(i as u64), c))
        .collect();
    PriceSeries::new("BTC/USDT", bars).unwrap()
}

/// Deterministic zig-zag with drift, always positive.
fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 200.0 + (i as f64 * 0.9).sin() * 15.0 + i as f64 * 0.3)
        .collect()
}

#[test]
fn test_eight_close_scenario() {
    let config = FeatureConfig {
        ma_windows: vec![7],
        ..FeatureConfig::basic()
    };
    let engine = FeatureEngine::new(config).unwrap();
    let closes = [100.0, 102.0, 101.0, 105.0, 110.0, 108.0, 107.0, 111.0];

    let table = engine.compute(&series(&closes)).unwrap();

    assert_eq!(table.len(), 1);
    let ma = table.column("MA_7").unwrap()[0];
    let expected = (102.0 + 101.0 + 105.0 + 110.0 + 108.0 + 107.0 + 111.0) / 7.0;
    assert!((ma - expected).abs() < 1e-9);
    assert!(table.column("Volatility_7").unwrap()[0] > 0.0);
}

#[test]
fn test_row_count_matches_warmup() {
    let engine = FeatureEngine::new(FeatureConfig::default()).unwrap();
    for n in [30, 31, 64, 250] {
        let table = engine.compute(&series(&wave(n))).unwrap();
        assert_eq!(table.len(), n - 29, "n = {}", n);
    }
}

#[test]
fn test_stream_matches_batch() {
    let engine = FeatureEngine::new(FeatureConfig::default()).unwrap();
    let s = series(&wave(120));

    let table = engine.compute(&s).unwrap();
    let streamed: Vec<_> = engine.stream(s.bars().to_vec(), s.columns()).collect();
    assert_eq!(streamed.as_slice(), table.rows());
}

#[test]
fn test_extended_invariants() {
    let engine = FeatureEngine::new(FeatureConfig::default()).unwrap();
    let table = engine.compute(&series(&wave(300))).unwrap();

    for rsi in table.column("RSI_14").unwrap() {
        assert!((0.0..=100.0).contains(&rsi));
    }
    let upper = table.column("BB_Upper").unwrap();
    let mid = table.column("BB_Mid").unwrap();
    let lower = table.column("BB_Lower").unwrap();
    for i in 0..table.len() {
        assert!(upper[i] >= mid[i] && mid[i] >= lower[i]);
    }
    for row in table.rows() {
        assert!(row.values.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_ma_locality() {
    let config = FeatureConfig {
        ma_windows: vec![7],
        ..FeatureConfig::basic()
    };
    let engine = FeatureEngine::new(config).unwrap();
    let original = wave(80);
    let mut changed = original.clone();
    changed[10] *= 3.0;

    let a = engine.compute(&series(&original)).unwrap().column("MA_7").unwrap();
    let b = engine.compute(&series(&changed)).unwrap().column("MA_7").unwrap();

    // Output row k is input row k + 7; only windows ending at inputs 10..=16 see the change
    for k in 0..a.len() {
        let end = k + 7;
        if (10..=16).contains(&end) {
            assert!(b[k] > a[k], "row {}", k);
        } else {
            assert_eq!(a[k], b[k], "row {}", k);
        }
    }
}

#[test]
fn test_constant_series_fixed_points() {
    let engine = FeatureEngine::new(FeatureConfig::default()).unwrap();
    let table = engine.compute(&series(&[42.0; 60])).unwrap();

    for name in ["MA_7", "MA_30", "EMA_12", "EMA_26", "BB_Mid"] {
        for v in table.column(name).unwrap() {
            assert!((v - 42.0).abs() < 1e-9, "{} = {}", name, v);
        }
    }
    for v in table.column("RSI_14").unwrap() {
        assert_eq!(v, 50.0);
    }
    for v in table.column("MACD").unwrap() {
        assert!(v.abs() < 1e-9);
    }
}
