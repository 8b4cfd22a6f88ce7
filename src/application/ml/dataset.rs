//! Supervised view of a feature table: next-day close as the target and a
//! chronological train/test split.

use crate::domain::errors::PipelineError;
use crate::domain::ml::FeatureDataset;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisedSplit {
    pub feature_names: Vec<String>,
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<f64>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<f64>,
    /// Dates of the test rows (the day the features were observed).
    pub test_dates: Vec<NaiveDate>,
}

impl SupervisedSplit {
    /// `Target[i] = Close[i + 1]`; the last row has no target and is dropped.
    /// The first `floor((1 - test_size) * n)` rows train, the rest test.
    /// No shuffling: the test rows are always the most recent ones.
    pub fn from_dataset(dataset: &FeatureDataset, test_size: f64) -> Result<Self, PipelineError> {
        let training_error = |reason: String| PipelineError::Training {
            symbol: dataset.symbol.clone(),
            reason,
        };

        if dataset.feature_names.is_empty() {
            return Err(training_error("no feature columns".to_string()));
        }

        let n = dataset.len().saturating_sub(1);
        let split = ((1.0 - test_size) * n as f64).floor() as usize;
        if split == 0 || split >= n {
            return Err(training_error(format!(
                "{} labelled rows cannot be split with test_size {}",
                n, test_size
            )));
        }

        let x = &dataset.features[..n];
        let y = &dataset.closes[1..=n];

        Ok(Self {
            feature_names: dataset.feature_names.clone(),
            x_train: x[..split].to_vec(),
            y_train: y[..split].to_vec(),
            x_test: x[split..].to_vec(),
            y_test: y[split..].to_vec(),
            test_dates: dataset.dates[split..n].to_vec(),
        })
    }

    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn dataset(rows: usize) -> FeatureDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        FeatureDataset {
            symbol: "BTC/USDT".to_string(),
            feature_names: vec!["MA_7".to_string()],
            dates: (0..rows).map(|i| start + Days::new(i as u64)).collect(),
            closes: (0..rows).map(|i| 100.0 + i as f64).collect(),
            features: (0..rows).map(|i| vec![i as f64]).collect(),
        }
    }

    #[test]
    fn test_target_is_next_close() {
        let split = SupervisedSplit::from_dataset(&dataset(11), 0.2).unwrap();
        // 10 labelled rows, 8 train, 2 test
        assert_eq!(split.train_len(), 8);
        assert_eq!(split.test_len(), 2);
        assert_eq!(split.x_train[0], vec![0.0]);
        assert_eq!(split.y_train[0], 101.0);
        assert_eq!(split.x_test[1], vec![9.0]);
        assert_eq!(split.y_test[1], 110.0);
        assert_eq!(split.test_dates.len(), 2);
    }

    #[test]
    fn test_split_floor() {
        // 7 labelled rows * 0.75 = 5.25 -> 5 train
        let split = SupervisedSplit::from_dataset(&dataset(8), 0.25).unwrap();
        assert_eq!(split.train_len(), 5);
        assert_eq!(split.test_len(), 2);
    }

    #[test]
    fn test_too_few_rows() {
        let err = SupervisedSplit::from_dataset(&dataset(2), 0.2).unwrap_err();
        assert!(matches!(err, PipelineError::Training { .. }));
        assert!(SupervisedSplit::from_dataset(&dataset(0), 0.2).is_err());
    }
}
