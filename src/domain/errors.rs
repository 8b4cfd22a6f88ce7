use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning one symbol's data into features and models.
///
/// Every variant is scoped to a single series: the batch driver records it
/// in the report and moves on to the next symbol.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No source data for {symbol}: {} does not exist", path.display())]
    MissingInput { symbol: String, path: PathBuf },

    #[error("Schema error in {origin}: {reason}")]
    Schema { origin: String, reason: String },

    #[error("Data quality error for {symbol}: {reason}")]
    DataQuality { symbol: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Fetch failed for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    #[error("Training failed for {symbol}: {reason}")]
    Training { symbol: String, reason: String },
}

/// Coarse classification used in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingInput,
    Schema,
    DataQuality,
    Config,
    Io,
    Fetch,
    Training,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::MissingInput => "missing-input",
            ErrorKind::Schema => "schema",
            ErrorKind::DataQuality => "data-quality",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Training => "training",
        };
        write!(f, "{}", label)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingInput { .. } => ErrorKind::MissingInput,
            PipelineError::Schema { .. } => ErrorKind::Schema,
            PipelineError::DataQuality { .. } => ErrorKind::DataQuality,
            PipelineError::InvalidConfig(_) => ErrorKind::Config,
            PipelineError::Io { .. } => ErrorKind::Io,
            // Malformed rows surface as schema problems in the summary
            PipelineError::Csv(_) => ErrorKind::Schema,
            PipelineError::Fetch { .. } => ErrorKind::Fetch,
            PipelineError::Training { .. } => ErrorKind::Training,
        }
    }

    pub fn data_quality(symbol: &str, reason: impl Into<String>) -> Self {
        PipelineError::DataQuality {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn schema(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Schema {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_formatting() {
        let err = PipelineError::MissingInput {
            symbol: "BTC/USDT".to_string(),
            path: PathBuf::from("data/raw/BTC-USDT.csv"),
        };

        let msg = err.to_string();
        assert!(msg.contains("BTC/USDT"));
        assert!(msg.contains("BTC-USDT.csv"));
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn test_kind_labels() {
        let err = PipelineError::data_quality("ETH/USDT", "empty after cleaning");
        assert_eq!(err.kind().to_string(), "data-quality");
        assert!(err.to_string().contains("empty after cleaning"));

        let err = PipelineError::schema("raw.csv", "no Close column");
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
