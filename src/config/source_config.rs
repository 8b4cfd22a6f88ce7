//! Where raw price data comes from and how raw CSV files are laid out.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Layout of a raw per-symbol CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLayout {
    /// One header row naming the columns, matched case-insensitively.
    #[default]
    Headed,
    /// Three metadata rows, then `Date, Close, High, Low, Open, Volume`.
    Yahoo,
}

impl FromStr for RawLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headed" => Ok(RawLayout::Headed),
            "yahoo" => Ok(RawLayout::Yahoo),
            _ => anyhow::bail!("Invalid raw layout: {}. Must be 'headed' or 'yahoo'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub binance_base_url: String,
    pub raw_layout: RawLayout,
    /// Seed of the mock random walk; each symbol derives its own stream from it.
    pub mock_seed: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            binance_base_url: "https://api.binance.com".to_string(),
            raw_layout: RawLayout::Headed,
            mock_seed: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_layout_parsing() {
        assert_eq!("Yahoo".parse::<RawLayout>().unwrap(), RawLayout::Yahoo);
        assert_eq!("headed".parse::<RawLayout>().unwrap(), RawLayout::Headed);
        assert!("parquet".parse::<RawLayout>().is_err());
    }
}
