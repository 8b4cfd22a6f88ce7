//! Flat CSV files: one raw file and one feature file per symbol.
//!
//! Raw files are always written in the headed layout. Reading also accepts
//! the Yahoo export layout (three metadata rows, fixed column order).
//! Numbers are written with Rust's shortest round-trip formatting, so the
//! same table always serializes to the same bytes.

use crate::config::{RawLayout, StorageConfig};
use crate::domain::errors::PipelineError;
use crate::domain::market::PriceBar;
use crate::domain::ml::{FeatureDataset, FeatureTable};
use crate::domain::validation::RawBar;
use chrono::NaiveDate;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";
const RAW_HEADER: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];
const YAHOO_METADATA_ROWS: usize = 3;

pub struct CsvStore {
    storage: StorageConfig,
    layout: RawLayout,
}

impl CsvStore {
    pub fn new(storage: StorageConfig, layout: RawLayout) -> Self {
        Self { storage, layout }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Writes `raw_dir/<stem>.csv` in the headed layout, replacing any previous file.
    pub fn write_raw(&self, symbol: &str, bars: &[PriceBar]) -> Result<PathBuf, PipelineError> {
        let path = self.storage.raw_path(symbol);
        let mut wtr = create_writer(&path)?;
        wtr.write_record(RAW_HEADER)?;
        for bar in bars {
            wtr.write_record([
                bar.date.format(DATE_FORMAT).to_string(),
                optional(bar.open),
                optional(bar.high),
                optional(bar.low),
                bar.close.to_string(),
                optional(bar.volume),
            ])?;
        }
        wtr.flush().map_err(|e| PipelineError::io(&path, e))?;
        info!("Saved {} raw bars for {} to {}", bars.len(), symbol, path.display());
        Ok(path)
    }

    pub fn read_raw(&self, symbol: &str) -> Result<Vec<RawBar>, PipelineError> {
        let path = self.storage.raw_path(symbol);
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                symbol: symbol.to_string(),
                path,
            });
        }
        let file = fs::File::open(&path).map_err(|e| PipelineError::io(&path, e))?;
        let rows = read_raw_from(file, self.layout, symbol, &path.display().to_string())?;
        debug!("Read {} raw rows for {} from {}", rows.len(), symbol, path.display());
        Ok(rows)
    }

    /// Writes `processed_dir/<stem>_features.csv`.
    pub fn write_features(&self, table: &FeatureTable) -> Result<PathBuf, PipelineError> {
        let path = self.storage.features_path(table.symbol());
        let mut wtr = create_writer(&path)?;
        wtr.write_record(table.header())?;

        let price_columns = table.price_columns();
        for row in table.rows() {
            let mut record = Vec::with_capacity(1 + price_columns.names().len() + row.values.len());
            record.push(row.bar.date.format(DATE_FORMAT).to_string());
            record.extend(price_columns.values(&row.bar).iter().map(f64::to_string));
            record.extend(row.values.iter().map(f64::to_string));
            wtr.write_record(&record)?;
        }
        wtr.flush().map_err(|e| PipelineError::io(&path, e))?;
        Ok(path)
    }

    pub fn read_features(&self, symbol: &str) -> Result<FeatureDataset, PipelineError> {
        let path = self.storage.features_path(symbol);
        if !path.exists() {
            return Err(PipelineError::MissingInput {
                symbol: symbol.to_string(),
                path,
            });
        }
        let file = fs::File::open(&path).map_err(|e| PipelineError::io(&path, e))?;
        read_features_from(file, symbol, &path.display().to_string())
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<fs::File>, PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    Ok(csv::Writer::from_path(path)?)
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl RawLayout {
    /// Layout implied by the first row of a file, if it is unambiguous.
    fn detect(first: &csv::StringRecord) -> Option<Self> {
        let has = |name: &str| first.iter().any(|h| h.trim().eq_ignore_ascii_case(name));
        if first
            .get(0)
            .is_some_and(|c| c.trim().eq_ignore_ascii_case("Price"))
        {
            Some(RawLayout::Yahoo)
        } else if has("Date") && has("Close") {
            Some(RawLayout::Headed)
        } else {
            None
        }
    }
}

/// Column positions of one raw layout.
struct RawColumns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
}

impl RawColumns {
    fn yahoo() -> Self {
        Self {
            date: 0,
            close: 1,
            high: Some(2),
            low: Some(3),
            open: Some(4),
            volume: Some(5),
        }
    }

    fn from_header(header: &csv::StringRecord, origin: &str) -> Result<Self, PipelineError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let date = find("Date").ok_or_else(|| PipelineError::schema(origin, "no Date column"))?;
        let close = find("Close").ok_or_else(|| PipelineError::schema(origin, "no Close column"))?;
        Ok(Self {
            date,
            close,
            open: find("Open"),
            high: find("High"),
            low: find("Low"),
            volume: find("Volume"),
        })
    }
}

/// Parses a raw CSV. The first row decides the layout when it is
/// recognisable (a `Price` metadata row or a header with `Date` and
/// `Close`), so files written by [`CsvStore::write_raw`] always read back as
/// headed; `layout` only applies otherwise. Empty cells become `None`; a
/// close cell that is present but not a number is a data-quality error.
pub fn read_raw_from<R: Read>(
    reader: R,
    layout: RawLayout,
    symbol: &str,
    origin: &str,
) -> Result<Vec<RawBar>, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = rdr.records();

    let first = records
        .next()
        .ok_or_else(|| PipelineError::schema(origin, "file is empty"))??;
    let columns = match RawLayout::detect(&first).unwrap_or(layout) {
        RawLayout::Headed => RawColumns::from_header(&first, origin)?,
        RawLayout::Yahoo => {
            for _ in 1..YAHOO_METADATA_ROWS {
                records
                    .next()
                    .ok_or_else(|| PipelineError::schema(origin, "missing metadata rows"))??;
            }
            RawColumns::yahoo()
        }
    };

    let mut rows = Vec::new();
    let mut skipped_cells = 0usize;

    for (idx, record) in records.enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = idx + 1;

        let date_cell = record.get(columns.date).unwrap_or_default();
        let date = parse_date(date_cell).ok_or_else(|| {
            PipelineError::schema(origin, format!("row {}: invalid date '{}'", line, date_cell))
        })?;

        let close = match record.get(columns.close).unwrap_or_default() {
            "" => None,
            cell => Some(cell.parse::<f64>().map_err(|_| {
                PipelineError::data_quality(
                    symbol,
                    format!("row {}: non-numeric close '{}'", line, cell),
                )
            })?),
        };

        let mut optional_cell = |idx: Option<usize>| -> Option<f64> {
            let cell = record.get(idx?)?;
            if cell.is_empty() {
                return None;
            }
            let value = cell.parse::<f64>().ok();
            if value.is_none() {
                skipped_cells += 1;
            }
            value
        };

        rows.push(RawBar {
            date,
            close,
            open: optional_cell(columns.open),
            high: optional_cell(columns.high),
            low: optional_cell(columns.low),
            volume: optional_cell(columns.volume),
        });
    }

    if skipped_cells > 0 {
        warn!(
            "{}: ignored {} non-numeric optional cells in {}",
            symbol, skipped_cells, origin
        );
    }
    Ok(rows)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let day = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Parses a features CSV. `Target`, if present, is ignored; it is always
/// rebuilt from Close.
pub fn read_features_from<R: Read>(
    reader: R,
    symbol: &str,
    origin: &str,
) -> Result<FeatureDataset, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let header = rdr.headers()?.clone();

    let date_idx = header
        .iter()
        .position(|h| h == "Date")
        .ok_or_else(|| PipelineError::schema(origin, "no Date column"))?;
    let close_idx = header
        .iter()
        .position(|h| h == "Close")
        .ok_or_else(|| PipelineError::schema(origin, "no Close column"))?;
    let feature_idx: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, h)| !matches!(*h, "Date" | "Close" | "Target"))
        .map(|(i, _)| i)
        .collect();

    let mut rows: Vec<(NaiveDate, f64, Vec<f64>)> = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = idx + 2;
        let cell = |i: usize| -> Result<f64, PipelineError> {
            let raw = record.get(i).unwrap_or_default();
            raw.parse::<f64>().map_err(|_| {
                PipelineError::data_quality(
                    symbol,
                    format!("line {}: '{}' in column {} is not a number", line, raw, &header[i]),
                )
            })
        };

        let date_cell = record.get(date_idx).unwrap_or_default();
        let date = parse_date(date_cell).ok_or_else(|| {
            PipelineError::schema(origin, format!("line {}: invalid date '{}'", line, date_cell))
        })?;
        let close = cell(close_idx)?;
        let features = feature_idx
            .iter()
            .map(|&i| cell(i))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((date, close, features));
    }

    rows.sort_by_key(|(date, _, _)| *date);

    Ok(FeatureDataset {
        symbol: symbol.to_string(),
        feature_names: feature_idx.iter().map(|&i| header[i].to_string()).collect(),
        dates: rows.iter().map(|(d, _, _)| *d).collect(),
        closes: rows.iter().map(|(_, c, _)| *c).collect(),
        features: rows.into_iter().map(|(_, _, f)| f).collect(),
    })
}
