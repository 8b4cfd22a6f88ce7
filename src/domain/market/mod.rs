pub mod price_series;
pub mod symbol;

pub use price_series::{PriceBar, PriceColumns, PriceSeries};
