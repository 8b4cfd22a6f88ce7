pub mod binance;
pub mod core;
pub mod mock;
pub mod observability;
pub mod persistence;

pub use binance::BinanceHistoricalDataService;
pub use mock::MockHistoricalDataService;
