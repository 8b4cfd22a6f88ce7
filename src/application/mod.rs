// Indicator computation
pub mod feature_engineering_service;
pub mod market_data;

// Baseline models
pub mod ml;

// Batch orchestration
pub mod pipeline;
