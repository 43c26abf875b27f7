//! Core domain types and logic.

pub mod ohlcv;
pub mod rolling;
pub mod stats;
pub mod estimator;
pub mod engine;
pub mod signal;
pub mod position;
pub mod risk;
pub mod replay;
pub mod config_validation;
pub mod error;
