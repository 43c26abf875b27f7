//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_signal_writer;
pub mod file_config_adapter;
pub mod paper_ledger;
