//! Port traits at the boundary with the host and the outside world.

pub mod config_port;
pub mod data_port;
pub mod holdings_port;
pub mod signal_port;
