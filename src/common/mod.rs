//! Common Module
//!
//! Shared infrastructure for zStake:
//! - `config` - environment-based configuration
//! - `error` - root error type
//! - `logging` - structured logging

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigError, Network, ZStakeConfig};
pub use error::{Result, ZStakeError};
pub use logging::{init_from_config, init_logging, LogLevel, LoggingError};
