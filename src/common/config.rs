//! Environment-based Configuration for zStake
//!
//! Settings are read from `ZSTAKE_*` environment variables (a `.env` file is
//! loaded first when present).
//!
//! # Environment Variables
//!
//! - `ZSTAKE_NETWORK` - "mainnet", "testnet", or "devnet" (default: "devnet")
//! - `ZSTAKE_REWARD_RATE` - yield units per staked unit per day (required on mainnet)
//! - `ZSTAKE_UNIT_SCALE` - base units per staked unit (default: 10^18)
//! - `ZSTAKE_LEDGER_ID` - label of the ledger principal, the only authorized minter
//! - `ZSTAKE_DB_PATH` - SQLite database path (default: "data/zstake.db")
//! - `ZSTAKE_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::ledger::AccrualParams;
use crate::types::{AccountId, UNIT_SCALE};

/// Default reward: 1,000,000 yield units per unit per day
pub const DEFAULT_REWARD_RATE: u128 = 1_000_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidValue(
                "ZSTAKE_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Structured JSON logs are used on mainnet
    pub fn json_logs(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct ZStakeConfig {
    pub network: Network,

    /// Yield units per `unit_scale` base units per day
    pub reward_rate: u128,

    /// Base units per staked unit
    pub unit_scale: u128,

    /// Label the ledger principal is derived from
    pub ledger_label: String,

    pub db_path: String,

    pub log_level: String,
}

impl Default for ZStakeConfig {
    fn default() -> Self {
        Self {
            network: Network::Devnet,
            reward_rate: DEFAULT_REWARD_RATE,
            unit_scale: UNIT_SCALE,
            ledger_label: "zstake-ledger".to_string(),
            db_path: "data/zstake.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ZStakeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let network: Network = lookup("ZSTAKE_NETWORK")
            .unwrap_or_else(|| "devnet".to_string())
            .parse()?;

        let reward_rate = match lookup("ZSTAKE_REWARD_RATE") {
            Some(v) => parse_number("ZSTAKE_REWARD_RATE", &v)?,
            None if network == Network::Mainnet => {
                return Err(ConfigError::MissingEnvVar("ZSTAKE_REWARD_RATE".to_string()))
            }
            None => defaults.reward_rate,
        };

        let unit_scale = match lookup("ZSTAKE_UNIT_SCALE") {
            Some(v) => parse_number("ZSTAKE_UNIT_SCALE", &v)?,
            None => defaults.unit_scale,
        };
        if unit_scale == 0 {
            return Err(ConfigError::InvalidValue(
                "ZSTAKE_UNIT_SCALE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let ledger_label = lookup("ZSTAKE_LEDGER_ID").unwrap_or(defaults.ledger_label);
        if ledger_label.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "ZSTAKE_LEDGER_ID".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let db_path = lookup("ZSTAKE_DB_PATH").unwrap_or(defaults.db_path);
        let log_level = lookup("ZSTAKE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            network,
            reward_rate,
            unit_scale,
            ledger_label,
            db_path,
            log_level,
        })
    }

    pub fn accrual_params(&self) -> AccrualParams {
        AccrualParams::new(self.reward_rate, self.unit_scale)
    }

    /// Ledger principal (the single authorized minter)
    pub fn ledger_id(&self) -> AccountId {
        AccountId::from_label(&self.ledger_label)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("=== zStake Configuration ===");
        println!("Network: {:?}", self.network);
        println!("Reward Rate: {} units/unit/day", self.reward_rate);
        println!("Unit Scale: {}", self.unit_scale);
        println!("Ledger ID: {} ({})", self.ledger_id(), self.ledger_label);
        println!("Database: {}", self.db_path);
        println!("Log Level: {}", self.log_level);
        println!("============================");
    }
}

fn parse_number(key: &str, value: &str) -> Result<u128, ConfigError> {
    value
        .trim()
        .replace('_', "")
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a non-negative integer".to_string()))
}
