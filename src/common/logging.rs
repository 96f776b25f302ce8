//! Structured Logging for zStake
//!
//! Provides structured logging with:
//! - JSON output on mainnet, pretty output elsewhere
//! - Correlation IDs tying a service call to the events it commits
//! - Security event logging for rejected proofs and unauthorized mints
//!
//! # Usage
//!
//! ```rust,ignore
//! use zstake::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?;
//! tracing::info!(target: "zstake::service", "ledger opened");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::types::LedgerEvent;

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Stake,
    Claim,
    Withdrawal,
    /// Proof rejections, unauthorized mints
    Security,
    /// Startup, restore
    System,
    Error,
}

impl EventCategory {
    pub fn for_event(event: &LedgerEvent) -> Self {
        match event {
            LedgerEvent::Staked { .. } => EventCategory::Stake,
            LedgerEvent::InterestClaimed { .. } => EventCategory::Claim,
            LedgerEvent::WithdrawRequested { .. } | LedgerEvent::WithdrawFinalized { .. } => {
                EventCategory::Withdrawal
            }
        }
    }
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Logging
// ============================================================================

/// Log a committed ledger event
pub fn log_ledger_event(event: &LedgerEvent, correlation_id: &str) {
    let data = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    let entry = LogEvent::new(LogLevel::Info, EventCategory::for_event(event), event.name())
        .with_correlation_id(correlation_id)
        .with_data(data);

    tracing::info!(target: "zstake::ledger", "{}", entry.to_json());
}

/// Log a rejected ledger operation
pub fn log_ledger_failure(operation: &str, code: &str, message: &str, correlation_id: &str) {
    let entry = LogEvent::new(LogLevel::Warn, EventCategory::Error, operation)
        .with_correlation_id(correlation_id)
        .with_error(code, message);

    tracing::warn!(target: "zstake::ledger", "{}", entry.to_json());
}

/// Log a security-related event
pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Security, event_type).with_data(
        serde_json::json!({
            "success": success,
            "details": details
        }),
    );
    if let Some(id) = correlation_id {
        event = event.with_correlation_id(id);
    }

    if success {
        tracing::info!(target: "zstake::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "zstake::security", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zstake={}", level.as_filter())));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_target(true).with_file(false))
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from ZStakeConfig
pub fn init_from_config(config: &super::config::ZStakeConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.network.json_logs())
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for a service call
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Handle};

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Warn, EventCategory::Security, "proof_rejected")
            .with_correlation_id("corr-1")
            .with_data(serde_json::json!({"handle": "0x00"}))
            .with_error("INVALID_PROOF", "invalid disclosure proof");

        let json = event.to_json();
        assert!(json.contains("\"category\":\"security\""));
        assert!(json.contains("\"level\":\"WARN\""));
        assert!(json.contains("corr-1"));
        assert!(json.contains("INVALID_PROOF"));
    }

    #[test]
    fn test_event_categories() {
        let account = AccountId::from_label("alice");
        let handle = Handle([7u8; 32]);
        let staked = LedgerEvent::Staked {
            account,
            handle,
            timestamp: 1,
        };
        let finalized = LedgerEvent::WithdrawFinalized {
            account,
            handle,
            amount: 5,
            timestamp: 2,
        };
        assert_eq!(EventCategory::for_event(&staked), EventCategory::Stake);
        assert_eq!(EventCategory::for_event(&finalized), EventCategory::Withdrawal);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }
}
