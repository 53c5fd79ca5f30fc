//! Layered error definitions
//!
//! Categorized by source: config / wire / sensor / transport

use thiserror::Error;

use crate::SourceId;

/// Unified contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Wire Errors =====
    /// Frame could not be encoded or parsed
    #[error("wire format error: {message}")]
    WireFormat { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create wire format error
    pub fn wire_format(message: impl Into<String>) -> Self {
        Self::WireFormat {
            message: message.into(),
        }
    }
}

/// Sensor driver or detector failure
///
/// Recovered locally by the source: the tick gets an empty observation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorFault {
    /// Driver returned no frame this cycle
    #[error("{source_id} sensor returned no data")]
    NoData { source_id: SourceId },

    /// Driver lost its device; the source cannot continue
    #[error("{source_id} sensor disconnected: {message}")]
    Disconnected { source_id: SourceId, message: String },

    /// Detector failed on a frame
    #[error("{source_id} detector failed: {message}")]
    Detector { source_id: SourceId, message: String },
}

impl SensorFault {
    pub fn detector(source_id: SourceId, message: impl Into<String>) -> Self {
        Self::Detector {
            source_id,
            message: message.into(),
        }
    }

    pub fn disconnected(source_id: SourceId, message: impl Into<String>) -> Self {
        Self::Disconnected {
            source_id,
            message: message.into(),
        }
    }

    /// Whether the source has to retire its slot
    pub fn is_fatal(&self) -> bool {
        matches!(self, SensorFault::Disconnected { .. })
    }
}

/// Wireless transport failure
///
/// Never fatal: handled by the session reconnection loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Operation exceeded its deadline
    #[error("transport timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Link is not (or no longer) connected
    #[error("transport disconnected")]
    Disconnected,

    /// Session open rejected
    #[error("connect to '{address}' failed: {message}")]
    ConnectFailed { address: String, message: String },

    /// Frame write rejected
    #[error("write failed: {message}")]
    WriteFailed { message: String },

    /// Discovery scan could not run
    #[error("discovery scan failed: {message}")]
    Scan { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn connect_failed(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}
