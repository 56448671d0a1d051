//! # Error Types
//!
//! Custom error types for Range Fusion using `thiserror`.

use thiserror::Error;

/// Main error type for Range Fusion
#[derive(Debug, Error)]
pub enum FusionError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Reading a line from the serial device failed
    #[error("Serial read error: {0}")]
    SerialRead(#[source] std::io::Error),

    /// Pointer device file could not be opened
    #[error("Failed to open pointer device {path}: {source}")]
    PointerDevice {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a record from the pointer device failed (including short reads)
    #[error("Pointer read error: {0}")]
    PointerRead(#[source] std::io::Error),

    /// Local address detection failed
    #[error("Local address error: {0}")]
    LocalAddress(String),

    /// Network probe could not be run or returned an error
    #[error("Network probe error: {0}")]
    Probe(String),

    /// Probe output was not well-formed XML
    #[error("Probe output parse error: {0}")]
    ProbeOutput(#[from] quick_xml::Error),

    /// Requested pointer calibration profile is not registered
    #[error("Unknown calibration profile: {0}")]
    UnknownProfile(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Range Fusion
pub type Result<T> = std::result::Result<T, FusionError>;
