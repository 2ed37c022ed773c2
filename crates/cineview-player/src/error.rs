//! Error types for the playback controller

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Fetch errors
    #[error("Origin returned HTTP {status}: {body}")]
    FetchStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    // Manifest errors
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("No usable variant in master playlist")]
    NoUsableVariant,

    // Decoder errors
    #[error("Decode fault (fatal={fatal}): {detail}")]
    DecodeFault { fatal: bool, detail: String },

    // Selection errors
    #[error("Tier index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    // State machine errors
    #[error("Operation not valid in state {state}")]
    InvalidState { state: String },

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Retry budget
    #[error("Retry budget exhausted after {attempts} attempts: {detail}")]
    RetriesExhausted { attempts: u32, detail: String },
}

impl Error {
    /// Returns true if this error is recoverable by a bounded retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::FetchStatus { .. } | Error::Network(_) => true,
            Error::DecodeFault { fatal, .. } => !fatal,
            _ => false,
        }
    }

    /// Returns the error code surfaced to telemetry and UI bindings
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FetchStatus { .. } => "FETCH_STATUS",
            Error::Network(_) => "NETWORK",
            Error::MalformedManifest(_) => "MALFORMED_MANIFEST",
            Error::NoUsableVariant => "NO_USABLE_VARIANT",
            Error::DecodeFault { .. } => "DECODE_FAULT",
            Error::OutOfRange { .. } => "OUT_OF_RANGE",
            Error::InvalidState { .. } => "INVALID_STATE",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
        }
    }
}
