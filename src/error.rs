//! Error types for the bridge orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transfer type {0} is not registered")]
    UnknownTransferType(String),

    #[error("No transaction hash supplied for the {action} step")]
    MissingTransaction { action: &'static str },

    #[error("Invalid amount {0:?}: expected a decimal integer string")]
    InvalidAmount(String),

    #[error("Chain error on {chain}: {message}")]
    Chain { chain: String, message: String },

    #[error("Log decoding error: {0}")]
    LogDecoding(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Operation {0} not found")]
    OperationNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Check if the error was caused by a malformed request, as opposed to a
    /// chain or orchestrator fault. Drives 4xx vs 5xx at the API boundary.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            BridgeError::UnknownTransferType(_)
                | BridgeError::MissingTransaction { .. }
                | BridgeError::InvalidAmount(_)
        )
    }
}

/// Result type for orchestrator operations
pub type BridgeResult<T> = Result<T, BridgeError>;
