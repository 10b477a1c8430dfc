use std::time::Duration;
use thiserror::Error;

/// All possible errors in the txguard service
#[derive(Debug, Error)]
pub enum TxGuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Receipt oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TxGuardError>;

impl TxGuardError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<config::ConfigError> for TxGuardError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failure of a single receipt lookup.
///
/// Cloneable so that every caller waiting on the same in-flight lookup can
/// receive the owner's failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("timed out after {0:?} waiting for receipt")]
    Timeout(Duration),
}

impl OracleError {
    pub fn invalid_hash(hash: impl Into<String>) -> Self {
        Self::InvalidHash(hash.into())
    }

    pub fn rpc(msg: impl std::fmt::Display) -> Self {
        Self::Rpc(msg.to_string())
    }

    /// True when the caller supplied a hash the chain can never accept.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidHash(_))
    }
}
