use std::result::Result as StdResult;

use thiserror::Error;

use crate::domain::{ConnectError, ScheduleError};

/// Unified error type for the domain, storage and configuration layers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    #[error("Persistence error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Project misconfigured: {0}")]
    Misconfigured(#[from] ScheduleError),
}

pub type Result<T> = StdResult<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::StorageError(err.to_string())
    }
}

impl From<ConnectError> for CoreError {
    fn from(err: ConnectError) -> Self {
        CoreError::InvalidReference(err.to_string())
    }
}
