// ABOUTME: File Publisher error taxonomy, folded into BrokerError at the Coordinator boundary

use broker_core::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("published file not found: {0}")]
    NotFound(String),
    #[error("bad path: {0}")]
    BadPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FilesError> for BrokerError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound(what) => BrokerError::not_found(what),
            FilesError::BadPath(msg) => BrokerError::invalid_argument(msg),
            FilesError::Io(e) => BrokerError::io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilesError>;
