// ABOUTME: Container Driver error taxonomy, folded into BrokerError at the Coordinator boundary

use broker_core::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("base image missing: {0}")]
    ImageMissing(String),
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    #[error("no such container: {0}")]
    NoSuchContainer(String),
    #[error("execution timed out after {0}s")]
    ExecTimeout(u64),
    #[error("io error: {0}")]
    Io(String),
}

impl From<DriverError> for BrokerError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ImageMissing(msg) => BrokerError::internal(anyhow::anyhow!(msg)),
            DriverError::RuntimeUnavailable(_) => BrokerError::RuntimeUnavailable,
            DriverError::NoSuchContainer(what) => BrokerError::not_found(what),
            DriverError::ExecTimeout(secs) => BrokerError::ExecTimeout(secs),
            DriverError::Io(msg) => BrokerError::io(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
