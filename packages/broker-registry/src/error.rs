// ABOUTME: Sandbox Registry error taxonomy, folded into BrokerError at the Coordinator boundary

use broker_core::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("sandbox not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Driver(#[from] broker_driver::DriverError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RegistryError> for BrokerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => BrokerError::not_found(format!("sandbox {id}")),
            RegistryError::Driver(e) => e.into(),
            RegistryError::Database(e) => BrokerError::internal(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
