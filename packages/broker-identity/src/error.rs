// ABOUTME: Identity Store error taxonomy, folded into BrokerError at the API boundary

use broker_core::BrokerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("password does not meet strength requirements")]
    WeakPassword,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid or expired session token")]
    InvalidToken,
    #[error("invalid api key")]
    InvalidKey,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<IdentityError> for BrokerError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::DuplicateUsername => BrokerError::conflict("username already taken"),
            IdentityError::DuplicateEmail => BrokerError::conflict("email already registered"),
            IdentityError::WeakPassword => {
                BrokerError::invalid_argument("password does not meet strength requirements")
            }
            IdentityError::InvalidCredentials => BrokerError::NotAuthorized,
            IdentityError::InvalidToken => BrokerError::NotAuthorized,
            IdentityError::InvalidKey => BrokerError::NotAuthorized,
            IdentityError::NotFound => BrokerError::not_found("user"),
            IdentityError::Database(e) => BrokerError::internal(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
