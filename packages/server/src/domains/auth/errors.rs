use super::distributor::DistributeError;
use super::token::TokenError;
use crate::domains::users::{RegistryError, UserError};

/// Failures of the sign-up and OTP actions.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid otp code")]
    InvalidOtp,
    #[error("otp code expired")]
    OtpExpired,
    #[error("failed to distribute task send otp email")]
    Distribute(#[from] DistributeError),
    #[error("failed to issue auth token")]
    IssueToken(#[source] TokenError),
    #[error(transparent)]
    Storage(anyhow::Error),
}

impl From<UserError> for AuthError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidEmail => AuthError::InvalidEmail,
        }
    }
}

impl From<RegistryError> for AuthError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists => AuthError::UserExists,
            RegistryError::NotFound => AuthError::UserNotFound,
            RegistryError::Storage(e) => AuthError::Storage(e),
        }
    }
}
