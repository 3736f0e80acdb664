//! Auth domain - passwordless sign-up via emailed OTP links
//!
//! Flow:
//!   POST /users → sign_up → TaskDistributor enqueues "send-otp-email"
//!   TaskProcessor → SendOtpEmailHandler → mailer
//!   GET /otp?code= → verify_otp → AUTH token
//!
//! Responsibilities:
//! - Signed, expiring OTP and session tokens
//! - Producing and consuming the OTP email job

pub mod actions;
pub mod distributor;
mod errors;
pub mod jobs;
pub mod jwt;
pub mod token;

pub use distributor::{DistributeError, JobTaskDistributor, TaskDistributor};
pub use errors::AuthError;
pub use jwt::{JwtTokenMaker, MIN_SECRET_KEY_SIZE};
pub use token::{TokenError, TokenKind, TokenMaker, TokenPayload};
