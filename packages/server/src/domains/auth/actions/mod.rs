//! Auth domain actions - business logic functions
//!
//! Actions are async functions called directly from HTTP route handlers.

mod resend_otp;
mod sign_up;
mod verify_otp;

pub use resend_otp::resend_otp;
pub use sign_up::sign_up;
pub use verify_otp::{verify_otp, VerifiedOtp};
