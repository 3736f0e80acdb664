//! Background jobs owned by the auth domain.

mod send_otp_email;

use std::sync::Arc;

pub use send_otp_email::{otp_link, PayloadSendOtpEmail, SendOtpEmailHandler, TASK_SEND_OTP_EMAIL};

use crate::kernel::jobs::HandlerRegistry;
use crate::kernel::ServerDeps;

pub fn register_auth_jobs(registry: &mut HandlerRegistry, deps: &ServerDeps) {
    registry.register(
        TASK_SEND_OTP_EMAIL,
        Arc::new(SendOtpEmailHandler::new(
            deps.users.clone(),
            deps.mailer.clone(),
            deps.public_base_url.clone(),
        )),
    );
}
