//! Resend OTP action

use tracing::{error, info};

use crate::domains::auth::AuthError;
use crate::domains::users::normalize_email;
use crate::kernel::jobs::EnqueueInfo;
use crate::kernel::ServerDeps;

/// Queue a fresh OTP email for an already registered user.
///
/// Links sent earlier stay valid until their own expiry.
pub async fn resend_otp(email: &str, deps: &ServerDeps) -> Result<EnqueueInfo, AuthError> {
    let user = deps.users.get(&normalize_email(email)).await?;

    let info = deps
        .distributor
        .distribute_send_otp_email(&user.email)
        .await
        .map_err(|e| {
            error!(email = %user.email, error = ?e, "failed to distribute task send otp email");
            AuthError::Distribute(e)
        })?;

    info!(user_id = %user.id, job_id = %info.job_id, "otp email re-requested");
    Ok(info)
}
