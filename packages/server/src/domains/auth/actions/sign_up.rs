//! Sign up action

use tracing::{error, info};

use crate::domains::auth::AuthError;
use crate::domains::users::User;
use crate::kernel::ServerDeps;

/// Register `email` and queue its OTP email.
///
/// Returns as soon as the job is enqueued; delivery happens in the background.
/// If enqueueing fails the user stays registered and can ask for a new link
/// with [`resend_otp`](super::resend_otp).
pub async fn sign_up(email: &str, deps: &ServerDeps) -> Result<User, AuthError> {
    let user = User::new(email)?;
    deps.users.create(&user).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    deps.distributor
        .distribute_send_otp_email(&user.email)
        .await
        .map_err(|e| {
            error!(email = %user.email, error = ?e, "failed to distribute task send otp email");
            AuthError::Distribute(e)
        })?;

    Ok(user)
}
