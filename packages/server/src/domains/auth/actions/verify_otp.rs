//! Verify OTP action

use tracing::info;

use crate::domains::auth::{AuthError, TokenError, TokenKind, TokenPayload};
use crate::kernel::ServerDeps;

/// A verified OTP exchanged for a session token.
#[derive(Debug, Clone)]
pub struct VerifiedOtp {
    /// Claims of the OTP token that was presented
    pub payload: TokenPayload,
    /// Signed AUTH token for subsequent requests
    pub token: String,
    pub auth_payload: TokenPayload,
}

/// Check an OTP code from an email link and issue an AUTH token for its owner.
///
/// Only OTP-kind tokens are accepted; presenting an AUTH token here is treated
/// as an invalid code.
pub async fn verify_otp(code: &str, deps: &ServerDeps) -> Result<VerifiedOtp, AuthError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::InvalidOtp);
    }

    let payload = deps.tokens.verify(code).map_err(|e| match e {
        TokenError::ExpiredToken => AuthError::OtpExpired,
        _ => AuthError::InvalidOtp,
    })?;
    if payload.kind != TokenKind::Otp {
        return Err(AuthError::InvalidOtp);
    }

    let (token, auth_payload) = deps
        .tokens
        .issue(&payload.email, TokenKind::Auth, deps.auth_ttl)
        .map_err(AuthError::IssueToken)?;

    info!(email = %payload.email, otp_id = %payload.id, "otp verified");

    Ok(VerifiedOtp {
        payload,
        token,
        auth_payload,
    })
}
