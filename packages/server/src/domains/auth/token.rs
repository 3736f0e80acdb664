//! Signed, expiring tokens.
//!
//! A token is self-contained: its signature proves it was minted by us and its
//! payload carries the expiry, so verification needs no storage lookup.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived login link sent by email
    Otp,
    /// Session credential handed out after a successful OTP check
    Auth,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Otp => "otp",
            TokenKind::Auth => "auth",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("token ttl must be positive and representable")]
    InvalidTtl,
    #[error("secret key must be at least {min} bytes")]
    SecretTooShort { min: usize },
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Data carried inside a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: Uuid,
    pub email: String,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    /// Build a payload with a fresh token id, issued now.
    pub fn new(email: &str, kind: TokenKind, ttl: Duration) -> Result<Self, TokenError> {
        Self::issued_at(email, kind, ttl, Utc::now())
    }

    pub fn issued_at(
        email: &str,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        if ttl.is_zero() {
            return Err(TokenError::InvalidTtl);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        let expired_at = now.checked_add_signed(ttl).ok_or(TokenError::InvalidTtl)?;

        Ok(Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            kind,
            issued_at: now,
            expired_at,
        })
    }

    /// Fails with `ExpiredToken` once `now` is past the expiry instant.
    pub fn valid_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now > self.expired_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}

/// Issues and verifies signed tokens.
pub trait TokenMaker: Send + Sync {
    /// Mint a new token for `email`. Returns the signed string and its payload.
    fn issue(
        &self,
        email: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<(String, TokenPayload), TokenError>;

    /// Check signature and expiry as of `now`.
    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError>;

    fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_expiry_window() {
        let now = Utc::now();
        let payload =
            TokenPayload::issued_at("alice@example.com", TokenKind::Otp, Duration::from_secs(300), now)
                .unwrap();

        assert!(payload.expired_at > payload.issued_at);
        assert_eq!(payload.expired_at - payload.issued_at, chrono::Duration::minutes(5));
        assert!(payload.valid_at(payload.expired_at).is_ok());
        assert!(matches!(
            payload.valid_at(payload.expired_at + chrono::Duration::milliseconds(1)),
            Err(TokenError::ExpiredToken)
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = TokenPayload::new("alice@example.com", TokenKind::Auth, Duration::ZERO);
        assert!(matches!(result, Err(TokenError::InvalidTtl)));
    }

    #[test]
    fn test_fresh_ids() {
        let a = TokenPayload::new("alice@example.com", TokenKind::Otp, Duration::from_secs(1)).unwrap();
        let b = TokenPayload::new("alice@example.com", TokenKind::Otp, Duration::from_secs(1)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&TokenKind::Otp).unwrap(), "\"otp\"");
        assert_eq!(serde_json::to_string(&TokenKind::Auth).unwrap(), "\"auth\"");
        assert_eq!(TokenKind::Otp.to_string(), "otp");
    }
}
