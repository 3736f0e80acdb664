use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::token::{TokenError, TokenKind, TokenMaker, TokenPayload};

/// Minimum HMAC secret length accepted by [`JwtTokenMaker::new`].
pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// JWT token maker - HS256-signed tokens whose claims are the [`TokenPayload`]
#[derive(Clone)]
pub struct JwtTokenMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenMaker {
    /// Create a token maker from a shared secret
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::SecretTooShort {
                min: MIN_SECRET_KEY_SIZE,
            });
        }

        // Expiry lives in `expired_at` and is checked by us against an explicit clock,
        // so the library only validates signature and structure.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }
}

impl TokenMaker for JwtTokenMaker {
    fn issue(
        &self,
        email: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<(String, TokenPayload), TokenError> {
        let payload = TokenPayload::new(email, kind, ttl)?;
        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok((token, payload))
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let payload = decode::<TokenPayload>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidToken)?;

        payload.valid_at(now)?;
        Ok(payload)
    }
}
