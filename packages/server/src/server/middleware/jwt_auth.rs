use crate::domains::auth::{TokenKind, TokenMaker};
use axum::{middleware::Next, response::Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Authenticated user information from an AUTH token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub email: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// JWT authentication middleware
///
/// Extracts the token from the Authorization header, verifies it, and adds AuthUser to request extensions.
/// If no token or invalid token, request continues without AuthUser (public access).
pub async fn jwt_auth_middleware(
    tokens: Arc<dyn TokenMaker>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, tokens.as_ref());

    if let Some(user) = auth_user {
        debug!("Authenticated user: {}", user.email);
        request.extensions_mut().insert(user);
    } else {
        debug!("No valid authentication token");
    }

    next.run(request).await
}

/// Extract and verify the session token from request
fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    tokens: &dyn TokenMaker,
) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Handle both "Bearer <token>" and raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let payload = tokens.verify(token).ok()?;

    // OTP links are not session credentials
    if payload.kind != TokenKind::Auth {
        return None;
    }

    Some(AuthUser {
        email: payload.email,
        token_id: payload.id,
        expires_at: payload.expired_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::JwtTokenMaker;
    use std::time::Duration;

    fn maker() -> JwtTokenMaker {
        JwtTokenMaker::new("test_secret_key_that_is_32_bytes!").unwrap()
    }

    fn request(authorization: Option<String>) -> axum::http::Request<axum::body::Body> {
        let mut builder = axum::http::Request::builder();
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_token_with_bearer() {
        let tokens = maker();
        let (token, payload) = tokens
            .issue("alice@example.com", TokenKind::Auth, Duration::from_secs(60))
            .unwrap();

        let auth_user = extract_auth_user(&request(Some(format!("Bearer {}", token))), &tokens);
        let auth_user = auth_user.unwrap();
        assert_eq!(auth_user.email, "alice@example.com");
        assert_eq!(auth_user.token_id, payload.id);
    }

    #[test]
    fn test_extract_token_without_bearer() {
        let tokens = maker();
        let (token, _) = tokens
            .issue("alice@example.com", TokenKind::Auth, Duration::from_secs(60))
            .unwrap();

        assert!(extract_auth_user(&request(Some(token)), &tokens).is_some());
    }

    #[test]
    fn test_otp_token_is_not_a_session() {
        let tokens = maker();
        let (token, _) = tokens
            .issue("alice@example.com", TokenKind::Otp, Duration::from_secs(60))
            .unwrap();

        assert!(extract_auth_user(&request(Some(format!("Bearer {}", token))), &tokens).is_none());
    }

    #[test]
    fn test_no_auth_header() {
        assert!(extract_auth_user(&request(None), &maker()).is_none());
    }

    #[test]
    fn test_invalid_token() {
        let auth_user = extract_auth_user(
            &request(Some("Bearer invalid_token".to_string())),
            &maker(),
        );
        assert!(auth_user.is_none());
    }
}
