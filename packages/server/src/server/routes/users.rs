use axum::{extract::rejection::JsonRejection, extract::Extension, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domains::auth::actions::sign_up;
use crate::server::app::AppState;
use crate::server::ApiError;

pub const CHECK_EMAIL_MESSAGE: &str = "please check your email for otp link";

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Parse a `{"email": ...}` body, rejecting malformed JSON with 400
pub(crate) fn email_from_body(
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    body.map(|Json(input)| input.email)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// `POST /api/v1/users` - register an email and send its OTP link
pub async fn sign_up_handler(
    Extension(state): Extension<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let email = email_from_body(body)?;
    sign_up(&email, &state.deps).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": CHECK_EMAIL_MESSAGE })),
    ))
}
