use axum::{
    extract::{rejection::JsonRejection, Extension, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::users::{email_from_body, EmailRequest, CHECK_EMAIL_MESSAGE};
use crate::domains::auth::actions::{resend_otp, verify_otp};
use crate::domains::auth::TokenPayload;
use crate::server::app::AppState;
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct OtpQuery {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub data: TokenPayload,
    pub token: String,
}

/// `GET /api/v1/otp?code=` - exchange an emailed OTP code for a session token
pub async fn verify_otp_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<OtpQuery>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let verified = verify_otp(&query.code, &state.deps).await?;

    Ok(Json(VerifyOtpResponse {
        data: verified.payload,
        token: verified.token,
    }))
}

/// `POST /api/v1/otp/resend` - send a fresh OTP link to a registered email
pub async fn resend_otp_handler(
    Extension(state): Extension<AppState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let email = email_from_body(body)?;
    resend_otp(&email, &state.deps).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": CHECK_EMAIL_MESSAGE })),
    ))
}
