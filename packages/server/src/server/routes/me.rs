use axum::{extract::Extension, Json};

use crate::domains::auth::AuthError;
use crate::domains::users::User;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::ApiError;

/// `GET /api/v1/me` - the user behind the session token
pub async fn me_handler(
    Extension(state): Extension<AppState>,
    auth_user: Option<Extension<AuthUser>>,
) -> Result<Json<User>, ApiError> {
    let Some(Extension(auth_user)) = auth_user else {
        return Err(ApiError::unauthorized());
    };

    let user = state
        .deps
        .users
        .get(&auth_user.email)
        .await
        .map_err(AuthError::from)?;

    Ok(Json(user))
}
