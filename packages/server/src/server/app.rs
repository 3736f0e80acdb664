//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    health_handler, me_handler, ping_handler, resend_otp_handler, sign_up_handler,
    verify_otp_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router
///
/// Background job processing is started separately (see `TaskProcessor`); the
/// router only produces jobs through `ServerDeps::distributor`.
pub fn build_app(deps: ServerDeps) -> Router {
    let tokens = deps.tokens.clone();
    let app_state = AppState {
        deps: Arc::new(deps),
    };

    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/api/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/users", post(sign_up_handler))
        .route("/api/v1/otp", get(verify_otp_handler))
        .route("/api/v1/otp/resend", post(resend_otp_handler))
        .route("/api/v1/me", get(me_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(tokens.clone(), req, next)
        })) // JWT authentication
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
