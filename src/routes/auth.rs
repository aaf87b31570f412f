use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Auth Router Module
///
/// The credential boundary of the API. Login exchanges a password for a
/// bearer token; test-token lets a client confirm a stored token still
/// resolves to a live, active user.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/login
        // Form-encoded username (email) + password. Returns the bearer token.
        .route("/login", post(handlers::login))
        // POST /auth/login/test-token
        // Requires a valid token; echoes the resolved user.
        .route("/login/test-token", post(handlers::test_token))
}
