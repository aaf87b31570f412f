use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Users Router Module
///
/// User administration is superuser-only; the single exception is `/me`,
/// which any active user can read about themselves. There is deliberately no
/// DELETE here — accounts are deactivated via `is_active`, not removed.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET /users — list all users.
        // POST /users — create a user (password is hashed server-side).
        .route("/", get(handlers::list_users).post(handlers::create_user))
        // GET /users/me — the requesting user's own profile.
        // Registered before the {id} matcher so "me" is not parsed as an id.
        .route("/me", get(handlers::read_user_me))
        // GET/PUT /users/{id} — read or partially update any user.
        .route("/{id}", get(handlers::read_user).put(handlers::update_user))
}
