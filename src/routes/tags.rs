use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Tags Router Module
///
/// Tags are readable by anyone and writable only by superusers — they are
/// shared vocabulary, not per-user data.
pub fn tag_routes() -> Router<AppState> {
    Router::new()
        // GET /tags — listing.
        // POST /tags — create; duplicate names are rejected with 409.
        .route("/", get(handlers::read_tags).post(handlers::create_tag))
        // GET/PUT/DELETE /tags/{id}
        .route(
            "/{id}",
            get(handlers::read_tag)
                .put(handlers::update_tag)
                .delete(handlers::delete_tag),
        )
}
