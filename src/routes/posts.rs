use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Posts Router Module
///
/// Reads are public; creation requires an active user, and mutation of an
/// existing post additionally requires ownership (or superuser), enforced
/// inside the handlers.
pub fn post_routes() -> Router<AppState> {
    Router::new()
        // GET /posts?skip=&limit=&tag_id=&author_id= — filtered listing.
        // POST /posts — submit a new post, optionally with tag ids.
        .route("/", get(handlers::read_posts).post(handlers::create_post))
        // GET/PUT/DELETE /posts/{id}
        .route(
            "/{id}",
            get(handlers::read_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
}
