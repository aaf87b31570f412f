use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Comments Router Module
///
/// Same access shape as posts: public reads (with the optional `post_id`
/// filter), active-user creation, owner-or-superuser mutation enforced in the
/// handlers.
pub fn comment_routes() -> Router<AppState> {
    Router::new()
        // GET /comments?skip=&limit=&post_id= — listing, optionally per post.
        // POST /comments — comment on a post (the post must exist).
        .route(
            "/",
            get(handlers::read_comments).post(handlers::create_comment),
        )
        // GET/PUT/DELETE /comments/{id}
        .route(
            "/{id}",
            get(handlers::read_comment)
                .put(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
}
