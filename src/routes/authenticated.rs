use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes that need a session. The router is wrapped in `auth_middleware`, so an
/// anonymous request is sent to the login page before any handler runs. Author-only
/// checks happen inside the handlers through `policy::AuthorOnly`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts/create/
        // Publishes a post as the requesting user.
        .route("/posts/create/", post(handlers::create_post))
        // POST /posts/{id}/delete/
        // Author-only; anyone else gets 403.
        .route("/posts/{id}/delete/", post(handlers::delete_post))
        // --- Comments ---
        .route("/posts/{id}/comment/", post(handlers::add_comment))
        .route(
            "/posts/{id}/edit_comment/{comment_id}",
            get(handlers::edit_comment_form).post(handlers::edit_comment),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}",
            post(handlers::delete_comment),
        )
        // GET/POST /profile_edit/
        // The requesting user's own account fields.
        .route(
            "/profile_edit/",
            get(handlers::edit_profile_form).post(handlers::edit_profile),
        )
}
