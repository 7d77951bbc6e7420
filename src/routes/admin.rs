use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Staff-only management of categories, locations, comments and post moderation. Every
/// handler resolves `AuthUser` and checks `is_staff` itself, answering 403 otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::get_admin_categories).post(handlers::create_category),
        )
        // PUT /admin/categories/{id}
        // Unpublishing a category hides all of its posts from public feeds.
        // DELETE is refused with 409 while posts are still filed under the category.
        .route(
            "/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        .route(
            "/locations",
            get(handlers::get_admin_locations).post(handlers::create_location),
        )
        .route(
            "/locations/{id}",
            put(handlers::update_location).delete(handlers::delete_location),
        )
        .route("/comments", get(handlers::get_admin_comments))
        .route("/comments/{id}", delete(handlers::delete_admin_comment))
        // GET /admin/posts?search=...&category=...
        // Every post, visible or not.
        .route("/posts", get(handlers::get_admin_posts))
        // PUT /admin/posts/{id}
        // Toggle publication, refile category or location.
        .route("/posts/{id}", put(handlers::moderate_post))
}
