use crate::{AppState, handlers, pages};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. Handlers resolve the optional `Viewer`
/// themselves and apply the visibility rules, so an author browsing their own
/// hidden posts goes through the same routes as everyone else.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /?page=N
        // The main feed: published posts in published categories whose date has come.
        .route("/", get(handlers::index))
        // GET /posts/{id}/
        // Post detail with comments. Hidden posts are a 404 for everyone but the author.
        .route("/posts/{id}/", get(handlers::post_detail))
        // GET/POST /posts/{id}/edit/
        // Author-only, but a denied visitor (anonymous included) is redirected to the
        // post instead of the login page, so the route lives here.
        .route(
            "/posts/{id}/edit/",
            get(handlers::edit_post_form).post(handlers::edit_post),
        )
        // GET /category/{slug}/
        // Feed of one published category.
        .route("/category/{slug}/", get(handlers::category_posts))
        // GET /profile/{username}/
        // A user's posts; the owner also sees unpublished and scheduled ones.
        .route("/profile/{username}/", get(handlers::profile))
        // Static pages.
        .route("/pages/about/", get(pages::about))
        .route("/pages/rules/", get(pages::rules))
}
