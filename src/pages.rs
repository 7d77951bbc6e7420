//! Static pages and the catch-all error responses.

use std::any::Any;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, ErrorResponse},
    models::StaticPage,
};

/// about
///
/// [Public Route] Project description page.
#[utoipa::path(
    get,
    path = "/pages/about/",
    responses((status = 200, description = "About page", body = StaticPage))
)]
pub async fn about() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "about".to_string(),
        title: "About the project".to_string(),
        body: "Blogicum is a place to publish posts, file them under categories \
               and discuss them with other readers."
            .to_string(),
    })
}

/// rules
///
/// [Public Route] Community rules page.
#[utoipa::path(
    get,
    path = "/pages/rules/",
    responses((status = 200, description = "Rules page", body = StaticPage))
)]
pub async fn rules() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "rules".to_string(),
        title: "Rules".to_string(),
        body: "Be polite. Only edit and delete what you wrote yourself. \
               Posts appear on the feed once published and their date has come."
            .to_string(),
    })
}

/// Fallback for every unmatched route.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Rendered by `CatchPanicLayer` when a handler panics.
pub fn server_error(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("INTERNAL_ERROR", "Internal server error")),
    )
        .into_response()
}
