//! Author-only mutation policy.
//!
//! Handlers compose an `AuthorOnly` policy with the denial behaviour their route
//! needs and run it against anything that knows its author.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Comment, Post},
    visibility::Viewer,
};

/// Anything owned by a single user.
pub trait Authored {
    fn author_id(&self) -> Uuid;
}

impl Authored for Post {
    fn author_id(&self) -> Uuid {
        self.author.id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> Uuid {
        self.author.id
    }
}

pub fn can_mutate<R: Authored + ?Sized>(resource: &R, viewer: &Viewer) -> bool {
    viewer.is(resource.author_id())
}

/// What a failed check turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnDenied {
    Forbid,
    RedirectTo(String),
}

/// AuthorOnly
///
/// Admits the resource's author and nobody else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorOnly {
    on_denied: OnDenied,
}

impl AuthorOnly {
    pub const fn forbidding() -> Self {
        Self {
            on_denied: OnDenied::Forbid,
        }
    }

    pub fn redirecting(location: impl Into<String>) -> Self {
        Self {
            on_denied: OnDenied::RedirectTo(location.into()),
        }
    }

    pub fn check<R: Authored + ?Sized>(&self, resource: &R, viewer: &Viewer) -> AppResult<()> {
        if can_mutate(resource, viewer) {
            return Ok(());
        }
        Err(match &self.on_denied {
            OnDenied::Forbid => AppError::Forbidden,
            OnDenied::RedirectTo(location) => AppError::Redirect(location.clone()),
        })
    }

    /// Runs the check and hands the resource back on success.
    pub fn admit<R: Authored>(&self, resource: R, viewer: &Viewer) -> AppResult<R> {
        self.check(&resource, viewer).map(|_| resource)
    }
}

/// Detail page of a post; where denied editors and new comments land.
pub fn post_detail_path(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}
