//! Post visibility rules.
//!
//! A post is publicly visible when it is published, its category is published and
//! its publication date has passed. Authors additionally see their own posts on
//! their profile and detail pages. Comments carry no rule of their own: they are
//! shown exactly when their post is.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Category, CommentForm, Post, PostDetail},
    pagination::{PageInfo, Paginator},
    repository::Repository,
};

/// Viewer
///
/// The identity behind a request. Resolved by the `Viewer` extractor in `auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Authenticated(Uuid),
}

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(id) => Some(*id),
        }
    }

    /// True when this viewer is the given user.
    pub fn is(&self, user_id: Uuid) -> bool {
        self.id() == Some(user_id)
    }
}

/// Which slice of the post table a feed draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Category(i64),
    Author(Uuid),
}

/// FeedQuery
///
/// A fully-resolved feed request handed to the repository. Whether the public
/// filter applies has already been decided by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FeedQuery {
    pub scope: FeedScope,
    pub public_only: bool,
    pub now: DateTime<Utc>,
    pub limit: i64,
    pub offset: i64,
}

/// One page of a feed together with the size of the whole feed.
#[derive(Debug, Clone, Default)]
pub struct PostSlice {
    pub posts: Vec<Post>,
    pub total: i64,
}

pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.category.is_published && post.pub_date <= now
}

pub fn is_visible_to(post: &Post, viewer: &Viewer, now: DateTime<Utc>) -> bool {
    viewer.is(post.author.id) || is_publicly_visible(post, now)
}

/// Profile owners see all of their own posts; everyone else gets the public view.
pub fn profile_needs_public_filter(viewer: &Viewer, profile_owner: Uuid) -> bool {
    !viewer.is(profile_owner)
}

/// filter_posts
///
/// Keeps the publicly visible posts when `apply_public_filter` is set, then orders
/// the result newest first (`pub_date` descending, ties by id descending). The
/// `comment_count` annotation is carried through untouched.
pub fn filter_posts<I>(posts: I, apply_public_filter: bool, now: DateTime<Utc>) -> Vec<Post>
where
    I: IntoIterator<Item = Post>,
{
    let mut visible: Vec<Post> = posts
        .into_iter()
        .filter(|post| !apply_public_filter || is_publicly_visible(post, now))
        .collect();
    visible.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
    visible
}

/// load_feed
///
/// Fetches one page of a feed and validates the page number against its total.
pub async fn load_feed(
    repo: &dyn Repository,
    scope: FeedScope,
    apply_public_filter: bool,
    paginator: Paginator,
    page: u32,
    now: DateTime<Utc>,
) -> AppResult<(Vec<Post>, PageInfo)> {
    let (limit, offset) = paginator.window(page)?;
    let slice = repo
        .list_posts(FeedQuery {
            scope,
            public_only: apply_public_filter,
            now,
            limit,
            offset,
        })
        .await?;
    let info = paginator.page_info(page, slice.total)?;
    Ok((slice.posts, info))
}

/// resolve_post_detail
///
/// Hidden posts are reported as missing rather than forbidden, so non-authors
/// cannot discover unpublished content.
pub async fn resolve_post_detail(
    repo: &dyn Repository,
    post_id: i64,
    viewer: &Viewer,
    now: DateTime<Utc>,
) -> AppResult<PostDetail> {
    let post = resolve_visible_post(repo, post_id, viewer, now).await?;
    let comments = repo.get_comments(post.id).await?;
    Ok(PostDetail {
        post,
        comments,
        form: CommentForm::default(),
    })
}

pub async fn resolve_visible_post(
    repo: &dyn Repository,
    post_id: i64,
    viewer: &Viewer,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    repo.get_post(post_id)
        .await?
        .filter(|post| is_visible_to(post, viewer, now))
        .ok_or(AppError::NotFound)
}

/// Only published categories resolve by slug.
pub async fn resolve_category(repo: &dyn Repository, slug: &str) -> AppResult<Category> {
    repo.get_category_by_slug(slug)
        .await?
        .filter(|category| category.is_published)
        .ok_or(AppError::NotFound)
}
