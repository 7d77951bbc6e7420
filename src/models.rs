use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::sync::LazyLock;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::pagination::PageInfo;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Mirror of an identity-provider account in the `users` table. The `id` is the
/// `sub` claim of the bearer tokens issued for that account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    // Grants access to the `/admin` management routes.
    pub is_staff: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Category
///
/// A post category from the `categories` table. Unpublished categories hide every
/// post filed under them and cannot be resolved by slug.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
///
/// Optional geographic tag attached to posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategorySummary {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LocationSummary {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
}

/// Post
///
/// A blog post joined with its author, category and location, annotated with the
/// number of comments attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Post {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub text: String,
    // Posts dated in the future stay hidden from everyone but their author.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub is_published: bool,
    pub author: AuthorSummary,
    pub category: CategorySummary,
    pub location: Option<LocationSummary>,
    #[ts(type = "number")]
    pub comment_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A reader comment on a post, joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Comment {
    #[ts(type = "number")]
    pub id: i64,
    pub text: String,
    #[ts(type = "number")]
    pub post_id: i64,
    pub author: AuthorSummary,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public part of a user record, shown on profile pages. Email stays private.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined: user.created_at,
        }
    }
}

// --- Response Envelopes ---

/// Empty comment submission form returned alongside a post detail.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    // Oldest first.
    pub comments: Vec<Comment>,
    pub form: CommentForm,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
    pub page: PageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryFeedResponse {
    pub category: Category,
    pub posts: Vec<Post>,
    pub page: PageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileFeedResponse {
    pub profile: UserProfile,
    pub posts: Vec<Post>,
    pub page: PageInfo,
}

/// A static informational page (about, rules).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct StaticPage {
    pub slug: String,
    pub title: String,
    pub body: String,
}

// --- Validation Patterns ---

// Length limits below mirror the column sizes in `migrations/0001_blog.sql`.

/// At least one non-whitespace character.
static NON_BLANK_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\S").unwrap());

/// Letters, digits and `@.+-_`, the usual account-name alphabet.
static USERNAME_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[\w.@+-]+$").unwrap());

/// Latin letters, digits, hyphens and underscores.
static SLUG_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for `POST /posts/create/`. The author is always the authenticated
/// user. `pub_date` defaults to the moment of creation and `is_published` to `true`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    #[validate(
        length(min = 1, max = 256, message = "Title must be 1-256 characters"),
        regex(path = "NON_BLANK_REGEX", message = "This field is required")
    )]
    pub title: String,
    #[validate(regex(path = "NON_BLANK_REGEX", message = "This field is required"))]
    pub text: String,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[ts(type = "number")]
    pub category_id: i64,
    #[serde(default)]
    #[ts(type = "number | null")]
    pub location_id: Option<i64>,
}

/// UpdatePostRequest
///
/// Partial update payload for `POST /posts/{id}/edit/`. Absent fields are left as
/// they are. `location_id: null` detaches the location.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 256, message = "Title must be 1-256 characters"),
        regex(path = "NON_BLANK_REGEX", message = "This field is required")
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = "NON_BLANK_REGEX", message = "This field is required"))]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub category_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    #[ts(type = "number | null")]
    pub location_id: Option<Option<i64>>,
}

/// Comment creation and edit payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentRequest {
    #[validate(regex(path = "NON_BLANK_REGEX", message = "This field is required"))]
    pub text: String,
}

/// UpdateProfileRequest
///
/// Payload for `POST /profile_edit/`. Only the provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1-150 characters"),
        regex(path = "USERNAME_REGEX", message = "Only letters, digits and @/./+/-/_ are allowed")
    )]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "At most 150 characters"))]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "At most 150 characters"))]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "At most 254 characters")
    )]
    pub email: Option<String>,
}

// --- Admin Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    #[validate(
        length(min = 1, max = 256, message = "Title must be 1-256 characters"),
        regex(path = "NON_BLANK_REGEX", message = "This field is required")
    )]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(
        length(min = 1, max = 64, message = "Slug must be 1-64 characters"),
        regex(path = "SLUG_REGEX", message = "Only latin letters, digits, hyphens and underscores")
    )]
    pub slug: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 256, message = "Title must be 1-256 characters"),
        regex(path = "NON_BLANK_REGEX", message = "This field is required")
    )]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(min = 1, max = 64, message = "Slug must be 1-64 characters"),
        regex(path = "SLUG_REGEX", message = "Only latin letters, digits, hyphens and underscores")
    )]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// Location creation and rename payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct LocationRequest {
    #[validate(
        length(min = 1, max = 256, message = "Name must be 1-256 characters"),
        regex(path = "NON_BLANK_REGEX", message = "This field is required")
    )]
    pub name: String,
}

/// ModeratePostRequest
///
/// The fields staff may change directly from the post listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ModeratePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub category_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<i64>)]
    #[ts(type = "number | null")]
    pub location_id: Option<Option<i64>>,
}

impl From<ModeratePostRequest> for UpdatePostRequest {
    fn from(req: ModeratePostRequest) -> Self {
        Self {
            is_published: req.is_published,
            category_id: req.category_id,
            location_id: req.location_id,
            ..Self::default()
        }
    }
}

fn default_true() -> bool {
    true
}

// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
