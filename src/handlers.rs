use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        Category, CategoryFeedResponse, Comment, CommentRequest, CreateCategoryRequest,
        CreatePostRequest, LocationRequest, FeedResponse, Location, ModeratePostRequest,
        Post, PostDetail, ProfileFeedResponse, UpdateCategoryRequest, UpdatePostRequest,
        UpdateProfileRequest, User, UserProfile,
    },
    pagination::{PageParams, Paginator},
    policy::{AuthorOnly, post_detail_path, profile_path},
    repository::Repository,
    visibility::{self, FeedScope, Viewer},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

// --- Filter Structs ---

/// AdminPostFilter
///
/// Query parameters for the staff post listing (GET /admin/posts).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AdminPostFilter {
    /// Case-insensitive substring of the post title.
    pub search: Option<String>,
    /// Restrict to one category id.
    pub category: Option<i64>,
}

// --- Shared Lookups ---

fn paginator(state: &AppState) -> Paginator {
    Paginator::new(state.config.posts_per_page)
}

// Existence only; visibility is the caller's concern.
async fn existing_post(repo: &dyn Repository, post_id: i64) -> AppResult<Post> {
    repo.get_post(post_id).await?.ok_or(AppError::NotFound)
}

// A comment must be addressed through the post it belongs to.
async fn comment_on_post(repo: &dyn Repository, post_id: i64, comment_id: i64) -> AppResult<Comment> {
    repo.get_comment(comment_id)
        .await?
        .filter(|comment| comment.post_id == post_id)
        .ok_or(AppError::NotFound)
}

async fn ensure_references(
    repo: &dyn Repository,
    category_id: Option<i64>,
    location_id: Option<i64>,
) -> AppResult<()> {
    if let Some(id) = category_id {
        if repo.get_category(id).await?.is_none() {
            return Err(AppError::Validation(format!("category_id: category {id} does not exist")));
        }
    }
    if let Some(id) = location_id {
        if repo.get_location(id).await?.is_none() {
            return Err(AppError::Validation(format!("location_id: location {id} does not exist")));
        }
    }
    Ok(())
}

fn require_staff(user: &AuthUser) -> AppResult<()> {
    if user.is_staff {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

// --- Feeds ---

/// index
///
/// [Public Route] The main feed: publicly visible posts, newest first.
#[utoipa::path(
    get,
    path = "/",
    params(PageParams),
    responses(
        (status = 200, description = "Feed page", body = FeedResponse),
        (status = 404, description = "Page out of range")
    )
)]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<FeedResponse>> {
    let (posts, page) = visibility::load_feed(
        state.repo.as_ref(),
        FeedScope::All,
        true,
        paginator(&state),
        params.number()?,
        Utc::now(),
    )
    .await?;
    Ok(Json(FeedResponse { posts, page }))
}

/// category_posts
///
/// [Public Route] Publicly visible posts of one published category.
#[utoipa::path(
    get,
    path = "/category/{slug}/",
    params(("slug" = String, Path, description = "Category slug"), PageParams),
    responses(
        (status = 200, description = "Category feed", body = CategoryFeedResponse),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<CategoryFeedResponse>> {
    let category = visibility::resolve_category(state.repo.as_ref(), &slug).await?;
    let (posts, page) = visibility::load_feed(
        state.repo.as_ref(),
        FeedScope::Category(category.id),
        true,
        paginator(&state),
        params.number()?,
        Utc::now(),
    )
    .await?;
    Ok(Json(CategoryFeedResponse {
        category,
        posts,
        page,
    }))
}

/// profile
///
/// [Public Route] A user's posts. The owner sees everything they wrote, including
/// unpublished and future-dated posts; everyone else sees the public subset.
#[utoipa::path(
    get,
    path = "/profile/{username}/",
    params(("username" = String, Path, description = "Username"), PageParams),
    responses(
        (status = 200, description = "Profile feed", body = ProfileFeedResponse),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<ProfileFeedResponse>> {
    let owner = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    let (posts, page) = visibility::load_feed(
        state.repo.as_ref(),
        FeedScope::Author(owner.id),
        visibility::profile_needs_public_filter(&viewer, owner.id),
        paginator(&state),
        params.number()?,
        Utc::now(),
    )
    .await?;
    Ok(Json(ProfileFeedResponse {
        profile: UserProfile::from(owner),
        posts,
        page,
    }))
}

// --- Posts ---

/// post_detail
///
/// [Public Route] A post with its comments. Hidden posts read as missing for anyone
/// but their author.
#[utoipa::path(
    get,
    path = "/posts/{id}/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Missing or hidden")
    )
)]
pub async fn post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<PostDetail>> {
    let detail =
        visibility::resolve_post_detail(state.repo.as_ref(), post_id, &viewer, Utc::now()).await?;
    Ok(Json(detail))
}

/// create_post
///
/// [Authenticated Route] Publishes a new post as the requesting user. The response
/// points at the author's profile.
#[utoipa::path(
    post,
    path = "/posts/create/",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    ensure_references(state.repo.as_ref(), Some(payload.category_id), payload.location_id).await?;

    let pub_date = payload.pub_date.unwrap_or_else(Utc::now);
    let post = state.repo.create_post(user.id, payload, pub_date).await?;
    tracing::info!(post_id = post.id, author = %user.id, "post created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, profile_path(&user.username))],
        Json(post),
    ))
}

/// edit_post_form
///
/// [Public Route, author only] The current post, to pre-fill the edit form.
/// Non-authors, anonymous included, are redirected to the post's detail page.
#[utoipa::path(
    get,
    path = "/posts/{id}/edit/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Edit form", body = Post),
        (status = 302, description = "Not the author: redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_post_form(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Post>> {
    let post = existing_post(state.repo.as_ref(), post_id).await?;
    let post = AuthorOnly::redirecting(post_detail_path(post_id)).admit(post, &viewer)?;
    Ok(Json(post))
}

/// edit_post
///
/// [Public Route, author only] Applies a partial update to the post.
#[utoipa::path(
    post,
    path = "/posts/{id}/edit/",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 302, description = "Not the author: redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_post(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<Json<Post>> {
    let post = existing_post(state.repo.as_ref(), post_id).await?;
    AuthorOnly::redirecting(post_detail_path(post_id)).check(&post, &viewer)?;

    // The body is only decoded once the viewer is known to be the author.
    let Json(payload) = payload?;

    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    ensure_references(state.repo.as_ref(), payload.category_id, payload.location_id.flatten()).await?;

    let updated = state
        .repo
        .update_post(post_id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// delete_post
///
/// [Authenticated Route, author only] Deletes the post and its comments.
#[utoipa::path(
    post,
    path = "/posts/{id}/delete/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<StatusCode> {
    let post = existing_post(state.repo.as_ref(), post_id).await?;
    AuthorOnly::forbidding().check(&post, &user.viewer())?;

    if !state.repo.delete_post(post_id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id, author = %user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Comments ---

/// add_comment
///
/// [Authenticated Route] Comments on a post the user can see.
#[utoipa::path(
    post,
    path = "/posts/{id}/comment/",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Missing or hidden post")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let post =
        visibility::resolve_visible_post(state.repo.as_ref(), post_id, &user.viewer(), Utc::now())
            .await?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = state.repo.add_comment(post.id, user.id, payload.text).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, post_detail_path(post.id))],
        Json(comment),
    ))
}

/// edit_comment_form
///
/// [Authenticated Route, author only] The current comment, to pre-fill the edit form.
#[utoipa::path(
    get,
    path = "/posts/{id}/edit_comment/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Edit form", body = Comment),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_comment_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Json<Comment>> {
    let comment = comment_on_post(state.repo.as_ref(), post_id, comment_id).await?;
    Ok(Json(AuthorOnly::forbidding().admit(comment, &user.viewer())?))
}

/// edit_comment
///
/// [Authenticated Route, author only] Replaces the comment text.
#[utoipa::path(
    post,
    path = "/posts/{id}/edit_comment/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> AppResult<Json<Comment>> {
    let comment = comment_on_post(state.repo.as_ref(), post_id, comment_id).await?;
    AuthorOnly::forbidding().check(&comment, &user.viewer())?;
    let Json(payload) = payload?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let updated = state
        .repo
        .update_comment(comment.id, payload.text)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// delete_comment
///
/// [Authenticated Route, author only] Removes a comment.
#[utoipa::path(
    post,
    path = "/posts/{id}/delete_comment/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let comment = comment_on_post(state.repo.as_ref(), post_id, comment_id).await?;
    AuthorOnly::forbidding().check(&comment, &user.viewer())?;

    if !state.repo.delete_comment(comment.id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Profile ---

/// edit_profile_form
///
/// [Authenticated Route] The requesting user's own record.
#[utoipa::path(
    get,
    path = "/profile_edit/",
    responses((status = 200, description = "Own profile", body = User))
)]
pub async fn edit_profile_form(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<User>> {
    let me = state.repo.get_user(user.id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(me))
}

/// edit_profile
///
/// [Authenticated Route] Updates username, names and email of the requesting user.
#[utoipa::path(
    post,
    path = "/profile_edit/",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn edit_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let updated = state
        .repo
        .update_user(user.id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((
        [(header::LOCATION, profile_path(&updated.username))],
        Json(updated),
    ))
}

// --- Admin ---

/// get_admin_categories
///
/// [Admin Route] Every category, published or not.
#[utoipa::path(
    get,
    path = "/admin/categories",
    responses(
        (status = 200, description = "All categories", body = [Category]),
        (status = 403, description = "Not staff")
    )
)]
pub async fn get_admin_categories(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Category>>> {
    require_staff(&user)?;
    Ok(Json(state.repo.list_categories().await?))
}

#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    require_staff(&user)?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let category = state.repo.create_category(payload).await?;
    tracing::info!(category = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Edits a category. Unpublishing hides every post filed under it.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn update_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Category>> {
    require_staff(&user)?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let category = state
        .repo
        .update_category(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

/// delete_category
///
/// [Admin Route] Removes an empty category. Categories that still file posts are kept.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Category still has posts")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_staff(&user)?;
    if !state.repo.delete_category(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(category_id = id, staff = %user.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/locations",
    responses((status = 200, description = "All locations", body = [Location]))
)]
pub async fn get_admin_locations(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Location>>> {
    require_staff(&user)?;
    Ok(Json(state.repo.list_locations().await?))
}

#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = LocationRequest,
    responses((status = 201, description = "Created", body = Location))
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<LocationRequest>,
) -> AppResult<(StatusCode, Json<Location>)> {
    require_staff(&user)?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let location = state.repo.create_location(payload.name).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// update_location
///
/// [Admin Route] Renames a location.
#[utoipa::path(
    put,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    request_body = LocationRequest,
    responses(
        (status = 200, description = "Updated", body = Location),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LocationRequest>,
) -> AppResult<Json<Location>> {
    require_staff(&user)?;
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let location = state
        .repo
        .update_location(id, payload.name)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(location))
}

/// delete_location
///
/// [Admin Route] Removes a location. Posts that referenced it keep existing without one.
#[utoipa::path(
    delete,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_staff(&user)?;
    if !state.repo.delete_location(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(location_id = id, staff = %user.id, "location deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// get_admin_posts
///
/// [Admin Route] Every post regardless of visibility, searchable by title and
/// filterable by category.
#[utoipa::path(
    get,
    path = "/admin/posts",
    params(AdminPostFilter),
    responses((status = 200, description = "All posts", body = [Post]))
)]
pub async fn get_admin_posts(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AdminPostFilter>,
) -> AppResult<Json<Vec<Post>>> {
    require_staff(&user)?;
    let search = filter.search.filter(|s| !s.trim().is_empty());
    Ok(Json(state.repo.list_all_posts(search, filter.category).await?))
}

/// moderate_post
///
/// [Admin Route] Publishes/hides a post or refiles its category and location.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = ModeratePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn moderate_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ModeratePostRequest>,
) -> AppResult<Json<Post>> {
    require_staff(&user)?;
    ensure_references(state.repo.as_ref(), payload.category_id, payload.location_id.flatten()).await?;
    let post = state
        .repo
        .update_post(id, UpdatePostRequest::from(payload))
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(post_id = post.id, staff = %user.id, published = post.is_published, "post moderated");
    Ok(Json(post))
}

/// get_admin_comments
///
/// [Admin Route] Every comment on every post, newest first.
#[utoipa::path(
    get,
    path = "/admin/comments",
    responses(
        (status = 200, description = "All comments", body = [Comment]),
        (status = 403, description = "Not staff")
    )
)]
pub async fn get_admin_comments(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Comment>>> {
    require_staff(&user)?;
    Ok(Json(state.repo.list_all_comments().await?))
}

#[utoipa::path(
    delete,
    path = "/admin/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_admin_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_staff(&user)?;
    if !state.repo.delete_comment(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(comment_id = id, staff = %user.id, "comment removed by staff");
    Ok(StatusCode::NO_CONTENT)
}
