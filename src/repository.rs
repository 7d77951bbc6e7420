use crate::{
    models::{
        AuthorSummary, Category, CategorySummary, Comment, CreateCategoryRequest,
        CreatePostRequest, Location, LocationSummary, Post, UpdateCategoryRequest,
        UpdatePostRequest, UpdateProfileRequest, User,
    },
    visibility::{FeedQuery, FeedScope, PostSlice},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by a repository implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint (username, category slug) was violated.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers and the
/// visibility rules can run against Postgres in production and the in-memory store in
/// tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Feeds & Posts ---
    // One page of a feed. Must apply the public predicate when `query.public_only` is set.
    async fn list_posts(&self, query: FeedQuery) -> RepoResult<PostSlice>;
    // Staff listing: every post, optionally narrowed by title search and category.
    async fn list_all_posts(&self, search: Option<String>, category_id: Option<i64>) -> RepoResult<Vec<Post>>;
    // No visibility check; callers decide.
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest, pub_date: DateTime<Utc>) -> RepoResult<Post>;
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>>;
    // Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    // Oldest first.
    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String) -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
    // Staff listing across every post, newest first.
    async fn list_all_comments(&self) -> RepoResult<Vec<Comment>>;

    // --- Categories & Locations ---
    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, req: UpdateCategoryRequest) -> RepoResult<Option<Category>>;
    // A category that still has posts is a `Conflict`.
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;
    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>>;
    async fn list_locations(&self) -> RepoResult<Vec<Location>>;
    async fn create_location(&self, name: String) -> RepoResult<Location>;
    async fn update_location(&self, id: i64, name: String) -> RepoResult<Option<Location>>;
    // Posts that referenced the location lose it.
    async fn delete_location(&self, id: i64) -> RepoResult<bool>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Partial profile update. A taken username is a `Conflict`.
    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Mapping ---

// Flat shape of the post/author/category/location join.
#[derive(FromRow)]
struct PostRow {
    id: i64,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    is_published: bool,
    created_at: DateTime<Utc>,
    author_id: Uuid,
    author_username: String,
    category_id: i64,
    category_title: String,
    category_slug: String,
    category_is_published: bool,
    location_id: Option<i64>,
    location_name: Option<String>,
    comment_count: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let location = match (row.location_id, row.location_name) {
            (Some(id), Some(name)) => Some(LocationSummary { id, name }),
            _ => None,
        };
        Post {
            id: row.id,
            title: row.title,
            text: row.text,
            pub_date: row.pub_date,
            is_published: row.is_published,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
            },
            category: CategorySummary {
                id: row.category_id,
                title: row.category_title,
                slug: row.category_slug,
                is_published: row.category_is_published,
            },
            location,
            comment_count: row.comment_count,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    text: String,
    post_id: i64,
    author_id: Uuid,
    author_username: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            text: row.text,
            post_id: row.post_id,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
            },
            created_at: row.created_at,
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.is_published, p.created_at,
        p.author_id, u.username AS author_username,
        p.category_id, c.title AS category_title, c.slug AS category_slug,
        c.is_published AS category_is_published,
        p.location_id, l.name AS location_name,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, u.username AS author_username, cm.created_at
    FROM comments cm
    JOIN users u ON u.id = cm.author_id
"#;

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const USER_COLUMNS: &str = "id, username, first_name, last_name, email, is_staff, created_at";

/// Appends the scope and (optionally) the public-visibility predicate to a query
/// whose `FROM` clause aliases posts as `p` and categories as `c`.
fn push_feed_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &FeedQuery) {
    builder.push(" WHERE TRUE");
    match query.scope {
        FeedScope::All => {}
        FeedScope::Category(category_id) => {
            builder.push(" AND p.category_id = ").push_bind(category_id);
        }
        FeedScope::Author(author_id) => {
            builder.push(" AND p.author_id = ").push_bind(author_id);
        }
    }
    if query.public_only {
        builder
            .push(" AND p.is_published = TRUE AND c.is_published = TRUE AND p.pub_date <= ")
            .push_bind(query.now);
    }
}

/// Builds an `ILIKE ... ESCAPE '\'` pattern that matches `text` literally anywhere in
/// the column: `%`, `_` and `\` in the search term lose their wildcard meaning.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Conflict(message.to_string()),
        _ => RepositoryError::Database(err),
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_posts
    ///
    /// Builds the page and its count from the same filter clause with `QueryBuilder`, so
    /// the visible set and the reported total can never disagree.
    async fn list_posts(&self, query: FeedQuery) -> RepoResult<PostSlice> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        push_feed_filters(&mut builder, &query);
        builder
            .push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);
        let rows = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;

        let mut counter: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p JOIN categories c ON c.id = p.category_id",
        );
        push_feed_filters(&mut counter, &query);
        let total = counter.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok(PostSlice {
            posts: rows.into_iter().map(Post::from).collect(),
            total,
        })
    }

    async fn list_all_posts(&self, search: Option<String>, category_id: Option<i64>) -> RepoResult<Vec<Post>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        builder.push(" WHERE TRUE");
        if let Some(s) = search {
            builder
                .push(" AND p.title ILIKE ")
                .push_bind(contains_pattern(&s))
                .push(r" ESCAPE '\'");
        }
        if let Some(id) = category_id {
            builder.push(" AND p.category_id = ").push_bind(id);
        }
        builder.push(" ORDER BY p.pub_date DESC, p.id DESC");
        let rows = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest, pub_date: DateTime<Utc>) -> RepoResult<Post> {
        let id: i64 = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO posts (title, text, pub_date, is_published, author_id, category_id, location_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(req.title)
        .bind(req.text)
        .bind(pub_date)
        .bind(req.is_published)
        .bind(author_id)
        .bind(req.category_id)
        .bind(req.location_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_post(id)
            .await?
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))
    }

    /// update_post
    ///
    /// `COALESCE` keeps columns whose field is absent. The location needs an explicit
    /// flag because `null` there means "detach".
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                text = COALESCE($3, text),
                pub_date = COALESCE($4, pub_date),
                is_published = COALESCE($5, is_published),
                category_id = COALESCE($6, category_id),
                location_id = CASE WHEN $7 THEN $8 ELSE location_id END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.is_published)
        .bind(req.category_id)
        .bind(req.location_id.is_some())
        .bind(req.location_id.flatten())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(id).await
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC");
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let sql = format!("{COMMENT_SELECT} WHERE cm.id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    /// add_comment
    ///
    /// Inserts and joins the author's username in one round trip using a CTE.
    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String) -> RepoResult<Comment> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (text, post_id, author_id) VALUES ($1, $2, $3)
                RETURNING id, text, post_id, author_id, created_at
            )
            SELECT i.id, i.text, i.post_id, i.author_id, u.username AS author_username, i.created_at
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        let result = sqlx::query("UPDATE comments SET text = $2 WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_comment(id).await
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all_comments(&self) -> RepoResult<Vec<Comment>> {
        let sql = format!("{COMMENT_SELECT} ORDER BY cm.created_at DESC, cm.id DESC");
        let rows = sqlx::query_as::<_, CommentRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY title ASC");
        Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let sql = format!(
            "INSERT INTO categories (title, description, slug, is_published) VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(req.title)
            .bind(req.description)
            .bind(req.slug)
            .bind(req.is_published)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "category slug already in use"))
    }

    async fn update_category(&self, id: i64, req: UpdateCategoryRequest) -> RepoResult<Option<Category>> {
        let sql = format!(
            r#"UPDATE categories
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   slug = COALESCE($4, slug),
                   is_published = COALESCE($5, is_published)
               WHERE id = $1
               RETURNING {CATEGORY_COLUMNS}"#
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.description)
            .bind(req.slug)
            .bind(req.is_published)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "category slug already in use"))
    }

    /// delete_category
    ///
    /// `posts.category_id` is `ON DELETE RESTRICT`, so the foreign key itself refuses
    /// to orphan posts.
    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_foreign_key_violation() => {
                    RepositoryError::Conflict("category still has posts".to_string())
                }
                _ => RepositoryError::Database(e),
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>> {
        Ok(sqlx::query_as::<_, Location>("SELECT id, name, created_at FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        Ok(sqlx::query_as::<_, Location>("SELECT id, name, created_at FROM locations ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_location(&self, name: String) -> RepoResult<Location> {
        Ok(sqlx::query_as::<_, Location>(
            "INSERT INTO locations (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_location(&self, id: i64, name: String) -> RepoResult<Option<Location>> {
        Ok(sqlx::query_as::<_, Location>(
            "UPDATE locations SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_location(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>> {
        let sql = format!(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   first_name = COALESCE($3, first_name),
                   last_name = COALESCE($4, last_name),
                   email = COALESCE($5, email)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.username)
            .bind(req.first_name)
            .bind(req.last_name)
            .bind(req.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "a user with that username already exists"))
    }
}
