use crate::{
    models::{
        AuthorSummary, Category, CategorySummary, Comment, CreateCategoryRequest,
        CreatePostRequest, Location, LocationSummary, Post, UpdateCategoryRequest,
        UpdatePostRequest, UpdateProfileRequest, User,
    },
    repository::{RepoResult, Repository, RepositoryError},
    visibility::{FeedQuery, FeedScope, PostSlice, filter_posts},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used by the test suites and for
/// running the API without a database. Feeds go through `filter_posts`, the same rule
/// the SQL implementation encodes in its `WHERE` clause.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<Uuid, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    posts: BTreeMap<i64, StoredPost>,
    comments: BTreeMap<i64, StoredComment>,
    last_id: i64,
}

#[derive(Clone)]
struct StoredPost {
    id: i64,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    is_published: bool,
    author_id: Uuid,
    category_id: i64,
    location_id: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    text: String,
    post_id: i64,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn author(&self, id: Uuid) -> Option<AuthorSummary> {
        self.users.get(&id).map(|u| AuthorSummary {
            id: u.id,
            username: u.username.clone(),
        })
    }

    // Joins a stored post with its author, category, location and comment count.
    fn materialize(&self, stored: &StoredPost) -> Option<Post> {
        let category = self.categories.get(&stored.category_id)?;
        let location = stored
            .location_id
            .and_then(|id| self.locations.get(&id))
            .map(|l| LocationSummary {
                id: l.id,
                name: l.name.clone(),
            });
        let comment_count = self
            .comments
            .values()
            .filter(|c| c.post_id == stored.id)
            .count();
        Some(Post {
            id: stored.id,
            title: stored.title.clone(),
            text: stored.text.clone(),
            pub_date: stored.pub_date,
            is_published: stored.is_published,
            author: self.author(stored.author_id)?,
            category: CategorySummary {
                id: category.id,
                title: category.title.clone(),
                slug: category.slug.clone(),
                is_published: category.is_published,
            },
            location,
            comment_count: comment_count as i64,
            created_at: stored.created_at,
        })
    }

    fn comment(&self, stored: &StoredComment) -> Option<Comment> {
        Some(Comment {
            id: stored.id,
            text: stored.text.clone(),
            post_id: stored.post_id,
            author: self.author(stored.author_id)?,
            created_at: stored.created_at,
        })
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != except)
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, as the identity provider would. Replaces any user with the
    /// same id.
    pub async fn insert_user(&self, user: User) -> User {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_posts(&self, query: FeedQuery) -> RepoResult<PostSlice> {
        let tables = self.tables.read().await;
        let in_scope = tables
            .posts
            .values()
            .filter(|p| match query.scope {
                FeedScope::All => true,
                FeedScope::Category(id) => p.category_id == id,
                FeedScope::Author(id) => p.author_id == id,
            })
            .filter_map(|p| tables.materialize(p));

        let visible = filter_posts(in_scope, query.public_only, query.now);
        let total = visible.len() as i64;
        let posts = visible
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(PostSlice { posts, total })
    }

    async fn list_all_posts(&self, search: Option<String>, category_id: Option<i64>) -> RepoResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let needle = search.map(|s| s.to_lowercase());
        let matching = tables
            .posts
            .values()
            .filter(|p| category_id.is_none_or(|id| p.category_id == id))
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.title.to_lowercase().contains(n))
            })
            .filter_map(|p| tables.materialize(p));
        Ok(filter_posts(matching, false, Utc::now()))
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).and_then(|p| tables.materialize(p)))
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest, pub_date: DateTime<Utc>) -> RepoResult<Post> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let stored = StoredPost {
            id,
            title: req.title,
            text: req.text,
            pub_date,
            is_published: req.is_published,
            author_id,
            category_id: req.category_id,
            location_id: req.location_id,
            created_at: Utc::now(),
        };
        let post = tables
            .materialize(&stored)
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        tables.posts.insert(id, stored);
        Ok(post)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            stored.title = title;
        }
        if let Some(text) = req.text {
            stored.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            stored.pub_date = pub_date;
        }
        if let Some(is_published) = req.is_published {
            stored.is_published = is_published;
        }
        if let Some(category_id) = req.category_id {
            stored.category_id = category_id;
        }
        if let Some(location_id) = req.location_id {
            stored.location_id = location_id;
        }
        let stored = stored.clone();
        Ok(tables.materialize(&stored))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.posts.remove(&id).is_some();
        if removed {
            tables.comments.retain(|_, c| c.post_id != id);
        }
        Ok(removed)
    }

    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| tables.comment(c))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.get(&id).and_then(|c| tables.comment(c)))
    }

    async fn add_comment(&self, post_id: i64, author_id: Uuid, text: String) -> RepoResult<Comment> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let stored = StoredComment {
            id,
            text,
            post_id,
            author_id,
            created_at: Utc::now(),
        };
        let comment = tables
            .comment(&stored)
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        tables.comments.insert(id, stored);
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.comments.get_mut(&id) else {
            return Ok(None);
        };
        stored.text = text;
        let stored = stored.clone();
        Ok(tables.comment(&stored))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.remove(&id).is_some())
    }

    async fn list_all_comments(&self) -> RepoResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter_map(|c| tables.comment(c))
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn get_category_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> RepoResult<Category> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&req.slug, None) {
            return Err(RepositoryError::Conflict("category slug already in use".to_string()));
        }
        let category = Category {
            id: tables.next_id(),
            title: req.title,
            description: req.description,
            slug: req.slug,
            is_published: req.is_published,
            created_at: Utc::now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: i64, req: UpdateCategoryRequest) -> RepoResult<Option<Category>> {
        let mut tables = self.tables.write().await;
        if let Some(slug) = &req.slug {
            if tables.slug_taken(slug, Some(id)) {
                return Err(RepositoryError::Conflict("category slug already in use".to_string()));
            }
        }
        let Some(category) = tables.categories.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            category.title = title;
        }
        if let Some(description) = req.description {
            category.description = description;
        }
        if let Some(slug) = req.slug {
            category.slug = slug;
        }
        if let Some(is_published) = req.is_published {
            category.is_published = is_published;
        }
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.posts.values().any(|p| p.category_id == id) {
            return Err(RepositoryError::Conflict("category still has posts".to_string()));
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn get_location(&self, id: i64) -> RepoResult<Option<Location>> {
        Ok(self.tables.read().await.locations.get(&id).cloned())
    }

    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        let tables = self.tables.read().await;
        let mut locations: Vec<Location> = tables.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn create_location(&self, name: String) -> RepoResult<Location> {
        let mut tables = self.tables.write().await;
        let location = Location {
            id: tables.next_id(),
            name,
            created_at: Utc::now(),
        };
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn update_location(&self, id: i64, name: String) -> RepoResult<Option<Location>> {
        let mut tables = self.tables.write().await;
        let Some(location) = tables.locations.get_mut(&id) else {
            return Ok(None);
        };
        location.name = name;
        Ok(Some(location.clone()))
    }

    async fn delete_location(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.locations.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(true)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_user(&self, id: Uuid, req: UpdateProfileRequest) -> RepoResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if let Some(username) = &req.username {
            if tables.users.values().any(|u| &u.username == username && u.id != id) {
                return Err(RepositoryError::Conflict(
                    "a user with that username already exists".to_string(),
                ));
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = req.username {
            user.username = username;
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        Ok(Some(user.clone()))
    }
}
