//! Shared fixtures for the integration tests: an in-memory repository seeded with
//! users, categories and a location, plus helpers to drive the router.
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use blogicum::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{Category, CreateCategoryRequest, CreatePostRequest, Location, Post, User},
    repository::{Repository, RepositoryState},
};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
    pub author: User,
    pub reader: User,
    pub staff: User,
    pub category: Category,
    pub hidden_category: Category,
    pub location: Location,
}

pub fn user(username: &str, is_staff: bool) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        first_name: "Test".to_string(),
        last_name: username.to_string(),
        email: format!("{username}@example.com"),
        is_staff,
        created_at: Utc::now(),
    }
}

pub fn yesterday() -> DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

pub fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

pub async fn fixture() -> Fixture {
    fixture_with_config(AppConfig::default()).await
}

pub async fn fixture_with_config(config: AppConfig) -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    let author = repo.insert_user(user("author", false)).await;
    let reader = repo.insert_user(user("reader", false)).await;
    let staff = repo.insert_user(user("moderator", true)).await;

    let category = repo
        .create_category(CreateCategoryRequest {
            title: "Travel".to_string(),
            description: "Trips and places".to_string(),
            slug: "travel".to_string(),
            is_published: true,
        })
        .await
        .expect("category");
    let hidden_category = repo
        .create_category(CreateCategoryRequest {
            title: "Drafts".to_string(),
            description: String::new(),
            slug: "drafts".to_string(),
            is_published: false,
        })
        .await
        .expect("category");
    let location = repo
        .create_location("Lisbon".to_string())
        .await
        .expect("location");

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config,
    };

    Fixture {
        repo,
        state,
        author,
        reader,
        staff,
        category,
        hidden_category,
        location,
    }
}

impl Fixture {
    pub async fn post(
        &self,
        author: &User,
        title: &str,
        category_id: i64,
        is_published: bool,
        pub_date: DateTime<Utc>,
    ) -> Post {
        self.repo
            .create_post(
                author.id,
                CreatePostRequest {
                    title: title.to_string(),
                    text: format!("Body of {title}"),
                    pub_date: Some(pub_date),
                    is_published,
                    category_id,
                    location_id: None,
                },
                pub_date,
            )
            .await
            .expect("post")
    }

    /// A published post in the published category, dated yesterday.
    pub async fn public_post(&self, title: &str) -> Post {
        self.post(&self.author, title, self.category.id, true, yesterday())
            .await
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_as(uri: &str, user: &User) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user.id.to_string())
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, user: Option<&User>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A POST without a body or content type, as a bare HTML form button would send.
pub fn post_empty(uri: &str, user: Option<&User>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

pub fn send_json(method: &str, uri: &str, user: &User, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user.id.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

pub fn location_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
