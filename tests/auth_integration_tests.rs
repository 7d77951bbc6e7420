mod common;

use axum::http::{HeaderValue, Method, Request, header, request::Parts};
use axum::extract::FromRequestParts;
use blogicum::{
    AppConfig, AppError, AppState,
    auth::{AuthUser, Claims},
    config::Env,
    models::User,
    visibility::Viewer,
};
use common::{fixture_with_config, user};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as usize
}

/// Signs a token for `user_id` expiring `exp_offset` seconds from now (negative: in the past).
fn create_token(user_id: Uuid, exp_offset: i64, secret: &str) -> String {
    let now = now_secs();
    let claims = Claims {
        sub: user_id,
        exp: (now as i64 + exp_offset) as usize,
        iat: now,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// State over a seeded in-memory repository, with the given environment and a
/// known signing secret.
async fn app_state(env: Env) -> (AppState, User) {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    let fx = fixture_with_config(config).await;
    (fx.state.clone(), fx.author.clone())
}

fn request_parts(uri: &str) -> Parts {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(mut parts: Parts, token: &str) -> Parts {
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    parts
}

fn with_bypass(mut parts: Parts, user_id: Uuid) -> Parts {
    parts.headers.insert(
        "x-user-id",
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    );
    parts
}

fn assert_login_redirect(result: Result<AuthUser, AppError>, next: &str) {
    match result {
        Err(AppError::Unauthenticated(location)) => {
            assert_eq!(location, format!("/auth/login/?next={next}"));
        }
        other => panic!("expected a login redirect, got {other:?}"),
    }
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let (state, author) = app_state(Env::Production).await;
    let token = create_token(author.id, 3600, TEST_JWT_SECRET);
    let mut parts = with_bearer(request_parts("/posts/create/"), &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, author.id);
    assert_eq!(auth_user.username, "author");
    assert!(!auth_user.is_staff);
    assert_eq!(auth_user.viewer(), Viewer::Authenticated(author.id));
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let (state, _) = app_state(Env::Production).await;
    let mut parts = request_parts("/posts/create/");

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/posts/create/");
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let (state, author) = app_state(Env::Production).await;
    // Well beyond the default validation leeway.
    let token = create_token(author.id, -3600, TEST_JWT_SECRET);
    let mut parts = with_bearer(request_parts("/profile_edit/"), &token);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/profile_edit/");
}

#[tokio::test]
async fn test_auth_failure_with_wrong_signature() {
    let (state, author) = app_state(Env::Production).await;
    let token = create_token(author.id, 3600, "some-other-secret");
    let mut parts = with_bearer(request_parts("/posts/create/"), &token);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthenticated(_))));
}

#[tokio::test]
async fn test_auth_failure_for_unknown_subject() {
    let (state, _) = app_state(Env::Production).await;
    let token = create_token(Uuid::new_v4(), 3600, TEST_JWT_SECRET);
    let mut parts = with_bearer(request_parts("/posts/create/"), &token);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthenticated(_))));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let (state, author) = app_state(Env::Local).await;
    let mut parts = with_bypass(request_parts("/"), author.id);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, author.id);
}

#[tokio::test]
async fn test_local_bypass_unknown_user_falls_through() {
    let (state, _) = app_state(Env::Local).await;
    let stranger = user("stranger", false);
    let mut parts = with_bypass(request_parts("/posts/create/"), stranger.id);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_login_redirect(result, "/posts/create/");
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let (state, author) = app_state(Env::Production).await;
    // Provide ONLY the local bypass header.
    let mut parts = with_bypass(request_parts("/posts/create/"), author.id);

    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(AppError::Unauthenticated(_))));
}

#[tokio::test]
async fn test_viewer_falls_back_to_anonymous() {
    let (state, author) = app_state(Env::Production).await;

    let mut parts = request_parts("/");
    let viewer = Viewer::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);

    let mut parts = with_bearer(request_parts("/"), "not-a-jwt");
    let viewer = Viewer::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(viewer, Viewer::Anonymous);

    let token = create_token(author.id, 3600, TEST_JWT_SECRET);
    let mut parts = with_bearer(request_parts("/"), &token);
    let viewer = Viewer::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(viewer, Viewer::Authenticated(author.id));
}
