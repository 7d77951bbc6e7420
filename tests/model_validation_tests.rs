use axum::{http::StatusCode, response::IntoResponse};
use blogicum::{
    AppError,
    error::ErrorResponse,
    models::{
        CommentRequest, CreateCategoryRequest, CreatePostRequest, LocationRequest,
        ModeratePostRequest, UpdateCategoryRequest, UpdatePostRequest, UpdateProfileRequest,
        User, UserProfile,
    },
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

// --- Deserialization Defaults ---

#[test]
fn test_create_post_request_defaults() {
    let req: CreatePostRequest = serde_json::from_value(json!({
        "title": "Hello",
        "text": "World",
        "category_id": 3
    }))
    .unwrap();

    assert!(req.is_published, "posts are published unless said otherwise");
    assert!(req.pub_date.is_none());
    assert!(req.location_id.is_none());
    assert_eq!(req.category_id, 3);
}

#[test]
fn test_update_post_request_location_tristate() {
    let absent: UpdatePostRequest = serde_json::from_value(json!({ "title": "x" })).unwrap();
    assert_eq!(absent.location_id, None, "absent field leaves the location alone");

    let cleared: UpdatePostRequest = serde_json::from_value(json!({ "location_id": null })).unwrap();
    assert_eq!(cleared.location_id, Some(None), "explicit null detaches the location");

    let set: UpdatePostRequest = serde_json::from_value(json!({ "location_id": 7 })).unwrap();
    assert_eq!(set.location_id, Some(Some(7)));
}

#[test]
fn test_update_post_request_skips_absent_fields_when_serialized() {
    let req = UpdatePostRequest {
        title: Some("New".to_string()),
        ..UpdatePostRequest::default()
    };
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value, json!({ "title": "New" }));
}

#[test]
fn test_moderate_post_request_converts_to_partial_update() {
    let moderation: ModeratePostRequest = serde_json::from_value(json!({
        "is_published": false,
        "location_id": null
    }))
    .unwrap();

    let update = UpdatePostRequest::from(moderation);
    assert_eq!(update.is_published, Some(false));
    assert_eq!(update.location_id, Some(None));
    assert!(update.title.is_none());
    assert!(update.text.is_none());
    assert!(update.category_id.is_none());
}

// --- Validation ---

fn rejects(result: Result<(), ValidationErrors>, field: &str) -> bool {
    result.is_err_and(|errors| errors.field_errors().contains_key(field))
}

#[test]
fn test_create_post_validation() {
    let mut req = CreatePostRequest {
        title: "Trip".to_string(),
        text: "Went somewhere".to_string(),
        category_id: 1,
        ..CreatePostRequest::default()
    };
    assert!(req.validate().is_ok());

    req.title = "   ".to_string();
    assert!(rejects(req.validate(), "title"));

    req.title = "x".repeat(257);
    assert!(rejects(req.validate(), "title"));

    req.title = "x".repeat(256);
    req.text = String::new();
    assert!(rejects(req.validate(), "text"));
}

#[test]
fn test_update_post_validation_only_checks_present_fields() {
    assert!(UpdatePostRequest::default().validate().is_ok());
    let blank_title = UpdatePostRequest {
        title: Some(String::new()),
        ..UpdatePostRequest::default()
    };
    assert!(rejects(blank_title.validate(), "title"));
}

#[test]
fn test_comment_validation() {
    assert!(CommentRequest { text: "Nice".into() }.validate().is_ok());
    assert!(rejects(CommentRequest { text: "\n\t ".into() }.validate(), "text"));
}

#[test]
fn test_username_rules() {
    let with_username = |username: &str| UpdateProfileRequest {
        username: Some(username.to_string()),
        ..UpdateProfileRequest::default()
    };
    assert!(with_username("jane.doe+blog@home_1-x").validate().is_ok());
    assert!(rejects(with_username("").validate(), "username"));
    assert!(rejects(with_username("has space").validate(), "username"));
    assert!(rejects(with_username("slash/name").validate(), "username"));
    assert!(rejects(with_username(&"a".repeat(151)).validate(), "username"));
}

#[test]
fn test_profile_name_and_email_limits() {
    let with_email = |email: &str| UpdateProfileRequest {
        email: Some(email.to_string()),
        ..UpdateProfileRequest::default()
    };
    assert!(with_email("me@example.com").validate().is_ok());
    assert!(rejects(with_email("").validate(), "email"));
    assert!(rejects(with_email("@example.com").validate(), "email"));
    assert!(rejects(with_email("plain").validate(), "email"));
    let long_email = format!("{}@{}.com", "a".repeat(60), "b".repeat(200));
    assert!(rejects(with_email(&long_email).validate(), "email"));

    let names = UpdateProfileRequest {
        first_name: Some("n".repeat(150)),
        last_name: Some("n".repeat(151)),
        ..UpdateProfileRequest::default()
    };
    let errors = names.validate().unwrap_err();
    assert!(!errors.field_errors().contains_key("first_name"));
    assert!(errors.field_errors().contains_key("last_name"));
}

#[test]
fn test_slug_rules() {
    let with_slug = |slug: &str| CreateCategoryRequest {
        title: "Travel".into(),
        slug: slug.to_string(),
        ..CreateCategoryRequest::default()
    };
    assert!(with_slug("travel-notes_2024").validate().is_ok());
    assert!(with_slug(&"s".repeat(64)).validate().is_ok());
    assert!(rejects(with_slug(&"s".repeat(65)).validate(), "slug"));
    assert!(rejects(with_slug("").validate(), "slug"));
    assert!(rejects(with_slug("путешествия").validate(), "slug"));
    assert!(rejects(with_slug("bad slug").validate(), "slug"));

    let rename = UpdateCategoryRequest {
        slug: Some("s".repeat(65)),
        ..UpdateCategoryRequest::default()
    };
    assert!(rejects(rename.validate(), "slug"));
}

#[test]
fn test_location_name_rules() {
    assert!(LocationRequest { name: "Lisbon".into() }.validate().is_ok());
    assert!(rejects(LocationRequest { name: " ".into() }.validate(), "name"));
    assert!(rejects(LocationRequest { name: "x".repeat(257) }.validate(), "name"));
}

#[test]
fn test_validation_errors_name_the_field() {
    let errors = CommentRequest { text: String::new() }.validate().unwrap_err();
    assert!(errors.to_string().starts_with("text"));
}

// --- Output Shapes ---

#[test]
fn test_user_profile_hides_email() {
    let user = User {
        id: Uuid::new_v4(),
        username: "jane".into(),
        email: "jane@example.com".into(),
        created_at: Utc::now(),
        ..User::default()
    };
    let joined = user.created_at;
    let profile = UserProfile::from(user);

    assert_eq!(profile.date_joined, joined);
    let json = serde_json::to_string(&profile).unwrap();
    assert!(!json.contains("jane@example.com"));
}

#[test]
fn test_error_response_shape() {
    let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "gone")).unwrap();
    assert_eq!(body, json!({ "error": "NOT_FOUND", "message": "gone" }));
}

#[test]
fn test_app_error_status_codes() {
    let cases = [
        (AppError::NotFound, StatusCode::NOT_FOUND),
        (AppError::Forbidden, StatusCode::FORBIDDEN),
        (AppError::Validation("title".into()), StatusCode::BAD_REQUEST),
        (AppError::Conflict("username".into()), StatusCode::CONFLICT),
        (AppError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
        (AppError::Redirect("/posts/1/".into()), StatusCode::FOUND),
        (AppError::Unauthenticated("/auth/login/".into()), StatusCode::FOUND),
    ];
    for (error, expected) in cases {
        assert_eq!(error.into_response().status(), expected);
    }
}

#[test]
fn test_redirect_carries_location() {
    let response = AppError::Redirect("/posts/9/".into()).into_response();
    assert_eq!(
        response.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/posts/9/")
    );
}
