use blogicum::{
    AppError,
    models::{AuthorSummary, Comment, Post},
    policy::{AuthorOnly, Authored, can_mutate, post_detail_path, profile_path},
    visibility::Viewer,
};
use uuid::Uuid;

fn authored_post(author: Uuid) -> Post {
    Post {
        id: 42,
        author: AuthorSummary {
            id: author,
            username: "author".to_string(),
        },
        ..Post::default()
    }
}

fn authored_comment(author: Uuid) -> Comment {
    Comment {
        id: 5,
        post_id: 42,
        author: AuthorSummary {
            id: author,
            username: "commenter".to_string(),
        },
        ..Comment::default()
    }
}

#[test]
fn test_only_the_author_may_mutate() {
    let author = Uuid::new_v4();
    let post = authored_post(author);
    let comment = authored_comment(author);

    assert!(can_mutate(&post, &Viewer::Authenticated(author)));
    assert!(can_mutate(&comment, &Viewer::Authenticated(author)));
    assert!(!can_mutate(&post, &Viewer::Authenticated(Uuid::new_v4())));
    assert!(!can_mutate(&comment, &Viewer::Anonymous));
    assert_eq!(post.author_id(), comment.author_id());
}

#[test]
fn test_forbidding_policy() {
    let author = Uuid::new_v4();
    let post = authored_post(author);
    let policy = AuthorOnly::forbidding();

    assert!(policy.check(&post, &Viewer::Authenticated(author)).is_ok());
    assert!(matches!(
        policy.check(&post, &Viewer::Authenticated(Uuid::new_v4())),
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        policy.check(&post, &Viewer::Anonymous),
        Err(AppError::Forbidden)
    ));
}

#[test]
fn test_redirecting_policy_sends_to_given_location() {
    let post = authored_post(Uuid::new_v4());
    let policy = AuthorOnly::redirecting(post_detail_path(post.id));

    match policy.check(&post, &Viewer::Authenticated(Uuid::new_v4())) {
        Err(AppError::Redirect(location)) => assert_eq!(location, "/posts/42/"),
        other => panic!("expected a redirect, got {other:?}"),
    }
}

#[test]
fn test_admit_hands_resource_back() {
    let author = Uuid::new_v4();
    let comment = authored_comment(author);

    let admitted = AuthorOnly::forbidding()
        .admit(comment.clone(), &Viewer::Authenticated(author))
        .unwrap();
    assert_eq!(admitted.id, comment.id);

    assert!(AuthorOnly::forbidding()
        .admit(comment, &Viewer::Authenticated(Uuid::new_v4()))
        .is_err());
}

#[test]
fn test_paths() {
    assert_eq!(post_detail_path(7), "/posts/7/");
    assert_eq!(profile_path("jane"), "/profile/jane/");
}
