mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use blog_api::{
    auth::{self, ActiveUser, Claims, CurrentUser, Superuser},
    config::AppConfig,
    error::ApiError,
};
use chrono::Utc;
use common::{MockRepository, seed_user, test_state};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;

// --- Helper Functions ---

/// Builds request parts with an optional bearer token attached.
fn request_parts(token: Option<&str>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/".parse::<Uri>().unwrap());
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(axum::body::Body::empty()).unwrap();
    let (parts, _) = request.into_parts();
    parts
}

/// Forges a token with arbitrary issued-at/expiry timestamps, bypassing
/// `issue_token`'s always-in-the-future expiry.
fn forge_token(config: &AppConfig, sub: &str, iat_offset: i64, exp_offset: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        iat: (now + iat_offset) as usize,
        exp: (now + exp_offset) as usize,
    };
    encode(
        &Header::new(config.algorithm),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .unwrap()
}

// --- authenticate ---

#[tokio::test]
async fn authenticate_accepts_the_created_password() {
    let repo = Arc::new(MockRepository::default());
    seed_user(&repo, "login@example.com", "hunter2", true, false).await;

    let user = auth::authenticate(repo.as_ref(), "login@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(user.unwrap().email, "login@example.com");
}

#[tokio::test]
async fn authenticate_rejects_any_other_password() {
    let repo = Arc::new(MockRepository::default());
    seed_user(&repo, "login@example.com", "hunter2", true, false).await;

    let user = auth::authenticate(repo.as_ref(), "login@example.com", "hunter3")
        .await
        .unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn authenticate_returns_absent_for_unknown_email() {
    let repo = Arc::new(MockRepository::default());

    let user = auth::authenticate(repo.as_ref(), "ghost@example.com", "whatever")
        .await
        .unwrap();
    assert!(user.is_none());
}

// --- Token resolution (CurrentUser extractor) ---

#[tokio::test]
async fn token_round_trip_resolves_the_same_user() {
    let repo = Arc::new(MockRepository::default());
    let user = seed_user(&repo, "round@example.com", "pw", true, false).await;
    let state = test_state(repo);

    let token = auth::issue_token(&state.config, &user).unwrap();
    let mut parts = request_parts(Some(&token));

    let CurrentUser(resolved) = CurrentUser::from_request_parts(&mut parts, &state)
        .await
        .unwrap();
    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.email, "round@example.com");
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let state = test_state(Arc::new(MockRepository::default()));
    let mut parts = request_parts(None);

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let state = test_state(Arc::new(MockRepository::default()));
    let mut parts = request_parts(None);
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwdw=="),
    );

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let repo = Arc::new(MockRepository::default());
    seed_user(&repo, "stale@example.com", "pw", true, false).await;
    let state = test_state(repo);

    // Expired an hour ago, well past the default validation leeway.
    let token = forge_token(&state.config, "stale@example.com", -7200, -3600);
    let mut parts = request_parts(Some(&token));

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_unauthorized() {
    let repo = Arc::new(MockRepository::default());
    seed_user(&repo, "forged@example.com", "pw", true, false).await;
    let state = test_state(repo);

    let attacker_config = AppConfig {
        secret_key: "attacker-controlled-secret".to_string(),
        ..AppConfig::default()
    };
    let token = forge_token(&attacker_config, "forged@example.com", 0, 3600);
    let mut parts = request_parts(Some(&token));

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn tampered_token_is_unauthorized() {
    let repo = Arc::new(MockRepository::default());
    let user = seed_user(&repo, "victim@example.com", "pw", true, false).await;
    let state = test_state(repo);

    let mut token = auth::issue_token(&state.config, &user).unwrap();
    // Corrupt the signature segment.
    token.pop();
    token.push('x');
    let mut parts = request_parts(Some(&token));

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn valid_token_for_a_deleted_user_is_unauthorized() {
    let state = test_state(Arc::new(MockRepository::default()));

    // Signature and expiry are fine; the subject simply doesn't resolve.
    let token = forge_token(&state.config, "gone@example.com", 0, 3600);
    let mut parts = request_parts(Some(&token));

    let result = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

// --- Role and activity gates ---

#[tokio::test]
async fn inactive_user_fails_the_active_gate() {
    let repo = Arc::new(MockRepository::default());
    let user = seed_user(&repo, "dormant@example.com", "pw", false, false).await;
    let state = test_state(repo);

    let token = auth::issue_token(&state.config, &user).unwrap();
    let mut parts = request_parts(Some(&token));

    // The bare credential still resolves...
    let current = CurrentUser::from_request_parts(&mut parts, &state).await;
    assert!(current.is_ok());

    // ...but the active gate turns it into a 400.
    let mut parts = request_parts(Some(&token));
    let result = ActiveUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[tokio::test]
async fn regular_user_fails_the_superuser_gate() {
    let repo = Arc::new(MockRepository::default());
    let user = seed_user(&repo, "plain@example.com", "pw", true, false).await;
    let state = test_state(repo);

    let token = auth::issue_token(&state.config, &user).unwrap();
    let mut parts = request_parts(Some(&token));

    let result = Superuser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[tokio::test]
async fn inactive_superuser_still_passes_the_superuser_gate() {
    // The privilege chain only asserts the role, matching the upstream
    // dependency wiring.
    let repo = Arc::new(MockRepository::default());
    let user = seed_user(&repo, "retired-admin@example.com", "pw", false, true).await;
    let state = test_state(repo);

    let token = auth::issue_token(&state.config, &user).unwrap();
    let mut parts = request_parts(Some(&token));

    let result = Superuser::from_request_parts(&mut parts, &state).await;
    assert!(result.is_ok());
}
