//! Integration tests for API endpoints.
//!
//! The real router runs against in-memory fakes, so no database or Redis
//! is needed.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use contacts_api::errors::AppError;
use contacts_api::infra::MockCacheStore;

use common::{
    app, app_with, owner_id, router_with_cache, test_contact, ymd, FailingDatabase, FakeContactService, HealthyDatabase,
    ADMIN_TOKEN, USER_TOKEN,
};

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn seeded() -> FakeContactService {
    let other = uuid::Uuid::new_v4();
    FakeContactService::with(vec![
        test_contact(1, owner_id(), "Olena", Some(ymd(1990, 5, 17))),
        test_contact(2, owner_id(), "Petro", None),
        test_contact(3, other, "Mariia", Some(ymd(1985, 1, 2))),
    ])
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_contacts_require_bearer_token() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/contacts", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/contacts", Some("forged"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/users/me", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["email"], "owner@example.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());
}

// =============================================================================
// Contacts
// =============================================================================

#[tokio::test]
async fn test_list_only_returns_own_contacts() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/contacts", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "100");
    let body = json_body(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["first_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Olena", "Petro"]);
}

#[tokio::test]
async fn test_list_rejects_limit_out_of_range() {
    let app = app();

    let response = app
        .router
        .oneshot(request(
            Method::GET,
            "/api/contacts?skip=0&limit=501",
            Some(USER_TOKEN),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_unknown_contact_is_not_found() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    // Contact 3 belongs to someone else
    let response = app
        .router
        .oneshot(request(Method::GET, "/api/contacts/3", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Contact not found");
}

#[tokio::test]
async fn test_delete_requires_positive_id() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::DELETE, "/api/contacts/0", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_and_update_of_id_zero_are_not_found() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/contacts/0", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .router
        .oneshot(request(
            Method::PUT,
            "/api/contacts/0",
            Some(USER_TOKEN),
            Some(json!({ "phone": "0501234567" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_contact_returns_201() {
    let app = app();

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/contacts",
            Some(USER_TOKEN),
            Some(json!({
                "first_name": "Ivan",
                "last_name": "Franko",
                "email": "ivan@example.com",
                "phone": "+380 32 111 2233",
                "birthday": "1856-08-27"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["birthday"], "1856-08-27");
    assert!(body.get("user_id").is_none());
}

#[tokio::test]
async fn test_create_contact_validates_payload() {
    let app = app();

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/contacts",
            Some(USER_TOKEN),
            Some(json!({
                "first_name": "Ivan",
                "last_name": "Franko",
                "email": "not-an-email",
                "phone": "+380 32 111 2233"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid email format");
}

#[tokio::test]
async fn test_update_contact_changes_supplied_fields() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .oneshot(request(
            Method::PUT,
            "/api/contacts/2",
            Some(USER_TOKEN),
            Some(json!({ "phone": "0501234567" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["phone"], "0501234567");
    assert_eq!(body["first_name"], "Petro");
}

#[tokio::test]
async fn test_update_with_null_clears_birthday() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    // Absent key: birthday kept
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PUT,
            "/api/contacts/1",
            Some(USER_TOKEN),
            Some(json!({ "extra_info": "met at the library" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["birthday"], "1990-05-17");
    assert_eq!(body["extra_info"], "met at the library");

    // Explicit null: birthday cleared, extra_info untouched
    let response = app
        .router
        .oneshot(request(
            Method::PUT,
            "/api/contacts/1",
            Some(USER_TOKEN),
            Some(json!({ "birthday": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["birthday"].is_null());
    assert_eq!(body["extra_info"], "met at the library");
}

#[tokio::test]
async fn test_delete_contact_returns_204_then_404() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .clone()
        .oneshot(request(Method::DELETE, "/api/contacts/1", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(request(Method::DELETE, "/api/contacts/1", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_requires_a_term() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .oneshot(request(
            Method::GET,
            "/api/contacts/search?first_name=%20%20",
            Some(USER_TOKEN),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_search_matches_case_insensitively() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .oneshot(request(
            Method::GET,
            "/api/contacts/search?first_name=OLE&limit=10",
            Some(USER_TOKEN),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["first_name"], "Olena");
}

#[tokio::test]
async fn test_upcoming_birthdays_validates_days() {
    let app = app_with(seeded(), Arc::new(HealthyDatabase));

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            "/api/contacts/upcoming_birthdays?days=366",
            Some(USER_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .oneshot(request(
            Method::GET,
            "/api/contacts/upcoming_birthdays",
            Some(USER_TOKEN),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_signup_returns_created_user() {
    let app = app();

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/users/signup",
            None,
            Some(json!({
                "username": "newbie",
                "email": "newbie@example.com",
                "password": "long-enough"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["username"], "newbie");
    assert_eq!(body["confirmed"], false);
}

#[tokio::test]
async fn test_signup_conflict_and_short_password() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/users/signup",
            None,
            Some(json!({
                "username": "owner",
                "email": "owner@example.com",
                "password": "long-enough"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/users/signup",
            None,
            Some(json!({
                "username": "shorty",
                "email": "shorty@example.com",
                "password": "short"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "owner@example.com", "password": "correct-horse" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "owner@example.com", "password": "wrong" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_confirmed_email_messages() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/users/confirmed_email/fresh", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Email confirmed");

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/users/confirmed_email/again", None, None))
        .await
        .unwrap();
    assert_eq!(
        json_body(response).await["message"],
        "Your email is already confirmed"
    );

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/users/confirmed_email/bogus", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forgot_password_is_always_accepted() {
    let app = app();

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/users/password/forgot",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        json_body(response).await["message"],
        "A password reset link has been sent to your email."
    );
}

#[tokio::test]
async fn test_reset_password_statuses() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/users/password/reset",
            None,
            Some(json!({ "token": "live", "new_password": "brand-new-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/users/password/reset",
            None,
            Some(json!({ "token": "stale", "new_password": "brand-new-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_change_is_admin_only() {
    let app = app();
    let uri = format!("/api/users/{}/role", owner_id());

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            &uri,
            Some(USER_TOKEN),
            Some(json!({ "role": "admin" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .oneshot(request(
            Method::PATCH,
            &uri,
            Some(ADMIN_TOKEN),
            Some(json!({ "role": "admin" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["role"], "admin");
}

#[tokio::test]
async fn test_logout_returns_204() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::POST, "/api/users/logout", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// Avatar
// =============================================================================

const BOUNDARY: &str = "avatar-boundary";

fn avatar_request(token: Option<&str>, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\n\
         Content-Type: {ct}\r\n\r\n",
        b = BOUNDARY,
        ct = content_type
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(Method::PUT)
        .uri("/api/users/avatar")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_avatar_upload_returns_user_with_avatar() {
    let app = app();

    let response = app
        .router
        .oneshot(avatar_request(Some(USER_TOKEN), "image/png", b"\x89PNG"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["email"], "owner@example.com");
    assert_eq!(
        body["avatar"],
        format!("https://img.example.com/users/{}/avatar", owner_id())
    );
    assert_eq!(body["public_id"], format!("users/{}/avatar", owner_id()));
}

#[tokio::test]
async fn test_avatar_rejects_non_images() {
    let app = app();

    let response = app
        .router
        .oneshot(avatar_request(Some(USER_TOKEN), "text/plain", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Only image uploads are allowed");
}

#[tokio::test]
async fn test_avatar_requires_file_field() {
    let app = app();
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/users/avatar")
        .header(header::AUTHORIZATION, format!("Bearer {}", USER_TOKEN))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_host_failure_is_bad_gateway() {
    let app = app();

    let response = app
        .router
        .oneshot(avatar_request(Some(USER_TOKEN), "image/jpeg", b"fail"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_avatar_requires_bearer_token() {
    let app = app();

    let response = app
        .router
        .oneshot(avatar_request(None, "image/png", b"\x89PNG"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Rate limiting and health
// =============================================================================

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = app();

    let mut last = StatusCode::OK;
    for _ in 0..11 {
        let response = app
            .router
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/users/password/forgot",
                None,
                Some(json!({ "email": "nobody@example.com" })),
            ))
            .await
            .unwrap();
        last = response.status();
        if last == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
            break;
        }
    }

    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.cache.counter_ttl("auth:unknown"), Some(60));
}

#[tokio::test]
async fn test_rate_limit_uses_client_window_counter() {
    let mut cache = MockCacheStore::new();
    cache
        .expect_check_rate_limit()
        .withf(|key, max, window| key == "general:203.0.113.7" && *max == 100 && *window == 60)
        .times(1)
        .returning(|_, _, _| Ok((101, false)));

    let mut req = request(Method::GET, "/api/contacts", Some(USER_TOKEN), None);
    req.headers_mut()
        .insert("X-Forwarded-For", "203.0.113.7".parse().unwrap());

    let response = router_with_cache(Arc::new(cache)).oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
}

#[tokio::test]
async fn test_rate_limit_fails_closed_without_counter() {
    let mut cache = MockCacheStore::new();
    cache
        .expect_check_rate_limit()
        .returning(|_, _, _| Err(AppError::Internal("redis down".into())));

    let response = router_with_cache(Arc::new(cache))
        .oneshot(request(Method::GET, "/api/contacts", Some(USER_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_healthchecker_ok() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/healthchecker", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["database"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthchecker_degraded_when_database_down() {
    let app = app_with(FakeContactService::default(), Arc::new(FailingDatabase));

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/healthchecker", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["database"]["status"], "unhealthy");
    assert_eq!(body["services"]["redis"]["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api-docs/openapi.json", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/api/contacts/search"].is_object());
}
