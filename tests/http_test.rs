#![cfg(feature = "http")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use repodiff::http::routes;
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_version() {
    let app = routes();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn diff_with_missing_fields_is_rejected_by_the_json_extractor() {
    let app = routes();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/diff")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn diff_with_invalid_caps_is_bad_request() {
    let app = routes();
    let body = serde_json::json!({
        "repo_url": "https://example.test/repo.git",
        "commit_good": "a",
        "commit_candidate": "b",
        "cap_total": 10,
        "cap_file": 20,
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/diff")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
