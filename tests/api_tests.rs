use activity_backend::{config::AppConfig, create_app, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

fn test_app() -> Router {
    let state = Arc::new(AppState::new(AppConfig::default()));
    create_app(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "activity-backend");
}

#[tokio::test]
async fn test_reports_before_configuration_are_rejected() {
    let app = test_app();

    for uri in [
        "/api/reports/activity",
        "/api/reports/contributions",
        "/api/reports/response-times",
        "/api/reports/issues/monthly",
        "/api/reports/pulls/monthly",
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT, "uri: {uri}");

        let body = body_json(response).await;
        assert_eq!(body["error"], "no repository configured");
    }
}

#[tokio::test]
async fn test_set_config_rejects_blank_owner() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config?owner=%20&repo=project")
                .body(Body::from("gh-token"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_set_config_with_empty_body_is_noop() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config?owner=octo&repo=project")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unchanged");
    assert_eq!(body["repo"], serde_json::Value::Null);

    // Still unconfigured.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::Value::Null);
}

#[tokio::test]
async fn test_set_config_applies_and_reports_identity() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config?owner=octo&repo=project")
                .body(Body::from("gh-token\n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "configured");
    assert_eq!(body["repo"]["owner"], "octo");
    assert_eq!(body["repo"]["repo"], "project");

    // The identity is queryable; the credential never is.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["owner"], "octo");
    assert_eq!(body["repo"], "project");
}

#[tokio::test]
async fn test_set_config_invalid_utf8_keeps_prior_configuration() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config?owner=octo&repo=project")
                .body(Body::from("gh-token"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/config?owner=other&repo=elsewhere")
                .body(Body::from(vec![0xff, 0xfe, 0x00]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The failed reconfiguration left the first repository in place.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/config")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["owner"], "octo");
    assert_eq!(body["repo"], "project");
}
