//! Integration test: HTML форма и JSON API

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use traffic_ml::{models::ArtifactPaths, server, PredictionOutput, Predictor};

/// Зафиксированные артефакты из tests/fixtures/artifacts
fn test_app() -> axum::Router {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/artifacts");
    let predictor = Predictor::load(&ArtifactPaths::in_dir(dir)).unwrap();
    server::router(Arc::new(predictor))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["scaling"], "raw");
    assert_eq!(json["trees"], 2);
}

#[tokio::test]
async fn test_root_serves_form() {
    let response = test_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains(r#"<form method="post" action="/predict">"#));
    assert!(html.contains(r#"name="weather_main""#));
    assert!(html.contains(r#"<option value="Thunderstorm">"#));
    assert!(html.contains(r#"<option value="Sunday">"#));
}

#[tokio::test]
async fn test_api_predict() {
    let body = serde_json::json!({
        "temp": 293.0,
        "rain_1h": 0.0,
        "snow_1h": 0.0,
        "clouds_all": 40.0,
        "weather_main": "Clear",
        "hour": 14,
        "dayofweek": "Wednesday"
    });
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output: PredictionOutput = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        output,
        PredictionOutput {
            linear_regression: 2320,
            random_forest: 3300,
        }
    );
}

#[tokio::test]
async fn test_api_predict_weekend_rush_hour() {
    let body = r#"{"temp": 275.0, "hour": 8, "dayofweek": "Saturday"}"#;
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output: PredictionOutput = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        output,
        PredictionOutput {
            linear_regression: 2135,
            random_forest: 3500,
        }
    );
}

#[tokio::test]
async fn test_api_predict_uses_form_defaults() {
    // Monday 14:00, 293 K, 40% облаков
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output: PredictionOutput = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(output.linear_regression, 2350);
    assert_eq!(output.random_forest, 3300);
}

#[tokio::test]
async fn test_api_rejects_unknown_weather() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"weather_main": "Sandstorm"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"], true);
    assert!(json["message"].as_str().unwrap().contains("Sandstorm"));
}

#[tokio::test]
async fn test_form_post_renders_result() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "temp=293&rain_1h=0&snow_1h=0&clouds_all=40&weather_main=Clear&hour=14&dayofweek=Wednesday",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains(r#"<span id="lr">2320</span>"#));
    assert!(html.contains(r#"<span id="rf">3300</span>"#));
    assert!(html.contains(r#"<option value="Wednesday" selected>"#));
}

#[tokio::test]
async fn test_form_post_out_of_range() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("temp=400&hour=14&dayofweek=Monday&weather_main=Clear"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let html = body_string(response).await;
    assert!(html.contains(r#"class="error""#));
    assert!(html.contains("temp"));
    assert!(!html.contains("Prediction Results"));
}
