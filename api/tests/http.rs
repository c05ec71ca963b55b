//! Router tests over a real `AppState` with the reference backend.

use std::sync::Arc;

use appstate::{AppState, AppStateConfig, Backends};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use tryon_api::{build_router, ApiConfig};

const BOUNDARY: &str = "tryon-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([100, 70, 50]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_form(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn app(dir: &TempDir) -> Router {
    let config = AppStateConfig {
        temp_dir: dir.path().join("temp"),
        output_dir: dir.path().join("outputs"),
        error_log: Some(dir.path().join("errors.jsonl")),
        environment: "testing".to_string(),
        docs_path: Some("/swagger-ui".to_string()),
        ..Default::default()
    };
    let state = AppState::new(config, Backends::reference(), 0).unwrap();
    build_router(Arc::new(state), &ApiConfig::development())
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_banner_points_at_health() {
    let dir = TempDir::new().unwrap();
    let response = app(&dir).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["name"], "TryOn Server");
    assert_eq!(body["health"], "/health");
    assert_eq!(body["docs"], "/swagger-ui");
}

#[tokio::test]
async fn test_health_reports_unloaded_models() {
    let dir = TempDir::new().unwrap();
    let response = app(&dir).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["modelsLoaded"], false);
    assert_eq!(body["environment"], "testing");
    assert_eq!(body["profiles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_process_then_download_result() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let request = post_form(
        "/process",
        &[
            Part::File("model_file", "person.png", png(256, 256)),
            Part::File("cloth_file", "shirt.png", png(256, 256)),
            Part::Text("model_type", "hd"),
            Part::Text("category", "0"),
            Part::Text("samples", "1"),
            Part::Text("steps", "2"),
        ],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["processingTimeSeconds"].as_f64().unwrap() > 0.0);
    let paths = body["resultPaths"].as_array().unwrap();
    assert_eq!(paths.len(), 1);

    let filename = std::path::Path::new(paths[0].as_str().unwrap())
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    let response = app
        .oneshot(get(&format!("/results/{filename}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let image = image::load_from_memory(&bytes).unwrap();
    assert_eq!((image.width(), image.height()), (768, 1024));
}

#[tokio::test]
async fn test_tryon_alias_reports_validation_fields() {
    let dir = TempDir::new().unwrap();
    let request = post_form(
        "/tryon",
        &[
            Part::File("model_file", "person.png", png(256, 256)),
            Part::File("cloth_file", "shirt.png", png(256, 256)),
            Part::Text("model_type", "dc"),
            Part::Text("category", "5"),
        ],
    );
    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "ValidationError");
    let fields: Vec<&str> = body["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["category"]);
}

fn field_names(body: &Value) -> Vec<String> {
    body["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_non_numeric_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let request = post_form(
        "/process",
        &[
            Part::File("model_file", "person.png", png(256, 256)),
            Part::File("cloth_file", "shirt.png", png(256, 256)),
            Part::Text("samples", "many"),
            Part::Text("scale", "2.5"),
        ],
    );
    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json(response).await;
    assert_eq!(field_names(&body), vec!["samples"]);
    assert!(body["fieldErrors"][0]["message"].as_str().unwrap().contains("many"));
}

#[tokio::test]
async fn test_form_and_rule_violations_are_reported_together() {
    let dir = TempDir::new().unwrap();
    let request = post_form(
        "/process",
        &[
            Part::File("model_file", "person.png", png(256, 256)),
            Part::Text("model_type", "dc"),
            Part::Text("category", "5"),
            Part::Text("samples", "many"),
            Part::Text("steps", "99"),
        ],
    );
    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json(response).await;
    assert_eq!(body["errorKind"], "ValidationError");
    let fields = field_names(&body);
    for expected in ["samples", "category", "steps", "clothImage"] {
        assert!(fields.iter().any(|f| f == expected), "missing {expected} in {fields:?}");
    }
    assert_eq!(fields.len(), 4);
}

#[tokio::test]
async fn test_missing_cloth_file_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let request = post_form(
        "/process",
        &[
            Part::File("model_file", "person.png", png(256, 256)),
            Part::File("cloth_file", "", Vec::new()),
        ],
    );
    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json(response).await;
    let fields = body["fieldErrors"].as_array().unwrap();
    assert!(fields.iter().any(|f| f["field"] == "clothImage"));
    assert_eq!(
        std::fs::read_dir(dir.path().join("temp").join("uploads")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_plain_body_is_rejected() {
    let dir = TempDir::new().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(&dir).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["errorKind"], "ValidationError");
}

#[tokio::test]
async fn test_unknown_result_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let response = app.clone().oneshot(get("/results/nothing.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/results/..%2Fsecret.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_error_summary_starts_empty() {
    let dir = TempDir::new().unwrap();
    let response = app(&dir).oneshot(get("/errors/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["totalErrors"], 0);
    assert!(body["recentErrors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let dir = TempDir::new().unwrap();
    let response = app(&dir)
        .oneshot(get("/api-doc/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    tokio_test::assert_ok!(serde_json::to_string(&body));
    for path in ["/", "/health", "/process", "/results/{filename}", "/errors/summary"] {
        assert!(body["paths"].get(path).is_some(), "missing {path}");
    }
}
