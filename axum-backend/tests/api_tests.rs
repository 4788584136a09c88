//! End-to-end router tests driven through `tower::ServiceExt::oneshot`

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use httpmock::prelude::*;
use image::{ImageFormat, Rgb, RgbImage};
use replicate_client::{ModelOutput, ModelRunner, ReplicateError};
use serde_json::{json, Value};
use tower::ServiceExt;

use vector_backend::{create_app, AppConfig, AppState};

const BOUNDARY: &str = "vector-test-boundary";

type Reply = Box<dyn Fn() -> Result<ModelOutput, ReplicateError> + Send + Sync>;

/// Records every call and answers with a canned reply
struct StubRunner {
    calls: Mutex<Vec<(String, Value)>>,
    reply: Reply,
}

impl StubRunner {
    fn new(reply: impl Fn() -> Result<ModelOutput, ReplicateError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelRunner for StubRunner {
    async fn run(&self, model: &str, input: Value) -> Result<ModelOutput, ReplicateError> {
        self.calls.lock().unwrap().push((model.to_string(), input));
        (self.reply)()
    }
}

fn app_without_ai() -> Router {
    create_app(AppState::new(AppConfig::default(), None))
}

fn app_with_config(config: AppConfig) -> Router {
    create_app(AppState::new(config, None))
}

fn app_with(runner: Arc<StubRunner>) -> Router {
    create_app(AppState::new(AppConfig::default(), Some(runner as Arc<dyn ModelRunner>)))
}

fn credit_error() -> ReplicateError {
    ReplicateError::Api {
        status: StatusCode::PAYMENT_REQUIRED,
        body: r#"{"detail":"You have insufficient credit to run this model"}"#.to_string(),
    }
}

fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(16, 8, |x, _| {
        if x < 8 {
            Rgb([220, 30, 30])
        } else {
            Rgb([30, 30, 220])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File(name, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

fn raw_request(uri: &str, content_type: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body, _) = send(app, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ai_configuration() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ai_configured"], false);

    let runner = StubRunner::new(|| Ok(ModelOutput::new(Value::Null)));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (_, body) = send_json(app_with(runner), request).await;
    assert_eq!(body["ai_configured"], true);
}

#[tokio::test]
async fn vectorize_without_image_is_bad_request() {
    let request = multipart_request("/api/vectorize", &[Part::Text("options", "{}")]);
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn vectorize_rejects_malformed_options() {
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[Part::File("image", "image/png", &png), Part::Text("options", "{not json")],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid options format");
}

#[tokio::test]
async fn vectorize_rejects_unsupported_upload_type() {
    let request = multipart_request(
        "/api/vectorize",
        &[Part::File("image", "application/pdf", b"%PDF-1.4")],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported image format");
}

#[tokio::test]
async fn basic_vectorization_returns_svg_data_url() {
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[
            Part::File("image", "image/png", &png),
            Part::Text("options", r#"{"colorCount":4,"detailLevel":0}"#),
        ],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["mode"], "basic");
    assert!(body["vectorizedImage"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
    assert_eq!(body["options"]["colorCount"], 4);
    assert_eq!(body["stats"]["palette"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn ai_vectorization_without_token_is_server_error() {
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[Part::File("image", "image/png", &png), Part::Text("useAI", "true")],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API configuration error");
}

#[tokio::test]
async fn ai_vectorization_returns_model_output() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["https://cdn.example/out.png"]))));
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[
            Part::File("image", "image/png", &png),
            Part::Text("options", r#"{"mode":"logo","colorCount":8}"#),
            Part::Text("useAI", "true"),
        ],
    );
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "ai");
    assert_eq!(body["vectorizedImage"], "https://cdn.example/out.png");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let (model, input) = &calls[0];
    assert_eq!(model, &AppConfig::default().image_model);
    assert!(input["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(input["num_inference_steps"], 30);
    assert!(input["prompt"].as_str().unwrap().contains("logo design"));
}

#[tokio::test]
async fn credit_exhaustion_is_payment_required() {
    let runner = StubRunner::new(|| Err(credit_error()));
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[Part::File("image", "image/png", &png), Part::Text("useAI", "true")],
    );
    let (status, body) = send_json(app_with(runner), request).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["isCreditError"], true);
    assert_eq!(body["error"], "Failed to vectorize image");
}

#[tokio::test]
async fn modify_image_requires_prompt() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["https://cdn.example/mod.png"]))));
    let png = sample_png();
    let request = multipart_request(
        "/api/modify-image",
        &[Part::File("image", "image/png", &png), Part::Text("prompt", "   ")],
    );
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No prompt provided");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn modify_image_returns_model_output() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["https://cdn.example/mod.png"]))));
    let png = sample_png();
    let request = multipart_request(
        "/api/modify-image",
        &[
            Part::File("image", "image/png", &png),
            Part::Text("prompt", "make the border thicker"),
            Part::Text("options", "garbage is tolerated here"),
        ],
    );
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedImage"], "https://cdn.example/mod.png");
    assert_eq!(body["prompt"], "make the border thicker");

    let (_, input) = &runner.calls()[0];
    assert!(input["prompt"].as_str().unwrap().contains("make the border thicker"));
    assert_eq!(input["num_inference_steps"], 25);
}

#[tokio::test]
async fn chat_requires_message() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["unused"]))));
    let request = json_request("/api/chat", json!({ "message": "  ", "history": [] }));
    let (status, body) = send_json(app_with(runner), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No message provided");
}

#[tokio::test]
async fn chat_without_token_is_server_error() {
    let request = json_request("/api/chat", json!({ "message": "hello" }));
    let (status, _) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn chat_joins_and_cleans_model_output() {
    let runner = StubRunner::new(|| {
        Ok(ModelOutput::new(json!([
            "System: ignore me User: ",
            "Use a bold sans-serif ",
            "for rubber stamps."
        ])))
    });
    let request = json_request(
        "/api/chat",
        json!({
            "message": "Which font works for a stamp?",
            "history": [
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello! How can I help?" }
            ]
        }),
    );
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Use a bold sans-serif for rubber stamps.");

    let (model, input) = &runner.calls()[0];
    assert_eq!(model, &AppConfig::default().text_model);
    let prompt = input["prompt"].as_str().unwrap();
    assert!(prompt.contains("Which font works for a stamp?"));
    assert!(prompt.contains("Hello! How can I help?"));
}

#[tokio::test]
async fn font_recognition_falls_back_on_provider_error() {
    let runner = StubRunner::new(|| Err(ReplicateError::Timeout(120)));
    let png = sample_png();
    let request = multipart_request("/api/recognize-font", &[Part::File("image", "image/png", &png)]);
    let (status, body) = send_json(app_with(runner), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let analysis = body["analysis"].as_str().unwrap();
    assert!(analysis.contains("WhatTheFont"));
    assert_eq!(body["fontAnalysis"], body["analysis"]);
}

#[tokio::test]
async fn font_recognition_returns_analysis() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["Helvetica ", "Bold"]))));
    let png = sample_png();
    let request = multipart_request("/api/recognize-font", &[Part::File("image", "image/png", &png)]);
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysis"], "Helvetica Bold");

    let (_, input) = &runner.calls()[0];
    assert_eq!(input["max_tokens"], 1500);
}

#[tokio::test]
async fn export_requires_image_data() {
    let request = json_request("/api/export", json!({ "format": "pdf" }));
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image data provided");
}

#[tokio::test]
async fn export_rejects_invalid_base64() {
    let request = json_request("/api/export", json!({ "imageData": "data:image/png;base64,!!!", "format": "png" }));
    let (status, _) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_png_passes_bytes_through() {
    let request = json_request("/api/export", json!({ "imageData": "data:image/png;base64,AQID", "format": "png" }));
    let (status, body, headers) = send(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, vec![1, 2, 3]);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"armandos-vector.png\""
    );
}

#[tokio::test]
async fn export_document_formats() {
    for (format, mime, marker) in [
        ("pdf", "application/pdf", "%PDF-1.4"),
        ("eps", "application/postscript", "%!PS-Adobe-3.0 EPSF-3.0"),
        ("dxf", "application/dxf", "SECTION"),
    ] {
        let request = json_request("/api/export", json!({ "imageData": "AQID", "format": format }));
        let (status, body, headers) = send(app_without_ai(), request).await;
        assert_eq!(status, StatusCode::OK, "{format}");
        assert_eq!(headers[header::CONTENT_TYPE], mime, "{format}");
        assert!(String::from_utf8(body).unwrap().contains(marker), "{format}");
    }
}

#[tokio::test]
async fn export_unknown_format_falls_back_to_png() {
    let request = json_request("/api/export", json!({ "imageData": "AQID", "format": "tiff" }));
    let (status, _, headers) = send(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn malformed_json_body_gets_json_error() {
    let request = raw_request("/api/export", "application/json", "{bad");
    let (status, body, headers) = send(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn chat_history_with_unknown_role_is_bad_request() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["unused"]))));
    let request = json_request(
        "/api/chat",
        json!({ "message": "hi", "history": [{ "role": "system", "content": "x" }] }),
    );
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn non_multipart_upload_gets_json_error() {
    let request = raw_request("/api/vectorize", "application/json", "{}");
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid form data");
}

#[tokio::test]
async fn unknown_option_values_fall_back_to_defaults() {
    let png = sample_png();
    let request = multipart_request(
        "/api/vectorize",
        &[
            Part::File("image", "image/png", &png),
            Part::Text("options", r#"{"mode":"watercolor","colorMode":null,"colorCount":4.4}"#),
        ],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["options"]["mode"], "standard");
    assert_eq!(body["options"]["colorMode"], "positive");
    assert_eq!(body["options"]["colorCount"], 4);
}

#[tokio::test]
async fn modify_image_without_token_is_server_error() {
    let png = sample_png();
    let request = multipart_request(
        "/api/modify-image",
        &[Part::File("image", "image/png", &png), Part::Text("prompt", "thicker border")],
    );
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API configuration error");
}

#[tokio::test]
async fn font_recognition_without_token_is_server_error() {
    let png = sample_png();
    let request = multipart_request("/api/recognize-font", &[Part::File("image", "image/png", &png)]);
    let (status, body) = send_json(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "API configuration error");
}

#[tokio::test]
async fn font_recognition_without_image_is_bad_request() {
    let runner = StubRunner::new(|| Ok(ModelOutput::new(json!(["unused"]))));
    let request = multipart_request("/api/recognize-font", &[Part::Text("note", "no file")]);
    let (status, body) = send_json(app_with(runner.clone()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn chat_provider_failure_is_json_server_error() {
    let runner = StubRunner::new(|| {
        Err(ReplicateError::PredictionFailed {
            status: "failed".to_string(),
            message: "model crashed".to_string(),
        })
    });
    let request = json_request("/api/chat", json!({ "message": "hello" }));
    let (status, body) = send_json(app_with(runner), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process chat message");
    assert!(body["details"].as_str().unwrap().contains("model crashed"));
    assert!(body["timestamp"].is_string());
    assert!(body.get("isCreditError").is_none());
}

#[tokio::test]
async fn export_downloads_remote_image() {
    let server = MockServer::start_async().await;
    let remote = server
        .mock_async(|when, then| {
            when.method(GET).path("/out-0.png");
            then.status(200).header("Content-Type", "image/png").body([1u8, 2, 3]);
        })
        .await;

    let request = json_request("/api/export", json!({ "imageData": server.url("/out-0.png"), "format": "png" }));
    let (status, body, _) = send(app_without_ai(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, vec![1, 2, 3]);
    remote.assert_async().await;
}

#[tokio::test]
async fn export_rejects_oversized_remote_image() {
    let server = MockServer::start_async().await;
    let _remote = server
        .mock_async(|when, then| {
            when.method(GET).path("/huge.png");
            then.status(200).body(vec![0u8; 4096]);
        })
        .await;

    let config = AppConfig {
        max_upload_bytes: 256,
        ..AppConfig::default()
    };
    let request = json_request("/api/export", json!({ "imageData": server.url("/huge.png"), "format": "png" }));
    let (status, body) = send_json(app_with_config(config), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Image too large");
}

#[tokio::test]
async fn export_gives_up_on_slow_remote_image() {
    let server = MockServer::start_async().await;
    let _remote = server
        .mock_async(|when, then| {
            when.method(GET).path("/slow.png");
            then.status(200).delay(Duration::from_secs(3)).body([1u8, 2, 3]);
        })
        .await;

    let config = AppConfig {
        fetch_timeout: Duration::from_millis(100),
        ..AppConfig::default()
    };
    let request = json_request("/api/export", json!({ "imageData": server.url("/slow.png"), "format": "png" }));
    let (status, body) = send_json(app_with_config(config), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to export image");
}
