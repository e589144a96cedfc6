use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};
use tempfile::TempDir;

use abode::api::{create_router, AppState, SessionSettings};
use abode::error::{AppError, AppResult};
use abode::models::StyleDefinition;
use abode::services::catalog::StyleCatalog;
use abode::services::image_store::{Attribution, ImageStore};
use abode::services::providers::{ChatRequest, ContentPart, VisionModel};

const STRUCTURED_REPLY: &str = "STYLE ANALYSIS:\nYou like calm natural materials.\n\n\
ROOM ANALYSIS:\nA bright room with one large window.\n\n\
RECOMMENDATIONS:\n1. Low oak platform bed\n2. Linen curtains";

/// Model stand-in that replays a canned answer and records requests
struct FakeModel {
    reply: Result<String, String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeModel {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl VisionModel for FakeModel {
    async fn complete(&self, request: ChatRequest) -> AppResult<String> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone().map_err(AppError::AiService)
    }

    fn name(&self) -> String {
        "fake".to_string()
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
    let mut out = Cursor::new(Vec::new());
    buffer.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn catalog() -> StyleCatalog {
    StyleCatalog::new(vec![
        StyleDefinition::new("Japanese Zen", "Calm and natural", &["tatami", "shoji"]),
        StyleDefinition::new("Industrial Loft", "Brick and steel", &["exposed brick"]),
        StyleDefinition::new("Coastal", "Light and airy", &["driftwood"]),
        StyleDefinition::new("Art Deco", "Bold geometry", &["brass"]),
    ])
    .unwrap()
}

/// Store with two images for every style except "Art Deco"
async fn seeded_store(dir: &TempDir, catalog: &StyleCatalog) -> ImageStore {
    let store = ImageStore::new(dir.path());
    let attribution = Attribution {
        photographer: "Ann".into(),
        source: "Pexels".into(),
        source_id: 1,
        page_url: None,
        width: 8,
        height: 8,
    };
    for style in catalog.list_styles().iter().filter(|s| s.name != "Art Deco") {
        for id in 1..=2 {
            store
                .save_image(style, &format!("k_{}.png", id), &png_bytes(8, 8), &attribution)
                .await
                .unwrap();
        }
    }
    store
}

async fn create_test_server(model: Arc<FakeModel>) -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog();
    let store = seeded_store(&dir, &catalog).await;
    let settings = SessionSettings {
        sample_size: 5,
        max_upload_bytes: 1024 * 1024,
    };
    let state = AppState::new(catalog, store, model, settings);
    let server = TestServer::new(create_router(state)).unwrap();
    (server, dir)
}

fn room_form() -> MultipartForm {
    MultipartForm::new()
        .add_text("room_type", "bedroom")
        .add_text("dimensions", "4m x 5m")
        .add_part(
            "image",
            Part::bytes(png_bytes(16, 16))
                .file_name("room.png")
                .mime_type("image/png"),
        )
}

/// Creates a session and votes on every sample, liking only the first
async fn finished_quiz(server: &TestServer) -> Value {
    let response = server.post("/api/v1/sessions").await;
    response.assert_status(StatusCode::CREATED);
    let session: Value = response.json();
    let id = session["id"].as_str().unwrap().to_string();
    let count = session["samples"].as_array().unwrap().len();

    let mut latest = session;
    for index in 0..count {
        let response = server
            .post(&format!("/api/v1/sessions/{}/votes", id))
            .json(&json!({ "index": index, "liked": index == 0 }))
            .await;
        response.assert_status_ok();
        latest = response.json();
    }
    latest
}

#[tokio::test]
async fn test_health_check() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_index_page() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;
    let response = server.get("/").await;
    response.assert_status_ok();
    let page = response.text();
    assert!(page.contains("<title>Abode</title>"));
    // Style names may come from the model, so nothing is rendered as markup
    assert!(!page.contains("innerHTML"));
}

#[tokio::test]
async fn test_list_styles_with_image_counts() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;
    let response = server.get("/api/v1/styles").await;
    response.assert_status_ok();

    let styles: Vec<Value> = response.json();
    assert_eq!(styles.len(), 4);
    assert_eq!(styles[0]["name"], "Japanese Zen");
    assert_eq!(styles[0]["image_count"], 2);
    assert_eq!(styles[3]["name"], "Art Deco");
    assert_eq!(styles[3]["image_count"], 0);
}

#[tokio::test]
async fn test_new_session_samples_styles_with_images() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;
    let response = server.post("/api/v1/sessions").await;
    response.assert_status(StatusCode::CREATED);

    let session: Value = response.json();
    assert_eq!(session["stage"], "showing_style_samples");
    assert_eq!(session["next_sample"], 0);

    let samples = session["samples"].as_array().unwrap();
    // Art Deco has no cached images
    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|s| s["style"] != "Art Deco"));

    let image_url = samples[0]["image_url"].as_str().unwrap();
    assert!(image_url.starts_with("/images/"));
    server.get(image_url).await.assert_status_ok();
}

#[tokio::test]
async fn test_full_session_flow() {
    let model = FakeModel::replying(STRUCTURED_REPLY);
    let (server, _dir) = create_test_server(model.clone()).await;

    let session = finished_quiz(&server).await;
    assert_eq!(session["stage"], "collecting_uploaded_room");
    assert_eq!(session["summary"]["basis"], "liked");
    let top = session["samples"][0]["style"].clone();
    assert_eq!(session["summary"]["ranked"][0]["style_name"], top);

    let id = session["id"].as_str().unwrap();
    let response = server
        .post(&format!("/api/v1/sessions/{}/room", id))
        .multipart(room_form())
        .await;
    response.assert_status_ok();

    let session: Value = response.json();
    assert_eq!(session["stage"], "displaying_results");
    assert_eq!(session["room"]["room_type"], "bedroom");
    assert_eq!(session["room"]["dimensions"], "4m x 5m");
    assert_eq!(session["result"]["status"], "completed");

    let recommendation = &session["result"]["recommendation"];
    assert_eq!(recommendation["format"], "structured");
    assert_eq!(recommendation["style_analysis"], "You like calm natural materials.");
    assert!(recommendation["recommendations"]
        .as_str()
        .unwrap()
        .contains("Linen curtains"));

    // Room photo, the one liked sample and the two disliked ones
    let requests = model.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let images: usize = requests[0].messages.iter().map(|m| m.image_count()).sum();
    assert_eq!(images, 4);
    let labels: Vec<&str> = requests[0].messages[1]
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text(text) if text.starts_with("ROOM IMAGES") => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["ROOM IMAGES I LIKED:", "ROOM IMAGES I DISLIKED:"]);
}

#[tokio::test]
async fn test_unstructured_reply_is_kept_raw() {
    let reply = "Paint the walls sage green and add a jute rug.";
    let (server, _dir) = create_test_server(FakeModel::replying(reply)).await;

    let session = finished_quiz(&server).await;
    let id = session["id"].as_str().unwrap();
    let response = server
        .post(&format!("/api/v1/sessions/{}/room", id))
        .multipart(room_form())
        .await;
    response.assert_status_ok();

    let session: Value = response.json();
    let recommendation = &session["result"]["recommendation"];
    assert_eq!(recommendation["format"], "raw");
    assert_eq!(recommendation["text"], reply);
}

#[tokio::test]
async fn test_model_failure_is_shown_as_result() {
    let (server, _dir) = create_test_server(FakeModel::failing("You exceeded your current quota")).await;

    let session = finished_quiz(&server).await;
    let id = session["id"].as_str().unwrap();
    let response = server
        .post(&format!("/api/v1/sessions/{}/room", id))
        .multipart(room_form())
        .await;
    response.assert_status_ok();

    let session: Value = response.json();
    assert_eq!(session["stage"], "displaying_results");
    assert_eq!(session["result"]["status"], "failed");
    assert_eq!(session["result"]["kind"], "ai_service");
    assert!(session["result"]["message"]
        .as_str()
        .unwrap()
        .contains("exceeded your current quota"));
}

#[tokio::test]
async fn test_out_of_order_operations() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;

    let session: Value = server.post("/api/v1/sessions").await.json();
    let id = session["id"].as_str().unwrap();

    // Room upload before the quiz is done
    let response = server
        .post(&format!("/api/v1/sessions/{}/room", id))
        .multipart(room_form())
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["kind"], "invalid_state");

    let votes = format!("/api/v1/sessions/{}/votes", id);
    server
        .post(&votes)
        .json(&json!({ "index": 0, "liked": true }))
        .await
        .assert_status_ok();
    server
        .post(&votes)
        .json(&json!({ "index": 0, "liked": false }))
        .await
        .assert_status(StatusCode::CONFLICT);
    server
        .post(&votes)
        .json(&json!({ "index": 99, "liked": true }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_upload_rejected() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;

    let session = finished_quiz(&server).await;
    let path = format!("/api/v1/sessions/{}/room", session["id"].as_str().unwrap());
    server.post(&path).multipart(room_form()).await.assert_status_ok();
    server
        .post(&path)
        .multipart(room_form())
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_concurrent_uploads_call_the_model_once() {
    let model = FakeModel::replying(STRUCTURED_REPLY);
    let (server, _dir) = create_test_server(model.clone()).await;

    let session = finished_quiz(&server).await;
    let path = format!("/api/v1/sessions/{}/room", session["id"].as_str().unwrap());
    let (first, second) = tokio::join!(
        async { server.post(&path).multipart(room_form()).await },
        async { server.post(&path).multipart(room_form()).await },
    );

    let mut statuses = vec![first.status_code(), second.status_code()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(model.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_room_upload() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;

    let session = finished_quiz(&server).await;
    let path = format!("/api/v1/sessions/{}/room", session["id"].as_str().unwrap());

    let not_an_image = MultipartForm::new().add_part(
        "image",
        Part::bytes(b"plain text".to_vec()).file_name("room.txt"),
    );
    let response = server.post(&path).multipart(not_an_image).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let missing_image = MultipartForm::new().add_text("room_type", "kitchen");
    server
        .post(&path)
        .multipart(missing_image)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Still waiting for a valid room
    let session: Value = server
        .get(&format!("/api/v1/sessions/{}", session["id"].as_str().unwrap()))
        .await
        .json();
    assert_eq!(session["stage"], "collecting_uploaded_room");
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;

    let response = server
        .get("/api/v1/sessions/00000000-0000-4000-8000-000000000000")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["kind"], "not_found");

    let session: Value = server.post("/api/v1/sessions").await.json();
    let path = format!("/api/v1/sessions/{}", session["id"].as_str().unwrap());
    server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
    server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _dir) = create_test_server(FakeModel::replying(STRUCTURED_REPLY)).await;
    let request_id = "7b0a2f4e-5c1d-4e8a-9f3b-2d6c8e1a4b5f";

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static(request_id),
        )
        .await;
    assert_eq!(response.header("x-request-id"), request_id);

    let response = server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}
