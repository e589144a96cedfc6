use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PreferenceSummary, RoomDetails, RoomType};
use crate::services::{
    preferences::select_sample,
    recommendation::{generate_recommendation, validate_room_image},
    session::{QuizSession, RecommendationOutcome, SessionStage},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Serialize)]
pub struct StyleResponse {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub image_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub index: usize,
    pub style: String,
    pub description: String,
    pub image_url: String,
    pub voted: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stage: &'static str,
    pub samples: Vec<SampleResponse>,
    pub votes_cast: usize,
    pub next_sample: Option<usize>,
    pub summary: Option<PreferenceSummary>,
    pub room: Option<RoomDetails>,
    pub result: Option<RecommendationOutcome>,
}

impl From<&QuizSession> for SessionResponse {
    fn from(session: &QuizSession) -> Self {
        let samples = session
            .samples()
            .iter()
            .enumerate()
            .map(|(index, sample)| SampleResponse {
                index,
                style: sample.style.name.clone(),
                description: sample.style.description.clone(),
                image_url: sample.image.url(),
                voted: session.is_voted(index),
            })
            .collect();

        let (room, result) = match session.stage() {
            SessionStage::DisplayingResults { room, outcome, .. } => {
                (Some(room.clone()), Some(outcome.clone()))
            }
            _ => (None, None),
        };

        Self {
            id: session.id,
            created_at: session.created_at,
            stage: session.stage().name(),
            samples,
            votes_cast: session.votes().len(),
            next_sample: session.next_unvoted(),
            summary: session.summary().cloned(),
            room,
            result,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub index: usize,
    pub liked: bool,
}

/// Fields of the room upload form
struct RoomUpload {
    image: Vec<u8>,
    room: RoomDetails,
}

async fn read_room_upload(mut multipart: Multipart) -> AppResult<RoomUpload> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::InvalidInput(format!("Malformed upload: {}", e))
    };

    let mut image = None;
    let mut room = RoomDetails::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => image = Some(field.bytes().await.map_err(invalid)?.to_vec()),
            Some("room_type") => {
                let text = field.text().await.map_err(invalid)?;
                if !text.trim().is_empty() {
                    room.room_type = text.parse::<RoomType>().map_err(AppError::InvalidInput)?;
                }
            }
            Some("dimensions") => {
                let text = field.text().await.map_err(invalid)?;
                let text = text.trim();
                room.dimensions = (!text.is_empty()).then(|| text.to_string());
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown upload field");
            }
        }
    }

    let image =
        image.ok_or_else(|| AppError::InvalidInput("The upload has no 'image' field".to_string()))?;
    Ok(RoomUpload { image, room })
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {} not found", id))
}

// Handlers

/// Single-page UI
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Catalog styles with their cached image counts
pub async fn list_styles(State(state): State<AppState>) -> AppResult<Json<Vec<StyleResponse>>> {
    let images = state.store.scan(&state.catalog).await?;
    let styles = state
        .catalog
        .list_styles()
        .iter()
        .map(|style| StyleResponse {
            name: style.name.clone(),
            description: style.description.clone(),
            keywords: style.keywords.clone(),
            image_count: images.count(&style.name),
        })
        .collect();
    Ok(Json(styles))
}

/// Start a new quiz with a fresh random sample
pub async fn create_session(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let images = state.store.scan(&state.catalog).await?;
    let samples = {
        let mut rng = rand::thread_rng();
        select_sample(&state.catalog, &images, state.settings.sample_size, &mut rng)
    };
    let session = QuizSession::new(samples)?;
    let response = SessionResponse::from(&session);

    tracing::info!(session_id = %session.id, samples = session.samples().len(), "Session created");

    let mut inner = state.inner.write().await;
    inner.sessions.insert(session.id, session);

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let inner = state.inner.read().await;
    let session = inner.sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    Ok(Json(SessionResponse::from(session)))
}

/// Record a like or dislike for one sample
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VoteRequest>,
) -> AppResult<Json<SessionResponse>> {
    let mut inner = state.inner.write().await;
    let session = inner
        .sessions
        .get_mut(&id)
        .ok_or_else(|| session_not_found(id))?;
    session.record_vote(request.index, request.liked)?;
    Ok(Json(SessionResponse::from(&*session)))
}

/// Accept the room photo and produce recommendations
///
/// The session is claimed for generation under the write lock, so a second
/// upload gets a conflict instead of a second model call. The model call
/// itself runs without the lock, on its own task so a dropped connection
/// still records the result. A service failure is stored as the session's
/// result rather than returned as an HTTP error.
pub async fn upload_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<SessionResponse>> {
    let upload = read_room_upload(multipart).await?;
    let room_image = validate_room_image(upload.image, state.settings.max_upload_bytes)?;
    let room = upload.room;

    let request = {
        let mut inner = state.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| session_not_found(id))?;
        session.begin_recommendation(room_image, room.clone())?
    };

    tracing::info!(session_id = %id, room_type = %room.room_type, "Room accepted");

    let task = tokio::spawn(async move {
        let result = generate_recommendation(state.model.as_ref(), &state.store, &request).await;
        if let Err(e) = &result {
            tracing::error!(session_id = %id, error = %e, kind = e.kind(), "Recommendation failed");
        }

        let mut inner = state.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| session_not_found(id))?;
        session.complete(room, RecommendationOutcome::from(result))?;
        let response = SessionResponse::from(&*session);
        Ok::<_, AppError>(response)
    });

    let response = task
        .await
        .map_err(|e| AppError::Internal(format!("Recommendation task failed: {}", e)))??;
    Ok(Json(response))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut inner = state.inner.write().await;
    inner
        .sessions
        .remove(&id)
        .ok_or_else(|| session_not_found(id))?;
    tracing::info!(session_id = %id, "Session discarded");
    Ok(StatusCode::NO_CONTENT)
}
