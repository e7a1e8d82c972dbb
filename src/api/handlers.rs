//! HTTP request handlers for the notes and users API

use axum::{
    extract::State,
    http::{header::ACCEPT, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::requests::{JsonRequest, NoteBody, UserBody};
use crate::core::error::{Error, Result};
use crate::core::types::{Note, UserView};
use crate::core::AppState;
use crate::services::ChangedFields;

const INDEX_PAGE: &str = include_str!("../../views/index.html");
const NOT_FOUND_PAGE: &str = include_str!("../../views/404.html");

/// `{message}` body used by every non-list response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human readable outcome
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Reply to a partial note update: the message plus every field written
#[derive(Debug, Serialize)]
pub struct FieldsUpdatedResponse {
    /// Always "Fields updated."
    pub message: &'static str,
    /// Fields that were supplied
    #[serde(flatten)]
    pub changed: ChangedFields,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "unavailable"
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

// Note Handlers

/// `GET /notes`
pub async fn list_notes(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Note>>> {
    let notes = state.notes.list().await?;
    if notes.is_empty() {
        return Err(Error::not_found("No notes found."));
    }
    Ok(Json(notes))
}

/// `POST /notes`
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<NoteBody>,
) -> Result<impl IntoResponse> {
    let input = body.into_create()?;
    let created = state.notes.create(input).await?;
    Ok((
        StatusCode::CREATED,
        MessageResponse::new(format!("New note for {} created.", created.username)),
    ))
}

/// `PATCH /notes`
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<NoteBody>,
) -> Result<Json<FieldsUpdatedResponse>> {
    let (id, patch) = body.into_patch()?;
    let changed = state.notes.update(id, patch).await?;
    Ok(Json(FieldsUpdatedResponse {
        message: "Fields updated.",
        changed,
    }))
}

/// `DELETE /notes`
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<NoteBody>,
) -> Result<Json<MessageResponse>> {
    let target = body.into_delete()?;
    let note = state.notes.delete(target.id).await?;
    Ok(MessageResponse::new(format!("Note {} was deleted.", note.title)))
}

// User Handlers

/// `GET /users`
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserView>>> {
    let users = state.users.list().await?;
    if users.is_empty() {
        return Err(Error::not_found("No users found."));
    }
    Ok(Json(users))
}

/// `POST /users`
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<UserBody>,
) -> Result<impl IntoResponse> {
    let input = body.into_create()?;
    let user = state.users.create(input).await?;
    Ok((
        StatusCode::CREATED,
        MessageResponse::new(format!("New user {} created.", user.username)),
    ))
}

/// `PATCH /users`
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<UserBody>,
) -> Result<Json<MessageResponse>> {
    let input = body.into_update()?;
    let user = state.users.update(input).await?;
    Ok(MessageResponse::new(format!("{} updated.", user.username)))
}

/// `DELETE /users`
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    JsonRequest(body): JsonRequest<UserBody>,
) -> Result<Json<MessageResponse>> {
    let target = body.into_delete()?;
    let user = state.users.delete(target.id).await?;
    Ok(MessageResponse::new(format!(
        "Username {} with ID {} deleted.",
        user.username, user.id
    )))
}

// System Handlers

/// `GET /`, `/index` and `/index.html`
pub async fn root_handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// `GET /health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: crate::VERSION,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    version: crate::VERSION,
                }),
            )
        }
    }
}

/// Fallback for every unmatched route, negotiated on `Accept`
pub async fn not_found(headers: HeaderMap) -> Response {
    let accept = headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("*/*");

    match negotiate(accept) {
        NotFoundFormat::Html => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
        NotFoundFormat::Json => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "404 Not Found" })),
        )
            .into_response(),
        NotFoundFormat::Text => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

#[derive(Debug, PartialEq)]
enum NotFoundFormat {
    Html,
    Json,
    Text,
}

/// HTML wins whenever the client takes it, then JSON, then plain text
fn negotiate(accept: &str) -> NotFoundFormat {
    let types: Vec<String> = accept
        .split(',')
        .filter_map(|part| part.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .collect();

    let accepts = |candidates: &[&str]| types.iter().any(|t| candidates.contains(&t.as_str()));

    if accepts(&["text/html", "text/*", "*/*"]) {
        NotFoundFormat::Html
    } else if accepts(&["application/json", "application/*"]) {
        NotFoundFormat::Json
    } else {
        NotFoundFormat::Text
    }
}
