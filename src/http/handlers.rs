use super::state::AppState;
use crate::session::{ConversionSession, InputFile, SessionSnapshot};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn session_not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

/// `Content-Disposition` with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let encoded: String = file_name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Open a new conversion session
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Arc::new(ConversionSession::new(
        Arc::clone(&state.engine),
        state.session_config.clone(),
    ));
    let snapshot = session.snapshot();

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), session);
    }

    info!("Opened session {}", session_id);

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            session: snapshot,
        }),
    )
}

/// GET /sessions/:session_id
/// Current state of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.session(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.snapshot())).into_response(),
        None => session_not_found(&session_id),
    }
}

/// GET /sessions/:session_id/events
/// Server-sent events: the current state, then one event per change
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(&session_id);
    };

    let updates = session.subscribe();
    let stream = futures::stream::unfold((updates, true), |(mut updates, first)| async move {
        if !first {
            updates.changed().await.ok()?;
        }
        let snapshot = updates.borrow_and_update().clone();
        let event = Event::default()
            .event(snapshot.status.as_str())
            .json_data(&snapshot);
        Some((event, (updates, false)))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// POST /sessions/:session_id/files/:file_name
/// Submit a file (request body) for conversion
///
/// Name validation happens before the response; the conversion itself runs
/// in the background and is followed through `GET /sessions/:id` or the
/// event stream.
pub async fn submit_file(
    State(state): State<AppState>,
    Path((session_id, file_name)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(&session_id);
    };

    info!(
        "Session {} received {} ({} bytes)",
        session_id,
        file_name,
        body.len()
    );

    // Takes over the upload buffer without copying when nothing else holds it
    let bytes = Vec::from(body);

    match session.begin(InputFile::new(file_name, bytes)) {
        Ok(Some(pending)) => {
            let runner = Arc::clone(&session);
            tokio::spawn(async move {
                runner.run(pending).await;
            });
            (StatusCode::ACCEPTED, Json(session.snapshot())).into_response()
        }
        Ok(None) => (StatusCode::UNPROCESSABLE_ENTITY, Json(session.snapshot())).into_response(),
        Err(busy) => error_response(StatusCode::CONFLICT, busy.to_string()),
    }
}

/// GET /sessions/:session_id/download
/// The produced MP3, once the session is done
pub async fn download(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(&session_id);
    };

    match session.download() {
        Some(download) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, download.mime_type.clone()),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition(&download.file_name),
                ),
            ],
            Body::from(download.bytes.to_vec()),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} has no output ({})", session_id, session.status()),
        ),
    }
}

/// POST /sessions/:session_id/reset
/// Release the output and return to idle
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.session(&session_id).await else {
        return session_not_found(&session_id);
    };

    match session.reset() {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(busy) => error_response(StatusCode::CONFLICT, busy.to_string()),
    }
}

/// DELETE /sessions/:session_id
/// Close a session and release its output
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match session {
        Some(session) => {
            // A running conversion keeps its own reference and finishes
            // into a session nobody can reach anymore.
            if let Err(busy) = session.reset() {
                warn!("Closed session {} while {}", session_id, busy.status);
            }
            info!("Closed session {}", session_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(&session_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_pass_through() {
        assert_eq!(
            content_disposition("clip.mp3"),
            "attachment; filename=\"clip.mp3\"; filename*=UTF-8''clip.mp3"
        );
    }

    #[test]
    fn unicode_names_are_percent_encoded() {
        assert_eq!(
            content_disposition("회의.mp3"),
            "attachment; filename=\"__.mp3\"; filename*=UTF-8''%ED%9A%8C%EC%9D%98.mp3"
        );
    }

    #[test]
    fn quotes_cannot_break_the_header() {
        let value = content_disposition("a\"b.mp3");
        assert!(value.starts_with("attachment; filename=\"a_b.mp3\""));
        assert!(value.ends_with("a%22b.mp3"));
    }
}
