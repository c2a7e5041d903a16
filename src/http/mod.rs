//! HTTP API for driving conversion sessions
//!
//! This module provides a REST API equivalent of the drop zone and download link:
//! - POST /sessions - Open a session
//! - GET /sessions/:id - Query session state
//! - GET /sessions/:id/events - Follow session state (server-sent events)
//! - POST /sessions/:id/files/:file_name - Submit a file (raw request body)
//! - GET /sessions/:id/download - Download the produced MP3
//! - POST /sessions/:id/reset - Release the output and return to idle
//! - DELETE /sessions/:id - Close a session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::content_disposition;
pub use routes::create_router;
pub use state::{AppState, DEFAULT_MAX_UPLOAD_BYTES};
