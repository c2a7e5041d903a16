use crate::engine::EngineHandle;
use crate::session::{ConversionSession, SessionConfig};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default request body limit for uploads: 2 GiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Open conversion sessions (session_id → session)
    ///
    /// A session holds its output bytes until it is deleted or closed by
    /// the idle sweep.
    pub sessions: Arc<RwLock<HashMap<String, Arc<ConversionSession>>>>,

    /// Engine shared by every session
    pub engine: Arc<EngineHandle>,

    /// Settings for newly created sessions
    pub session_config: SessionConfig,

    /// Upper bound for an uploaded file
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<EngineHandle>, session_config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            engine,
            session_config,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Look up an open session
    pub async fn session(&self, session_id: &str) -> Option<Arc<ConversionSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Close sessions untouched for longer than `max_idle`
    ///
    /// Sessions with a conversion in flight are kept. Returns how many were
    /// closed.
    pub async fn close_idle_sessions(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|session_id, session| {
            let snapshot = session.snapshot();
            let expired = (now - snapshot.updated_at)
                .to_std()
                .map(|idle| idle > max_idle)
                .unwrap_or(false);

            if expired && !snapshot.status.is_busy() {
                debug!("Closing idle session {} ({})", session_id, snapshot.status);
                return false;
            }
            true
        });

        before - sessions.len()
    }

    /// Periodically close sessions idle for longer than `max_idle`
    pub fn spawn_idle_sweeper(&self, max_idle: Duration) -> JoinHandle<()> {
        let state = self.clone();
        let period = max_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let closed = state.close_idle_sessions(max_idle).await;
                if closed > 0 {
                    info!("Closed {} idle sessions", closed);
                }
            }
        })
    }
}
