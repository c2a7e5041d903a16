use super::input::InputInfo;
use super::naming;
use crate::output::{AudioSummary, OutputHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in its conversion lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    EngineLoading,
    Converting,
    Done,
    Error,
}

impl Status {
    /// A conversion is in flight; submissions and resets are refused
    pub fn is_busy(self) -> bool {
        matches!(self, Status::EngineLoading | Status::Converting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::EngineLoading => "engine_loading",
            Status::Converting => "converting",
            Status::Done => "done",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of failure a user can see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The file name does not carry the accepted extension
    Validation,
    /// Engine load or transcode failed
    Processing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// The produced file, present only when the session is done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputInfo {
    pub handle: OutputHandle,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub summary: Option<AudioSummary>,
}

/// Everything a presentation layer needs to render the current view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: Status,

    /// Input of the current or last attempt
    pub input: Option<InputInfo>,

    /// Integer percentage in [0, 100]
    pub progress: u8,

    pub error: Option<SessionError>,

    pub output: Option<OutputInfo>,

    /// When the snapshot last changed
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            input: None,
            progress: 0,
            error: None,
            output: None,
            updated_at: Utc::now(),
        }
    }
}

impl SessionSnapshot {
    /// Name the output is (or would be) saved under
    pub fn output_name(&self) -> String {
        naming::output_name(self.input.as_ref().map(|input| input.name.as_str()))
    }

    /// All transient fields hold their initial values
    pub fn is_initial(&self) -> bool {
        self.status == Status::Idle
            && self.input.is_none()
            && self.progress == 0
            && self.error.is_none()
            && self.output.is_none()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A submission or reset arrived while a conversion was in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBusy {
    pub status: Status,
}

impl fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session is busy ({})", self.status)
    }
}

impl std::error::Error for SessionBusy {}
