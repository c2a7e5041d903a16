//! Conversion session management
//!
//! This module provides the `ConversionSession` state machine that manages:
//! - File submission and name validation
//! - Engine loading through the shared `EngineHandle`
//! - Transcoding with live progress
//! - The produced output and its release on reset
//!
//! Idle → EngineLoading → Converting → Done | Error, and back to Idle on
//! reset or a fresh submission.

mod config;
mod input;
pub mod naming;
mod session;
mod state;

pub use config::{SessionConfig, DEFAULT_PROCESSING_MESSAGE, DEFAULT_VALIDATION_MESSAGE};
pub use input::{InputFile, InputInfo};
pub use session::{progress_percent, ConversionSession, PendingConversion};
pub use state::{ErrorKind, OutputInfo, SessionBusy, SessionError, SessionSnapshot, Status};
