pub mod config;
pub mod engine;
pub mod http;
pub mod output;
pub mod session;

pub use config::Config;
pub use engine::{ConversionEngine, EngineHandle, FfmpegConfig, FfmpegEngine};
pub use http::{create_router, AppState};
pub use output::{AudioSummary, Download, OutputHandle, OutputStore};
pub use session::{
    ConversionSession, ErrorKind, InputFile, SessionBusy, SessionConfig, SessionSnapshot, Status,
};
