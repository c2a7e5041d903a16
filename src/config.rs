use crate::engine::FfmpegConfig;
use crate::session::{SessionConfig, DEFAULT_PROCESSING_MESSAGE, DEFAULT_VALIDATION_MESSAGE};
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `MP4_TO_MP3_HTTP__PORT=9000`
pub const ENV_PREFIX: &str = "MP4_TO_MP3";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub http: HttpConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Sessions untouched for this long are closed; 0 keeps them forever
    pub session_idle_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// ffmpeg binary; looked up in `PATH` when unset
    pub ffmpeg_path: Option<String>,
    /// Parent of the engine's working directory; system temp dir when unset
    pub work_dir: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
}

impl Config {
    /// Load defaults, then `path` (any format the `config` crate knows, the
    /// extension may be omitted) if it exists, then environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "mp4-to-mp3")?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 8080)?
            .set_default("http.max_upload_bytes", 2_147_483_648i64)? // 2 GiB
            .set_default("http.session_idle_secs", 3600)?
            .set_default("engine.timeout_secs", 3600)?
            .set_default("session.validation_message", DEFAULT_VALIDATION_MESSAGE)?
            .set_default("session.processing_message", DEFAULT_PROCESSING_MESSAGE)?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl EngineConfig {
    /// Engine settings with `~` expanded in paths
    pub fn ffmpeg_config(&self) -> FfmpegConfig {
        let expand = |path: &String| PathBuf::from(shellexpand::tilde(path).into_owned());

        FfmpegConfig {
            ffmpeg_path: self.ffmpeg_path.as_ref().map(expand),
            work_dir: self.work_dir.as_ref().map(expand),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
