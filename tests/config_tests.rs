// Integration tests for configuration loading

use anyhow::Result;
use mp4_to_mp3::session::{DEFAULT_PROCESSING_MESSAGE, DEFAULT_VALIDATION_MESSAGE};
use mp4_to_mp3::Config;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults_without_config_file() -> Result<()> {
    let cfg = Config::load("/nonexistent/mp4-to-mp3")?;

    assert_eq!(cfg.service.name, "mp4-to-mp3");
    assert_eq!(cfg.http.port, 8080);
    assert_eq!(cfg.http.max_upload_bytes, 2 * 1024 * 1024 * 1024);
    assert_eq!(cfg.http.session_idle_secs, 3600);
    assert_eq!(cfg.engine.timeout_secs, 3600);
    assert!(cfg.engine.ffmpeg_path.is_none());
    assert_eq!(cfg.session.validation_message, DEFAULT_VALIDATION_MESSAGE);
    assert_eq!(cfg.session.processing_message, DEFAULT_PROCESSING_MESSAGE);

    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[http]
port = 9100

[engine]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
timeout_secs = 60

[session]
validation_message = "Only MP4 files are supported."
"#
    )?;

    let path = file.path().to_string_lossy().into_owned();
    let cfg = Config::load(&path)?;

    assert_eq!(cfg.http.port, 9100);
    assert_eq!(cfg.http.bind, "127.0.0.1");
    assert_eq!(cfg.session.validation_message, "Only MP4 files are supported.");
    assert_eq!(cfg.session.processing_message, DEFAULT_PROCESSING_MESSAGE);

    let engine = cfg.engine.ffmpeg_config();
    assert_eq!(
        engine.ffmpeg_path.as_deref(),
        Some(std::path::Path::new("/opt/ffmpeg/bin/ffmpeg"))
    );
    assert_eq!(engine.timeout, Duration::from_secs(60));

    Ok(())
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/mp4-to-mp3");
    let cfg = Config::load(path)?;

    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.session.validation_message, DEFAULT_VALIDATION_MESSAGE);

    Ok(())
}
