use super::backend::{ConversionEngine, ProgressReceiver};
use super::progress::{ProgressLine, ProgressParser};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Number of ffmpeg log lines kept for error reports
const STDERR_TAIL_LINES: usize = 12;

/// Configuration for the ffmpeg engine
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Explicit ffmpeg binary; looked up in `PATH` when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Parent directory for the working storage; system temp dir when unset
    pub work_dir: Option<PathBuf>,
    /// Upper bound for a single `execute` call
    pub timeout: Duration,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            work_dir: None,
            timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Conversion engine backed by a local ffmpeg binary
///
/// The working storage is a private temporary directory created on load and
/// removed when the engine is dropped. Arguments passed to `execute` refer
/// to files in that directory by bare name.
pub struct FfmpegEngine {
    config: FfmpegConfig,
    binary: Option<PathBuf>,
    workspace: Option<TempDir>,
    progress_tx: broadcast::Sender<f64>,
}

impl FfmpegEngine {
    pub fn new(config: FfmpegConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(64);

        Self {
            config,
            binary: None,
            workspace: None,
            progress_tx,
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        match &self.config.ffmpeg_path {
            Some(path) => which::which(path)
                .with_context(|| format!("ffmpeg binary not usable: {}", path.display())),
            None => which::which("ffmpeg").context("ffmpeg not found in PATH"),
        }
    }

    fn create_workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mp4-to-mp3-");

        match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create work directory {}", dir.display())
                })?;
                builder
                    .tempdir_in(dir)
                    .context("Failed to create engine working directory")
            }
            None => builder
                .tempdir()
                .context("Failed to create engine working directory"),
        }
    }

    fn workspace(&self) -> Result<&Path> {
        self.workspace
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| anyhow!("ffmpeg engine is not loaded"))
    }

    /// Map a working file name to its path, refusing anything but bare names
    fn working_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            bail!("Invalid working file name: {:?}", name);
        }
        Ok(self.workspace()?.join(name))
    }
}

#[async_trait::async_trait]
impl ConversionEngine for FfmpegEngine {
    async fn load(&mut self) -> Result<()> {
        if self.binary.is_some() && self.workspace.is_some() {
            return Ok(());
        }

        let binary = self.resolve_binary()?;
        let output = Command::new(&binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", binary.display()))?;

        if !output.status.success() {
            bail!(
                "{} -version exited with {}",
                binary.display(),
                output.status
            );
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(
            "Using {} ({})",
            binary.display(),
            version.lines().next().unwrap_or("unknown version")
        );

        let workspace = self.create_workspace()?;
        debug!("Engine working directory: {}", workspace.path().display());

        self.binary = Some(binary);
        self.workspace = Some(workspace);
        Ok(())
    }

    fn subscribe_progress(&self) -> ProgressReceiver {
        self.progress_tx.subscribe()
    }

    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.working_path(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    async fn execute(&mut self, args: &[String]) -> Result<()> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| anyhow!("ffmpeg engine is not loaded"))?;
        let workspace = self.workspace()?.to_path_buf();

        info!("Running ffmpeg {}", args.join(" "));

        let mut child = Command::new(&binary)
            .current_dir(&workspace)
            .args(["-hide_banner", "-y", "-nostats", "-progress", "pipe:2"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", binary.display()))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let mut parser = ProgressParser::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let progress_tx = self.progress_tx.clone();

        let run = tokio::time::timeout(self.config.timeout, async {
            loop {
                buf.clear();
                let read = reader
                    .read_until(b'\n', &mut buf)
                    .await
                    .context("Failed to read ffmpeg output")?;
                if read == 0 {
                    break;
                }

                // Metadata tags are echoed in whatever encoding the input used.
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();

                match parser.feed(&line) {
                    ProgressLine::Fraction(fraction) => {
                        // No subscribers is fine.
                        let _ = progress_tx.send(fraction);
                    }
                    ProgressLine::Field => {}
                    ProgressLine::Log => {
                        debug!("ffmpeg: {}", line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }

            child.wait().await.context("Failed to wait for ffmpeg")
        })
        .await;

        let status = match run {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out ffmpeg: {}", e);
                }
                bail!("ffmpeg timed out after {:?}", self.config.timeout);
            }
        };

        if !status.success() {
            bail!(
                "ffmpeg exited with {}: {}",
                status,
                tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
            );
        }

        Ok(())
    }

    async fn read_output(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.working_path(name)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn delete_file(&mut self, name: &str) -> Result<()> {
        let path = self.working_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_without_binary(dir: &TempDir) -> FfmpegEngine {
        let mut engine = FfmpegEngine::new(FfmpegConfig {
            work_dir: Some(dir.path().to_path_buf()),
            ..FfmpegConfig::default()
        });
        engine.workspace = Some(engine.create_workspace().unwrap());
        engine
    }

    #[tokio::test]
    async fn working_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = loaded_without_binary(&dir);

        engine.write_input("input.mp4", b"not really mp4").await.unwrap();
        assert_eq!(engine.read_output("input.mp4").await.unwrap(), b"not really mp4");

        engine.delete_file("input.mp4").await.unwrap();
        assert!(engine.read_output("input.mp4").await.is_err());
    }

    #[tokio::test]
    async fn rejects_paths_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = loaded_without_binary(&dir);

        assert!(engine.write_input("../escape.mp4", b"x").await.is_err());
        assert!(engine.read_output("/etc/passwd").await.is_err());
        assert!(engine.delete_file("..").await.is_err());
    }

    #[tokio::test]
    async fn unloaded_engine_refuses_work() {
        let mut engine = FfmpegEngine::new(FfmpegConfig::default());

        assert!(engine.write_input("input.mp4", b"x").await.is_err());
        assert!(engine.execute(&["-version".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn missing_binary_fails_to_load() {
        let mut engine = FfmpegEngine::new(FfmpegConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg-xyz-12345")),
            ..FfmpegConfig::default()
        });

        assert!(engine.load().await.is_err());
        assert!(engine.workspace.is_none());
    }
}
