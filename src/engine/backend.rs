use anyhow::Result;
use tokio::sync::broadcast;

/// Receiver for fractional progress reported while a transcode runs
///
/// Values are nominally in [0, 1] but engines may report values outside
/// that range; consumers decide how to clamp them.
pub type ProgressReceiver = broadcast::Receiver<f64>;

/// External conversion engine
///
/// The engine owns a small working storage addressed by file name. A
/// conversion writes its input there, executes a fixed argument list that
/// reads and writes those names, then reads the result back out.
///
/// Implementations:
/// - `FfmpegEngine`: drives a locally installed ffmpeg binary
/// - test doubles: scripted in-memory engines
#[async_trait::async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Prepare the engine for use
    ///
    /// Must be idempotent: loading an already loaded engine is a no-op.
    async fn load(&mut self) -> Result<()>;

    /// Subscribe to progress events emitted by subsequent `execute` calls
    fn subscribe_progress(&self) -> ProgressReceiver;

    /// Store `bytes` in the working storage under `name`
    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Run the engine with the given argument list
    async fn execute(&mut self, args: &[String]) -> Result<()>;

    /// Read a file produced by `execute`
    async fn read_output(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Remove a file from the working storage
    async fn delete_file(&mut self, name: &str) -> Result<()>;

    /// Get engine name for logging
    fn name(&self) -> &str;
}

/// Builds a fresh, unloaded engine
pub type EngineFactory = Box<dyn Fn() -> Box<dyn ConversionEngine> + Send + Sync>;
