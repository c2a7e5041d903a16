use super::backend::{ConversionEngine, EngineFactory};
use super::ffmpeg::{FfmpegConfig, FfmpegEngine};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::info;

/// Exclusive access to the loaded engine for the duration of one conversion
pub type EngineLease<'a> = MutexGuard<'a, Box<dyn ConversionEngine>>;

/// Lazily loaded engine shared by every session
///
/// The engine is built and loaded on first use. Concurrent first uses wait
/// on the same load instead of starting another one. A failed load leaves
/// the handle empty so the next request tries again.
///
/// The engine works on fixed file names, so conversions take turns through
/// [`EngineHandle::acquire`].
pub struct EngineHandle {
    factory: EngineFactory,
    engine: OnceCell<Mutex<Box<dyn ConversionEngine>>>,
    load_attempts: AtomicUsize,
}

impl EngineHandle {
    /// Create a handle that builds its engine with `factory` on first use
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn ConversionEngine> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            engine: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Create a handle backed by a local ffmpeg binary
    pub fn ffmpeg(config: FfmpegConfig) -> Self {
        Self::new(move || Box::new(FfmpegEngine::new(config.clone())))
    }

    /// Get the loaded engine, loading it first if needed
    pub async fn acquire(&self) -> Result<EngineLease<'_>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let mut engine = (self.factory)();
                let name = engine.name().to_string();

                info!("Loading conversion engine: {} (attempt {})", name, attempt);
                engine
                    .load()
                    .await
                    .with_context(|| format!("Failed to load {} engine", name))?;
                info!("Conversion engine loaded: {}", name);

                Ok::<_, anyhow::Error>(Mutex::new(engine))
            })
            .await?;

        Ok(engine.lock().await)
    }

    /// Whether an engine has been loaded successfully
    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    /// Number of load attempts so far, failed ones included
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }
}
