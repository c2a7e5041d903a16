use super::config::SessionConfig;
use super::input::InputFile;
use super::naming;
use super::state::{
    ErrorKind, OutputInfo, SessionBusy, SessionError, SessionSnapshot, Status,
};
use crate::engine::{transcode_args, ConversionEngine, EngineHandle, INPUT_FILE, OUTPUT_FILE};
use crate::output::{AudioSummary, Download, OutputStore, OUTPUT_MIME_TYPE};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Convert a reported progress fraction into a rendered percentage
///
/// Only the upper bound is applied to the fraction itself; the saturating
/// cast to `u8` maps anything below zero to 0.
pub fn progress_percent(fraction: f64) -> u8 {
    (fraction.min(1.0) * 100.0).round() as u8
}

/// An accepted submission waiting to be converted
///
/// Produced by [`ConversionSession::begin`]; the session is in
/// `EngineLoading` until [`ConversionSession::run`] consumes it.
#[derive(Debug)]
pub struct PendingConversion {
    file: InputFile,
}

impl PendingConversion {
    pub fn file_name(&self) -> &str {
        &self.file.name
    }
}

/// One user's upload → convert → download cycle
///
/// State lives in a watch channel so any number of views can follow it.
/// The engine is shared with other sessions; produced bytes live in this
/// session's [`OutputStore`] and at most one handle is live at a time.
pub struct ConversionSession {
    config: SessionConfig,
    engine: Arc<EngineHandle>,
    outputs: OutputStore,
    state: watch::Sender<SessionSnapshot>,
}

impl ConversionSession {
    pub fn new(engine: Arc<EngineHandle>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            config,
            engine,
            outputs: OutputStore::new(),
            state,
        }
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> Status {
        self.state.borrow().status
    }

    /// Follow state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn output_store(&self) -> &OutputStore {
        &self.outputs
    }

    /// Submit a file and run the conversion to completion
    ///
    /// Returns the final snapshot (`Done` or `Error`).
    pub async fn submit(&self, file: InputFile) -> Result<SessionSnapshot, SessionBusy> {
        match self.begin(file)? {
            Some(pending) => Ok(self.run(pending).await),
            None => Ok(self.snapshot()),
        }
    }

    /// Synchronous part of a submission
    ///
    /// Releases the previous output, records the file name and validates
    /// it. Returns `Ok(None)` when the name was rejected (the session is now
    /// in `Error`), or the pending conversion when it was accepted (the
    /// session is now in `EngineLoading`).
    pub fn begin(&self, file: InputFile) -> Result<Option<PendingConversion>, SessionBusy> {
        let accepted = naming::is_supported(&file.name);
        let mut busy = None;

        self.state.send_if_modified(|snapshot| {
            if snapshot.status.is_busy() {
                busy = Some(snapshot.status);
                return false;
            }

            self.release_output(snapshot);
            snapshot.progress = 0;
            snapshot.error = None;
            snapshot.input = Some(file.info());

            if accepted {
                snapshot.status = Status::EngineLoading;
            } else {
                snapshot.status = Status::Error;
                snapshot.error = Some(SessionError {
                    kind: ErrorKind::Validation,
                    message: self.config.validation_message.clone(),
                });
            }

            snapshot.touch();
            true
        });

        if let Some(status) = busy {
            warn!("Ignoring submission of {}: session is {}", file.name, status);
            return Err(SessionBusy { status });
        }

        if !accepted {
            warn!("Rejected unsupported file: {:?}", file.name);
            return Ok(None);
        }

        info!("Accepted {} ({} bytes)", file.name, file.bytes.len());
        Ok(Some(PendingConversion { file }))
    }

    /// Asynchronous part of a submission: load the engine and convert
    pub async fn run(&self, pending: PendingConversion) -> SessionSnapshot {
        let name = pending.file.name.clone();

        match self.convert(pending.file).await {
            Ok(output) => {
                info!(
                    "Converted {} -> {} ({} bytes)",
                    name, output.file_name, output.size_bytes
                );
                self.update(|snapshot| {
                    snapshot.status = Status::Done;
                    snapshot.output = Some(output);
                });
            }
            Err(e) => {
                error!("Conversion of {} failed: {:#}", name, e);
                self.update(|snapshot| {
                    snapshot.status = Status::Error;
                    snapshot.error = Some(SessionError {
                        kind: ErrorKind::Processing,
                        message: self.config.processing_message.clone(),
                    });
                });
            }
        }

        self.snapshot()
    }

    /// Return to `Idle`, releasing the output
    pub fn reset(&self) -> Result<SessionSnapshot, SessionBusy> {
        let mut busy = None;

        self.state.send_if_modified(|snapshot| {
            if snapshot.status.is_busy() {
                busy = Some(snapshot.status);
                return false;
            }

            self.release_output(snapshot);
            *snapshot = SessionSnapshot::default();
            true
        });

        match busy {
            Some(status) => {
                warn!("Ignoring reset: session is {}", status);
                Err(SessionBusy { status })
            }
            None => {
                debug!("Session reset");
                Ok(self.snapshot())
            }
        }
    }

    /// The produced file, when the session is done
    pub fn download(&self) -> Option<Download> {
        let snapshot = self.state.borrow();
        if snapshot.status != Status::Done {
            return None;
        }

        let output = snapshot.output.as_ref()?;
        let blob = self.outputs.resolve(&output.handle)?;

        Some(Download {
            file_name: output.file_name.clone(),
            mime_type: blob.mime_type,
            bytes: blob.bytes,
        })
    }

    async fn convert(&self, file: InputFile) -> Result<OutputInfo> {
        let output_name = naming::output_name(Some(&file.name));

        let mut engine = self
            .engine
            .acquire()
            .await
            .context("Conversion engine unavailable")?;

        self.update(|snapshot| {
            snapshot.status = Status::Converting;
            snapshot.progress = 0;
        });

        let result = self.transcode(&mut **engine, file).await;
        Self::clean_up(&mut **engine).await;
        drop(engine);

        let bytes = result?;
        let size_bytes = bytes.len() as u64;

        let summary = match AudioSummary::probe(&bytes, naming::TARGET_EXTENSION) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Could not probe {}: {:#}", output_name, e);
                None
            }
        };

        let handle = self.outputs.create(bytes, OUTPUT_MIME_TYPE);

        Ok(OutputInfo {
            handle,
            file_name: output_name,
            mime_type: OUTPUT_MIME_TYPE.to_string(),
            size_bytes,
            summary,
        })
    }

    async fn transcode(&self, engine: &mut dyn ConversionEngine, file: InputFile) -> Result<Vec<u8>> {
        engine
            .write_input(INPUT_FILE, &file.bytes)
            .await
            .context("Failed to write engine input")?;
        drop(file);

        let args = transcode_args();
        let mut progress = engine.subscribe_progress();
        let mut subscribed = true;

        let outcome = {
            let execution = engine.execute(&args);
            tokio::pin!(execution);

            loop {
                tokio::select! {
                    result = &mut execution => break result,
                    event = progress.recv(), if subscribed => match event {
                        Ok(fraction) => self.apply_progress(fraction),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Skipped {} progress events", skipped);
                        }
                        Err(RecvError::Closed) => subscribed = false,
                    },
                }
            }
        };

        // Events sent just before the transcode finished.
        while let Ok(fraction) = progress.try_recv() {
            self.apply_progress(fraction);
        }
        drop(progress);

        outcome.context("Transcode failed")?;

        engine
            .read_output(OUTPUT_FILE)
            .await
            .context("Failed to read engine output")
    }

    /// Best-effort removal of the engine's working files
    async fn clean_up(engine: &mut dyn ConversionEngine) {
        for name in [INPUT_FILE, OUTPUT_FILE] {
            if let Err(e) = engine.delete_file(name).await {
                debug!("Could not delete working file {}: {:#}", name, e);
            }
        }
    }

    fn apply_progress(&self, fraction: f64) {
        if fraction.is_nan() {
            debug!("Ignoring NaN progress");
            return;
        }

        let percent = progress_percent(fraction);
        self.state.send_if_modified(|snapshot| {
            if snapshot.status != Status::Converting || snapshot.progress == percent {
                return false;
            }
            snapshot.progress = percent;
            snapshot.touch();
            true
        });
    }

    fn release_output(&self, snapshot: &mut SessionSnapshot) {
        if let Some(output) = snapshot.output.take() {
            self.outputs.revoke(&output.handle);
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        self.state.send_modify(|snapshot| {
            apply(snapshot);
            snapshot.touch();
        });
    }
}
