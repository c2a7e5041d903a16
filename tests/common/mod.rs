// Scripted in-memory conversion engine shared by the integration tests
//
// The engine records every call it receives and, when given an observer,
// the session status it saw at load and execute time.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use mp4_to_mp3::engine::{ConversionEngine, EngineHandle, ProgressReceiver, INPUT_FILE, OUTPUT_FILE};
use mp4_to_mp3::{SessionSnapshot, Status};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// What the engine does when driven
#[derive(Debug, Clone, Default)]
pub struct EngineScript {
    /// Number of initial load attempts that fail
    pub failing_loads: usize,
    /// Make every execute call fail
    pub fail_execute: bool,
    /// Progress fractions emitted during execute
    pub progress: Vec<f64>,
    /// Bytes execute produces as output.mp3
    pub output: Vec<u8>,
    /// Time a load takes
    pub load_delay: Duration,
    /// Pause after each progress event
    pub progress_delay: Duration,
}

/// Shared record of everything the engines built by one handle did
#[derive(Default)]
pub struct EngineProbe {
    pub instances: AtomicUsize,
    pub loads: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub seen_status: Mutex<Vec<Status>>,
    pub seen_progress: Mutex<Vec<u8>>,
    pub last_input: Mutex<Option<Vec<u8>>>,
    pub observer: Mutex<Option<watch::Receiver<SessionSnapshot>>>,
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seen_status(&self) -> Vec<Status> {
        self.seen_status.lock().unwrap().clone()
    }

    pub fn seen_progress(&self) -> Vec<u8> {
        self.seen_progress.lock().unwrap().clone()
    }

    pub fn last_input(&self) -> Option<Vec<u8>> {
        self.last_input.lock().unwrap().clone()
    }

    pub fn observe(&self, session: watch::Receiver<SessionSnapshot>) {
        *self.observer.lock().unwrap() = Some(session);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn snapshot(&self) -> Option<SessionSnapshot> {
        self.observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| rx.borrow().clone())
    }

    fn note_status(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.seen_status.lock().unwrap().push(snapshot.status);
        }
    }

    fn note_progress(&self) {
        if let Some(snapshot) = self.snapshot() {
            self.seen_progress.lock().unwrap().push(snapshot.progress);
        }
    }
}

pub struct ScriptedEngine {
    script: EngineScript,
    probe: Arc<EngineProbe>,
    files: HashMap<String, Vec<u8>>,
    progress_tx: broadcast::Sender<f64>,
}

#[async_trait::async_trait]
impl ConversionEngine for ScriptedEngine {
    async fn load(&mut self) -> Result<()> {
        let attempt = self.probe.loads.fetch_add(1, Ordering::SeqCst);
        self.probe.record("load");
        self.probe.note_status();

        if !self.script.load_delay.is_zero() {
            tokio::time::sleep(self.script.load_delay).await;
        }

        if attempt < self.script.failing_loads {
            bail!("scripted load failure");
        }
        Ok(())
    }

    fn subscribe_progress(&self) -> ProgressReceiver {
        self.progress_tx.subscribe()
    }

    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.probe.record(format!("write {}", name));
        *self.probe.last_input.lock().unwrap() = Some(bytes.to_vec());
        self.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn execute(&mut self, args: &[String]) -> Result<()> {
        self.probe.record(format!("execute {}", args.join(" ")));
        self.probe.note_status();

        if !self.files.contains_key(INPUT_FILE) {
            bail!("no input written");
        }

        for fraction in &self.script.progress {
            let _ = self.progress_tx.send(*fraction);
            if self.script.progress_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.script.progress_delay).await;
            }
            self.probe.note_progress();
        }

        if self.script.fail_execute {
            bail!("scripted transcode failure");
        }

        self.files
            .insert(OUTPUT_FILE.to_string(), self.script.output.clone());
        Ok(())
    }

    async fn read_output(&mut self, name: &str) -> Result<Vec<u8>> {
        self.probe.record(format!("read {}", name));
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("{} not found", name))
    }

    async fn delete_file(&mut self, name: &str) -> Result<()> {
        self.probe.record(format!("delete {}", name));
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| anyhow!("{} not found", name))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Build an engine handle whose engines follow `script`
pub fn scripted_engine(script: EngineScript) -> (Arc<EngineHandle>, Arc<EngineProbe>) {
    let probe = Arc::new(EngineProbe::default());
    let factory_probe = Arc::clone(&probe);

    let handle = EngineHandle::new(move || {
        factory_probe.instances.fetch_add(1, Ordering::SeqCst);
        let (progress_tx, _) = broadcast::channel(64);
        Box::new(ScriptedEngine {
            script: script.clone(),
            probe: Arc::clone(&factory_probe),
            files: HashMap::new(),
            progress_tx,
        })
    });

    (Arc::new(handle), probe)
}

/// A script that succeeds with steady progress
pub fn happy_script() -> EngineScript {
    EngineScript {
        progress: vec![0.1, 0.25, 0.5, 0.75, 1.0],
        output: b"ID3 fake mp3 bytes".to_vec(),
        ..EngineScript::default()
    }
}
