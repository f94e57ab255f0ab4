#![allow(dead_code)]

use async_trait::async_trait;
use speechlink_core::{
    AudioChunk, Credentials, EngineError, RecognitionConfig, RecognitionEvent, RecognitionSettings,
};
use speechlink_engine::{AudioInput, RecognitionEngine, SessionHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub fn config(timeout: Duration) -> Arc<RecognitionConfig> {
    Arc::new(
        RecognitionConfig::from_settings(
            &RecognitionSettings::default(),
            Credentials::new("test-key", "eastus"),
        )
        .unwrap()
        .with_timeout(timeout)
        .with_stop_grace(Duration::from_millis(200)),
    )
}

pub fn final_result(text: &str) -> RecognitionEvent {
    RecognitionEvent::FinalResult(text.to_string())
}

pub fn partial(text: &str) -> RecognitionEvent {
    RecognitionEvent::PartialResult(text.to_string())
}

/// Engine double that replays a fixed script and counts handle usage.
pub struct ScriptedEngine {
    reply_delay: Duration,
    on_open: Vec<RecognitionEvent>,
    on_chunk: Vec<Vec<RecognitionEvent>>,
    on_stop: Vec<RecognitionEvent>,
    on_close: Vec<RecognitionEvent>,
    fail_open: bool,
    fail_submit: bool,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, mpsc::UnboundedSender<RecognitionEvent>>>,
    chunks_seen: Mutex<HashMap<u64, usize>>,
    pub open_count: AtomicUsize,
    pub submit_count: AtomicUsize,
    pub stop_count: AtomicUsize,
    pub close_count: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            reply_delay: Duration::ZERO,
            on_open: Vec::new(),
            on_chunk: Vec::new(),
            on_stop: vec![RecognitionEvent::SessionStopped],
            on_close: Vec::new(),
            fail_open: false,
            fail_submit: false,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
            chunks_seen: Mutex::new(HashMap::new()),
            open_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            stop_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Events sent `delay` after the session opens.
    pub fn reply_after(mut self, delay: Duration, events: Vec<RecognitionEvent>) -> Self {
        self.reply_delay = delay;
        self.on_open = events;
        self
    }

    /// Events sent when chunk number `n` (0-based) is submitted.
    pub fn on_chunks(mut self, events: Vec<Vec<RecognitionEvent>>) -> Self {
        self.on_chunk = events;
        self
    }

    pub fn on_stop(mut self, events: Vec<RecognitionEvent>) -> Self {
        self.on_stop = events;
        self
    }

    /// Events the engine still emits while being closed.
    pub fn on_close(mut self, events: Vec<RecognitionEvent>) -> Self {
        self.on_close = events;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }

    fn sender(&self, handle: SessionHandle) -> Result<mpsc::UnboundedSender<RecognitionEvent>, EngineError> {
        self.sessions
            .lock()
            .unwrap()
            .get(&handle.id)
            .cloned()
            .ok_or(EngineError::UnknownSession(handle.id))
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_session(
        &self,
        _config: &RecognitionConfig,
        _input: AudioInput,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<SessionHandle, EngineError> {
        if self.fail_open {
            return Err(EngineError::OpenFailed("connection refused".to_string()));
        }
        let handle = SessionHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().insert(handle.id, events.clone());

        if !self.on_open.is_empty() {
            let delay = self.reply_delay;
            let script = self.on_open.clone();
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                for event in script {
                    let _ = events.send(event);
                }
            });
        }
        Ok(handle)
    }

    async fn submit_audio(&self, handle: SessionHandle, _chunk: AudioChunk) -> Result<(), EngineError> {
        if self.fail_submit {
            return Err(EngineError::SubmitFailed("socket reset".to_string()));
        }
        let events = self.sender(handle)?;
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        let index = {
            let mut seen = self.chunks_seen.lock().unwrap();
            let n = seen.entry(handle.id).or_insert(0);
            *n += 1;
            *n - 1
        };
        if let Some(script) = self.on_chunk.get(index) {
            for event in script {
                let _ = events.send(event.clone());
            }
        }
        Ok(())
    }

    async fn request_stop(&self, handle: SessionHandle) -> Result<(), EngineError> {
        let events = self.sender(handle)?;
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        for event in &self.on_stop {
            let _ = events.send(event.clone());
        }
        Ok(())
    }

    async fn close(&self, handle: SessionHandle) {
        if let Some(events) = self.sessions.lock().unwrap().remove(&handle.id) {
            for event in &self.on_close {
                let _ = events.send(event.clone());
            }
        }
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}
