use crate::engine_trait::{AudioInput, RecognitionEngine, SessionHandle};
use async_trait::async_trait;
use speechlink_core::{AudioChunk, EngineError, RecognitionConfig, RecognitionEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Offline loopback engine: every unit of audio comes back as
/// `"[null] N bytes"`.
pub struct NullEngine {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, mpsc::UnboundedSender<RecognitionEvent>>>,
    open_count: AtomicUsize,
    submit_count: AtomicUsize,
    close_count: AtomicUsize,
    ack_stop: bool,
}

impl NullEngine {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
            open_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            ack_stop: true,
        }
    }

    /// Never answer `request_stop`.
    pub fn without_stop_ack(mut self) -> Self {
        self.ack_stop = false;
        self
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Relaxed)
    }

    fn sender(&self, handle: SessionHandle) -> Result<mpsc::UnboundedSender<RecognitionEvent>, EngineError> {
        self.sessions
            .lock()
            .map_err(|_| EngineError::Transport("session table poisoned".to_string()))?
            .get(&handle.id)
            .cloned()
            .ok_or(EngineError::UnknownSession(handle.id))
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(len: usize) -> String {
    format!("[null] {len} bytes")
}

#[async_trait]
impl RecognitionEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    async fn open_session(
        &self,
        _config: &RecognitionConfig,
        input: AudioInput,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<SessionHandle, EngineError> {
        let handle = SessionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.open_count.fetch_add(1, Ordering::Relaxed);

        let _ = events.send(RecognitionEvent::SessionStarted);
        if let AudioInput::Buffered(bytes) = &input {
            if !bytes.is_empty() {
                let _ = events.send(RecognitionEvent::FinalResult(describe(bytes.len())));
            }
            let _ = events.send(RecognitionEvent::SessionStopped);
        }

        self.sessions
            .lock()
            .map_err(|_| EngineError::OpenFailed("session table poisoned".to_string()))?
            .insert(handle.id, events);
        tracing::trace!(session_id = handle.id, "NullEngine session opened");
        Ok(handle)
    }

    async fn submit_audio(&self, handle: SessionHandle, chunk: AudioChunk) -> Result<(), EngineError> {
        let events = self.sender(handle)?;
        let count = self.submit_count.fetch_add(1, Ordering::Relaxed) + 1;
        let text = describe(chunk.len());
        let _ = events.send(RecognitionEvent::PartialResult(text.clone()));
        let _ = events.send(RecognitionEvent::FinalResult(text));
        tracing::trace!("NullEngine fed chunk #{count}, {} bytes", chunk.len());
        Ok(())
    }

    async fn request_stop(&self, handle: SessionHandle) -> Result<(), EngineError> {
        let events = self.sender(handle)?;
        if self.ack_stop {
            let _ = events.send(RecognitionEvent::SessionStopped);
        }
        Ok(())
    }

    async fn close(&self, handle: SessionHandle) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&handle.id);
        }
        self.close_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_trait::AudioFormat;
    use speechlink_core::{Credentials, RecognitionSettings};

    fn config() -> RecognitionConfig {
        RecognitionConfig::from_settings(&RecognitionSettings::default(), Credentials::new("k", "r"))
            .unwrap()
    }

    fn stream_input() -> AudioInput {
        AudioInput::Stream(AudioFormat::from_config(&config()))
    }

    #[test]
    fn test_null_engine_name() {
        let engine = NullEngine::new();
        assert_eq!(engine.name(), "null");
    }

    #[tokio::test]
    async fn test_buffered_session_reports_result_and_stops() {
        let engine = NullEngine::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine
            .open_session(&config(), AudioInput::Buffered(vec![0; 480]), tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), RecognitionEvent::SessionStarted);
        assert_eq!(
            rx.recv().await.unwrap(),
            RecognitionEvent::FinalResult("[null] 480 bytes".to_string())
        );
        assert_eq!(rx.recv().await.unwrap(), RecognitionEvent::SessionStopped);
    }

    #[tokio::test]
    async fn test_stream_session_echoes_chunks() {
        let engine = NullEngine::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = engine.open_session(&config(), stream_input(), tx).await.unwrap();
        engine
            .submit_audio(handle, AudioChunk::new(vec![0; 100]))
            .await
            .unwrap();
        engine.request_stop(handle).await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                RecognitionEvent::SessionStarted,
                RecognitionEvent::PartialResult("[null] 100 bytes".to_string()),
                RecognitionEvent::FinalResult("[null] 100 bytes".to_string()),
                RecognitionEvent::SessionStopped,
            ]
        );
        assert_eq!(engine.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_submit_after_close_is_unknown_session() {
        let engine = NullEngine::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = engine.open_session(&config(), stream_input(), tx).await.unwrap();
        engine.close(handle).await;

        match engine.submit_audio(handle, AudioChunk::new(vec![1])).await {
            Err(EngineError::UnknownSession(id)) => assert_eq!(id, handle.id),
            other => panic!("expected UnknownSession, got {other:?}"),
        }
        assert_eq!(engine.open_count(), 1);
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_handles_are_unique() {
        let engine = NullEngine::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = engine.open_session(&config(), stream_input(), tx.clone()).await.unwrap();
        let b = engine.open_session(&config(), stream_input(), tx).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_without_stop_ack_stays_silent() {
        let engine = NullEngine::new().without_stop_ack();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = engine.open_session(&config(), stream_input(), tx).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), RecognitionEvent::SessionStarted);
        engine.request_stop(handle).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_null_engine_implements_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullEngine>();
    }
}
