use crate::dispatcher::EventDispatcher;
use crate::engine_trait::{AudioFormat, AudioInput, RecognitionEngine, SessionHandle};
use crate::session::RecognitionSession;
use speechlink_audio::{AudioSource, BufferedAudioSource, StreamingAudioSource};
use speechlink_core::{
    config, ConfigError, RecognitionConfig, RecognitionError, RecognitionResult, StreamMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Engine-side handle plus the task pumping its callbacks.
///
/// `release` closes the handle in order. If the owning future is dropped or
/// unwinds first, `Drop` aborts the pump and closes the handle in the
/// background so no engine session outlives its call.
struct SessionResources {
    engine: Arc<dyn RecognitionEngine>,
    handle: Option<SessionHandle>,
    pump: Option<JoinHandle<()>>,
}

impl SessionResources {
    fn new(engine: Arc<dyn RecognitionEngine>, handle: SessionHandle) -> Self {
        Self {
            engine,
            handle: Some(handle),
            pump: None,
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            self.engine.close(handle).await;
            tracing::debug!(session_id = handle.id, "engine session closed");
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(handle) = self.handle.take() {
            tracing::warn!(session_id = handle.id, "session abandoned, closing in background");
            let engine = Arc::clone(&self.engine);
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move { engine.close(handle).await });
                }
                Err(_) => {
                    tracing::error!(session_id = handle.id, "no runtime left to close session");
                }
            }
        }
    }
}

/// Runs recognition calls against one engine binding.
pub struct SessionController {
    engine: Arc<dyn RecognitionEngine>,
    config: Option<Arc<RecognitionConfig>>,
    progress: Option<mpsc::UnboundedSender<RecognitionResult>>,
}

impl SessionController {
    pub fn new(engine: Arc<dyn RecognitionEngine>, config: Arc<RecognitionConfig>) -> Self {
        Self {
            engine,
            config: Some(config),
            progress: None,
        }
    }

    /// Use the process-wide config. Calls fail with `ConfigError::NotInitialized`
    /// if none was installed.
    pub fn from_global(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self {
            engine,
            config: config::global().ok(),
            progress: None,
        }
    }

    /// Forward applied partial and final results as they happen.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<RecognitionResult>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Batch recognition: `recognize_once` over raw bytes.
    pub async fn recognize(&self, audio_bytes: Vec<u8>) -> Result<String, RecognitionError> {
        self.recognize_once(BufferedAudioSource::new(audio_bytes)).await
    }

    /// Streaming recognition over a raw channel. The producer must send
    /// [`StreamMessage::EndOfStream`] before dropping its sender.
    pub async fn recognize_channel(
        &self,
        chunks: mpsc::Receiver<StreamMessage>,
    ) -> Result<String, RecognitionError> {
        self.recognize_stream(StreamingAudioSource::new(chunks)).await
    }

    /// Recognize one finite buffer, bounded by `config.timeout` of wall-clock time.
    pub async fn recognize_once(&self, audio: BufferedAudioSource) -> Result<String, RecognitionError> {
        let config = self.config()?;
        let timeout = config.timeout;
        let deadline = Instant::now() + timeout;
        let bytes = audio.into_bytes();
        let byte_count = bytes.len();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let open = self
            .engine
            .open_session(&config, AudioInput::Buffered(bytes), events_tx);
        let handle = match tokio::time::timeout_at(deadline, open).await {
            Ok(opened) => opened?,
            Err(_) => {
                tracing::warn!(engine = %self.engine.name(), "timed out opening session");
                return Err(RecognitionError::Timeout(timeout));
            }
        };
        let mut resources = SessionResources::new(Arc::clone(&self.engine), handle);
        tracing::info!(
            session_id = handle.id,
            engine = %self.engine.name(),
            bytes = byte_count,
            "batch recognition started"
        );

        let dispatcher = self.dispatcher(RecognitionSession::batch(handle.id, deadline));
        dispatcher.start();
        resources.pump = Some(dispatcher.spawn(events_rx));

        if tokio::time::timeout_at(deadline, dispatcher.wait_terminal())
            .await
            .is_err()
        {
            // A result applied before this point still wins.
            dispatcher.expire(timeout);
        }

        let outcome = self.finish(&dispatcher, handle);
        resources.release().await;
        outcome
    }

    /// Recognize a live stream until its end-of-stream sentinel, then stop
    /// the engine and wait (up to `config.stop_grace`) for it to acknowledge.
    pub async fn recognize_stream(
        &self,
        mut audio: StreamingAudioSource,
    ) -> Result<String, RecognitionError> {
        let config = match self.config() {
            Ok(config) => config,
            Err(e) => {
                audio.close();
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let input = AudioInput::Stream(AudioFormat::from_config(&config));
        let handle = match self.engine.open_session(&config, input, events_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                audio.close();
                return Err(e.into());
            }
        };
        let mut resources = SessionResources::new(Arc::clone(&self.engine), handle);
        tracing::info!(
            session_id = handle.id,
            engine = %self.engine.name(),
            sample_rate = config.sample_rate_hz,
            "streaming recognition started"
        );

        let dispatcher = self.dispatcher(RecognitionSession::streaming(handle.id));
        dispatcher.start();
        resources.pump = Some(dispatcher.spawn(events_rx));

        self.forward_audio(handle, &mut audio, &dispatcher).await;
        audio.close();

        if !dispatcher.is_terminal()
            && tokio::time::timeout(config.stop_grace, dispatcher.wait_terminal())
                .await
                .is_err()
        {
            tracing::warn!(session_id = handle.id, "engine did not acknowledge stop");
            dispatcher.fail(RecognitionError::Stream("stop ack timeout".to_string()));
        }

        let outcome = self.finish(&dispatcher, handle);
        resources.release().await;
        outcome
    }

    async fn forward_audio(
        &self,
        handle: SessionHandle,
        audio: &mut StreamingAudioSource,
        dispatcher: &EventDispatcher,
    ) {
        let mut terminal = dispatcher.subscribe();
        let mut submitted = 0usize;

        loop {
            if dispatcher.is_terminal() {
                tracing::debug!(session_id = handle.id, submitted, "session ended, stop forwarding");
                return;
            }

            let next = tokio::select! {
                biased;
                _ = terminal.changed() => continue,
                next = audio.next_chunk() => next,
            };

            match next {
                Ok(Some(chunk)) if chunk.is_empty() => {
                    tracing::trace!(session_id = handle.id, "skipping empty chunk");
                }
                Ok(Some(chunk)) => {
                    let bytes = chunk.len();
                    if let Err(e) = self.engine.submit_audio(handle, chunk).await {
                        tracing::error!(session_id = handle.id, "submit failed: {e}");
                        dispatcher.fail(e.into());
                        return;
                    }
                    submitted += 1;
                    tracing::trace!(session_id = handle.id, chunk = submitted, bytes, "chunk submitted");
                }
                Ok(None) => {
                    tracing::debug!(session_id = handle.id, submitted, "end of stream, requesting stop");
                    dispatcher.end_of_input();
                    if let Err(e) = self.engine.request_stop(handle).await {
                        tracing::error!(session_id = handle.id, "stop request failed: {e}");
                        dispatcher.fail(e.into());
                    }
                    return;
                }
                Err(e) => {
                    dispatcher.fail(e);
                    return;
                }
            }
        }
    }

    fn finish(
        &self,
        dispatcher: &EventDispatcher,
        handle: SessionHandle,
    ) -> Result<String, RecognitionError> {
        let outcome = dispatcher.take_outcome().unwrap_or_else(|| {
            Err(RecognitionError::Engine(
                "session ended without an outcome".to_string(),
            ))
        });
        match &outcome {
            Ok(transcript) => tracing::info!(
                session_id = handle.id,
                chars = transcript.len(),
                "recognition completed"
            ),
            Err(e) => tracing::warn!(session_id = handle.id, "recognition failed: {e}"),
        }
        outcome
    }

    fn dispatcher(&self, session: RecognitionSession) -> EventDispatcher {
        let dispatcher = EventDispatcher::new(session);
        match &self.progress {
            Some(tx) => dispatcher.with_progress(tx.clone()),
            None => dispatcher,
        }
    }

    fn config(&self) -> Result<Arc<RecognitionConfig>, RecognitionError> {
        self.config
            .clone()
            .ok_or(RecognitionError::Config(ConfigError::NotInitialized))
    }
}
