use async_trait::async_trait;
use speechlink_core::{AudioChunk, AudioEncoding, EngineError, RecognitionConfig, RecognitionEvent};
use tokio::sync::mpsc;

/// Engine-side identity of one open recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub encoding: AudioEncoding,
}

impl AudioFormat {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            sample_rate_hz: config.sample_rate_hz,
            bits_per_sample: 16,
            channels: 1,
            encoding: config.encoding,
        }
    }
}

/// How audio reaches the engine for a session.
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// One finite unit. Recognition starts as soon as the session opens.
    Buffered(Vec<u8>),
    /// Push stream fed through [`RecognitionEngine::submit_audio`].
    Stream(AudioFormat),
}

/// Binding to a remote recognition engine.
///
/// Every handle returned by `open_session` must eventually be passed to
/// `close`. Engine callbacks are delivered on the `events` sender given at
/// open time and may keep arriving after `close` is called.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn open_session(
        &self,
        config: &RecognitionConfig,
        input: AudioInput,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<SessionHandle, EngineError>;
    async fn submit_audio(&self, handle: SessionHandle, chunk: AudioChunk) -> Result<(), EngineError>;
    async fn request_stop(&self, handle: SessionHandle) -> Result<(), EngineError>;
    async fn close(&self, handle: SessionHandle);
}
