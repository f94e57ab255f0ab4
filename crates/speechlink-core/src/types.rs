/// Opaque, order-significant slice of encoded audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// What a live producer puts on the wire. An empty chunk is still a chunk;
/// only `EndOfStream` closes the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(AudioChunk),
    EndOfStream,
}

/// Callback from the engine binding, one variant per engine notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    SessionStarted,
    SessionStopped,
    PartialResult(String),
    FinalResult(String),
    Canceled(String),
}

impl RecognitionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::SessionStopped => "session_stopped",
            Self::PartialResult(_) => "partial_result",
            Self::FinalResult(_) => "final_result",
            Self::Canceled(_) => "canceled",
        }
    }
}

/// Progress notification forwarded to callers that ask for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub session_id: u64,
    pub text: String,
    pub is_final: bool,
}
