use async_trait::async_trait;
use speechlink_core::{AudioChunk, RecognitionError, StreamMessage};
use tokio::sync::mpsc;

/// Deliver the next chunk of audio, or `None` once the source is complete.
#[async_trait]
pub trait AudioSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>, RecognitionError>;
}

// ── BufferedAudioSource ───────────────────────────────────────

/// A finite buffer presented to the engine as one audio unit.
#[derive(Debug, Clone)]
pub struct BufferedAudioSource {
    data: Option<Vec<u8>>,
}

impl BufferedAudioSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: Some(data) }
    }

    pub fn from_file(path: &std::path::Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.unwrap_or_default()
    }
}

#[async_trait]
impl AudioSource for BufferedAudioSource {
    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>, RecognitionError> {
        Ok(self.data.take().map(AudioChunk::new))
    }
}

// ── StreamingAudioSource ──────────────────────────────────────

/// Consumer half of a live chunk stream.
///
/// Completion is only signalled by [`StreamMessage::EndOfStream`]. If every
/// sender goes away without it, the next read fails with
/// `RecognitionError::Stream("unexpected close")`.
pub struct StreamingAudioSource {
    rx: mpsc::Receiver<StreamMessage>,
    finished: bool,
    chunks_read: usize,
}

impl StreamingAudioSource {
    pub fn new(rx: mpsc::Receiver<StreamMessage>) -> Self {
        Self {
            rx,
            finished: false,
            chunks_read: 0,
        }
    }

    /// Bounded channel: producers wait once `capacity` chunks are queued.
    pub fn channel(capacity: usize) -> (AudioSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (AudioSender { tx }, Self::new(rx))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Stop accepting audio. Pending and future sends fail on the producer side.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl AudioSource for StreamingAudioSource {
    async fn next_chunk(&mut self) -> Result<Option<AudioChunk>, RecognitionError> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(StreamMessage::Chunk(chunk)) => {
                self.chunks_read += 1;
                tracing::trace!(chunk = self.chunks_read, bytes = chunk.len(), "audio chunk read");
                Ok(Some(chunk))
            }
            Some(StreamMessage::EndOfStream) => {
                tracing::debug!(chunks = self.chunks_read, "end of stream received");
                self.finished = true;
                Ok(None)
            }
            None => {
                tracing::warn!(chunks = self.chunks_read, "audio stream closed without end-of-stream");
                Err(RecognitionError::Stream("unexpected close".to_string()))
            }
        }
    }
}

// ── AudioSender ───────────────────────────────────────────────

/// Producer half of a [`StreamingAudioSource`].
#[derive(Clone)]
pub struct AudioSender {
    tx: mpsc::Sender<StreamMessage>,
}

impl AudioSender {
    pub async fn send(&self, chunk: impl Into<AudioChunk>) -> Result<(), RecognitionError> {
        self.tx
            .send(StreamMessage::Chunk(chunk.into()))
            .await
            .map_err(|_| RecognitionError::Stream("audio source closed".to_string()))
    }

    /// Send the end-of-stream sentinel, consuming this sender.
    pub async fn finish(self) -> Result<(), RecognitionError> {
        self.tx
            .send(StreamMessage::EndOfStream)
            .await
            .map_err(|_| RecognitionError::Stream("audio source closed".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Split a buffer into `chunk_size` pieces, keeping order.
pub fn split_chunks(data: &[u8], chunk_size: usize) -> impl Iterator<Item = AudioChunk> + '_ {
    data.chunks(chunk_size.max(1))
        .map(|piece| AudioChunk::new(piece.to_vec()))
}

/// Replay a buffer as a live stream, then send the end-of-stream sentinel.
pub async fn feed_buffer(
    sender: AudioSender,
    data: &[u8],
    chunk_size: usize,
) -> Result<usize, RecognitionError> {
    let mut sent = 0;
    for chunk in split_chunks(data, chunk_size) {
        sender.send(chunk).await?;
        sent += 1;
    }
    sender.finish().await?;
    Ok(sent)
}
