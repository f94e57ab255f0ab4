pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, AudioEncoding, Credentials, OutputFormat, RecognitionConfig, RecognitionSettings,
};
pub use error::{ConfigError, EngineError, RecognitionError};
pub use types::{AudioChunk, RecognitionEvent, RecognitionResult, StreamMessage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_creation() {
        let chunk = AudioChunk::new(vec![0, 1, 2, 3]);
        assert_eq!(chunk.len(), 4);
        assert!(!chunk.is_empty());
        assert!(AudioChunk::from(Vec::new()).is_empty());
    }

    #[test]
    fn test_end_of_stream_is_distinct_from_empty_chunk() {
        let empty = StreamMessage::Chunk(AudioChunk::new(Vec::new()));
        assert_ne!(empty, StreamMessage::EndOfStream);
    }

    #[test]
    fn test_recognition_event_kind() {
        assert_eq!(RecognitionEvent::SessionStarted.kind(), "session_started");
        assert_eq!(
            RecognitionEvent::FinalResult("hi".to_string()).kind(),
            "final_result"
        );
        assert_eq!(RecognitionEvent::Canceled("x".to_string()).kind(), "canceled");
    }

    #[test]
    fn test_recognition_result_fields() {
        let result = RecognitionResult {
            session_id: 7,
            text: "hello world".to_string(),
            is_final: true,
        };
        assert_eq!(result.session_id, 7);
        assert_eq!(result.text, "hello world");
        assert!(result.is_final);
    }
}
