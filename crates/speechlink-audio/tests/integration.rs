use speechlink_audio::{feed_buffer, AudioSource, BufferedAudioSource, StreamingAudioSource};
use speechlink_core::RecognitionError;

#[tokio::test]
async fn test_live_producer_roundtrip_preserves_order() {
    let (tx, mut source) = StreamingAudioSource::channel(2);
    let data: Vec<u8> = (0..=255).collect();
    let expected = data.clone();

    let producer = tokio::spawn(async move { feed_buffer(tx, &data, 7).await });

    let mut received = Vec::new();
    while let Some(chunk) = source.next_chunk().await.unwrap() {
        received.extend_from_slice(&chunk.data);
    }
    assert_eq!(producer.await.unwrap().unwrap(), 37);
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_producer_dropped_mid_stream() {
    let (tx, mut source) = StreamingAudioSource::channel(4);
    let producer = tokio::spawn(async move {
        tx.send(vec![1u8, 2, 3]).await.unwrap();
        // Dropped without the end-of-stream sentinel.
    });
    producer.await.unwrap();

    assert!(source.next_chunk().await.unwrap().is_some());
    assert!(matches!(
        source.next_chunk().await,
        Err(RecognitionError::Stream(_))
    ));
}

#[tokio::test]
async fn test_buffered_source_from_file() {
    let dir = std::env::temp_dir().join("speechlink_audio_from_file");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("clip.raw");
    std::fs::write(&path, vec![7u8; 64]).unwrap();

    let mut source = BufferedAudioSource::from_file(&path).unwrap();
    assert_eq!(source.len(), 64);
    assert_eq!(source.next_chunk().await.unwrap().unwrap().len(), 64);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_buffered_source_missing_file() {
    let result = BufferedAudioSource::from_file(std::path::Path::new("/nonexistent/clip.wav"));
    assert!(result.is_err());
}
