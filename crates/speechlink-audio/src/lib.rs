pub mod source;

pub use source::{
    feed_buffer, split_chunks, AudioSender, AudioSource, BufferedAudioSource, StreamingAudioSource,
};
