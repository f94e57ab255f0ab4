#[cfg(feature = "azure")]
pub mod azure_engine;
pub mod controller;
pub mod dispatcher;
pub mod engine_trait;
pub mod null_engine;
pub mod registry;
pub mod session;

#[cfg(feature = "azure")]
pub use azure_engine::AzureEngine;
pub use controller::SessionController;
pub use dispatcher::EventDispatcher;
pub use engine_trait::{AudioFormat, AudioInput, RecognitionEngine, SessionHandle};
pub use null_engine::NullEngine;
pub use registry::EngineRegistry;
pub use session::{RecognitionSession, SessionMode, SessionState, Step, TranscriptAccumulator};
