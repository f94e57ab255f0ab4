//! Azure Speech-to-Text REST binding.
//!
//! Batch sessions post the whole buffer. Stream sessions post a chunked
//! body that is fed by `submit_audio` and ended by `request_stop`. The REST
//! endpoint only answers once the body is complete, so a stream session
//! yields at most one final result.

use crate::engine_trait::{AudioInput, RecognitionEngine, SessionHandle};
use async_trait::async_trait;
use serde::Deserialize;
use speechlink_core::{AudioChunk, EngineError, RecognitionConfig, RecognitionEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RECOGNITION_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";

type BodySender = mpsc::Sender<Result<Vec<u8>, std::io::Error>>;

struct AzureSession {
    body_tx: Option<BodySender>,
    task: JoinHandle<()>,
}

pub struct AzureEngine {
    client: reqwest::Client,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, AzureSession>>,
}

impl AzureEngine {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<u64, AzureSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, config: &RecognitionConfig) -> reqwest::RequestBuilder {
        self.client
            .post(recognition_url(config))
            .query(&recognition_query(config))
            .header("Ocp-Apim-Subscription-Key", config.credentials.subscription_key())
            .header(
                reqwest::header::CONTENT_TYPE,
                config.encoding.content_type(config.sample_rate_hz),
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

impl Default for AzureEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Recognition URL for the configured region (or endpoint override), without
/// the query string.
pub fn recognition_url(config: &RecognitionConfig) -> String {
    let base = match config.credentials.endpoint() {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => format!(
            "https://{}.stt.speech.microsoft.com",
            config.credentials.region()
        ),
    };
    format!("{base}{RECOGNITION_PATH}")
}

/// Query parameters; reqwest percent-encodes them when the request is built.
pub fn recognition_query(config: &RecognitionConfig) -> [(&'static str, &str); 2] {
    [
        ("language", config.language_code.as_str()),
        ("format", config.output_format.as_str()),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
    #[serde(default, rename = "NBest")]
    n_best: Vec<NBestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NBestEntry {
    #[serde(default)]
    display: Option<String>,
}

/// Translate a REST response body into engine events (excluding start/stop).
pub fn events_from_response(body: &str) -> Vec<RecognitionEvent> {
    let response: RecognitionResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => return vec![RecognitionEvent::Canceled(format!("malformed response: {e}"))],
    };

    match response.recognition_status.as_str() {
        "Success" => {
            let text = response
                .display_text
                .or_else(|| response.n_best.into_iter().find_map(|entry| entry.display))
                .unwrap_or_default();
            vec![RecognitionEvent::FinalResult(text)]
        }
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Vec::new(),
        other => vec![RecognitionEvent::Canceled(format!("recognition status {other}"))],
    }
}

async fn run_request(
    session_id: u64,
    request: reqwest::RequestBuilder,
    events: mpsc::UnboundedSender<RecognitionEvent>,
) {
    let _ = events.send(RecognitionEvent::SessionStarted);

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(session_id, "azure request failed: {e}");
            let _ = events.send(RecognitionEvent::Canceled(format!("request failed: {e}")));
            return;
        }
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            let _ = events.send(RecognitionEvent::Canceled(format!("failed to read response: {e}")));
            return;
        }
    };
    if !status.is_success() {
        tracing::error!(session_id, %status, "azure returned an error");
        let _ = events.send(RecognitionEvent::Canceled(format!("HTTP {status}: {body}")));
        return;
    }

    for event in events_from_response(&body) {
        let canceled = matches!(event, RecognitionEvent::Canceled(_));
        let _ = events.send(event);
        if canceled {
            return;
        }
    }
    let _ = events.send(RecognitionEvent::SessionStopped);
}

#[async_trait]
impl RecognitionEngine for AzureEngine {
    fn name(&self) -> &str {
        "azure"
    }

    async fn open_session(
        &self,
        config: &RecognitionConfig,
        input: AudioInput,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<SessionHandle, EngineError> {
        let handle = SessionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let request = self.request(config);

        let (body_tx, request) = match input {
            AudioInput::Buffered(bytes) => (None, request.body(bytes)),
            AudioInput::Stream(_) => {
                let (tx, rx) = mpsc::channel(config.stream_buffer);
                let body = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                (Some(tx), request.body(reqwest::Body::wrap_stream(body)))
            }
        };

        let task = tokio::spawn(run_request(handle.id, request, events));
        self.sessions().insert(handle.id, AzureSession { body_tx, task });
        tracing::debug!(
            session_id = handle.id,
            url = %recognition_url(config),
            language = %config.language_code,
            "azure session opened"
        );
        Ok(handle)
    }

    async fn submit_audio(&self, handle: SessionHandle, chunk: AudioChunk) -> Result<(), EngineError> {
        let body_tx = self
            .sessions()
            .get(&handle.id)
            .ok_or(EngineError::UnknownSession(handle.id))?
            .body_tx
            .clone()
            .ok_or_else(|| EngineError::SubmitFailed("session does not accept audio".to_string()))?;

        body_tx
            .send(Ok(chunk.data))
            .await
            .map_err(|_| EngineError::SubmitFailed("request body closed".to_string()))
    }

    async fn request_stop(&self, handle: SessionHandle) -> Result<(), EngineError> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(&handle.id)
            .ok_or(EngineError::UnknownSession(handle.id))?;
        // Dropping the sender ends the chunked body.
        session.body_tx.take();
        Ok(())
    }

    async fn close(&self, handle: SessionHandle) {
        if let Some(session) = self.sessions().remove(&handle.id) {
            session.task.abort();
            tracing::debug!(session_id = handle.id, "azure session closed");
        }
    }
}
