use speechlink_core::{RecognitionError, RecognitionEvent};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Finishing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// One bounded call, exactly one final result expected.
    Batch,
    /// Long-lived session fed from a live producer.
    Streaming,
}

/// Ordered finalized segments of one session.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAccumulator {
    segments: Vec<String>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized segment exactly as the engine reported it.
    pub fn push(&mut self, text: impl Into<String>) {
        self.segments.push(text.into());
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn joined(&self) -> String {
        self.segments.join(" ")
    }
}

/// Effect of feeding one input into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Input had no effect (wrong state or mode, or trailing event).
    Ignored,
    /// State or accumulator may have changed, session still running.
    Continue,
    /// Session just reached `Closed` or `Failed`.
    Terminal,
}

pub struct RecognitionSession {
    id: u64,
    mode: SessionMode,
    state: SessionState,
    accumulator: TranscriptAccumulator,
    live_partial: Option<String>,
    failure: Option<RecognitionError>,
    deadline: Option<Instant>,
    outcome_taken: bool,
}

impl RecognitionSession {
    pub fn batch(id: u64, deadline: Instant) -> Self {
        Self::new(id, SessionMode::Batch, Some(deadline))
    }

    pub fn streaming(id: u64) -> Self {
        Self::new(id, SessionMode::Streaming, None)
    }

    fn new(id: u64, mode: SessionMode, deadline: Option<Instant>) -> Self {
        Self {
            id,
            mode,
            state: SessionState::Idle,
            accumulator: TranscriptAccumulator::new(),
            live_partial: None,
            failure: None,
            deadline,
            outcome_taken: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn accumulator(&self) -> &TranscriptAccumulator {
        &self.accumulator
    }

    /// Latest partial hypothesis in streaming mode. Never part of the result.
    pub fn live_partial(&self) -> Option<&str> {
        self.live_partial.as_deref()
    }

    pub fn start(&mut self) -> Step {
        if self.state != SessionState::Idle {
            return Step::Ignored;
        }
        self.transition(SessionState::Active);
        Step::Continue
    }

    pub fn apply(&mut self, event: RecognitionEvent) -> Step {
        if self.state.is_terminal() {
            tracing::debug!(
                session_id = self.id,
                event = event.kind(),
                state = ?self.state,
                "ignoring event for finished session"
            );
            return Step::Ignored;
        }
        if self.state == SessionState::Idle {
            tracing::warn!(session_id = self.id, event = event.kind(), "event before start");
            return Step::Ignored;
        }

        match (self.mode, event) {
            (_, RecognitionEvent::SessionStarted) => {
                tracing::debug!(session_id = self.id, "engine session started");
                Step::Continue
            }
            (SessionMode::Batch, RecognitionEvent::PartialResult(_)) => Step::Ignored,
            (SessionMode::Streaming, RecognitionEvent::PartialResult(text)) => {
                self.live_partial = Some(text);
                Step::Continue
            }
            (SessionMode::Batch, RecognitionEvent::FinalResult(text)) => {
                self.accumulator.push(text);
                self.transition(SessionState::Closed);
                Step::Terminal
            }
            (SessionMode::Streaming, RecognitionEvent::FinalResult(text)) => {
                self.live_partial = None;
                self.accumulator.push(text);
                Step::Continue
            }
            (SessionMode::Batch, RecognitionEvent::SessionStopped) => {
                // Stopped without a result: the engine heard no speech.
                self.transition(SessionState::Closed);
                Step::Terminal
            }
            (SessionMode::Streaming, RecognitionEvent::SessionStopped) => {
                if self.state == SessionState::Finishing {
                    self.transition(SessionState::Closed);
                } else {
                    self.fail_with(RecognitionError::Engine(
                        "session stopped before end of stream".to_string(),
                    ));
                }
                Step::Terminal
            }
            (_, RecognitionEvent::Canceled(reason)) => {
                self.fail_with(RecognitionError::Engine(reason));
                Step::Terminal
            }
        }
    }

    /// The producer signalled end of stream: wait for the engine to stop.
    pub fn end_of_input(&mut self) -> Step {
        if self.mode != SessionMode::Streaming || self.state != SessionState::Active {
            return Step::Ignored;
        }
        self.transition(SessionState::Finishing);
        Step::Continue
    }

    /// Batch deadline elapsed. No effect if a result was already applied.
    pub fn expire(&mut self, timeout: Duration) -> Step {
        if self.mode != SessionMode::Batch || self.state != SessionState::Active {
            return Step::Ignored;
        }
        self.fail_with(RecognitionError::Timeout(timeout));
        Step::Terminal
    }

    pub fn fail(&mut self, error: RecognitionError) -> Step {
        if self.state.is_terminal() {
            return Step::Ignored;
        }
        self.fail_with(error);
        Step::Terminal
    }

    /// Hand out the result exactly once, after the session is terminal.
    pub fn take_outcome(&mut self) -> Option<Result<String, RecognitionError>> {
        if !self.state.is_terminal() || self.outcome_taken {
            return None;
        }
        self.outcome_taken = true;
        match self.state {
            SessionState::Closed => Some(Ok(self.accumulator.joined())),
            _ => Some(Err(self.failure.take().unwrap_or_else(|| {
                RecognitionError::Engine("session failed".to_string())
            }))),
        }
    }

    fn fail_with(&mut self, error: RecognitionError) {
        tracing::debug!(session_id = self.id, error = %error, "session failed");
        self.failure = Some(error);
        self.transition(SessionState::Failed);
    }

    fn transition(&mut self, to: SessionState) {
        tracing::debug!(session_id = self.id, from = ?self.state, to = ?to, "session transition");
        self.state = to;
    }
}
