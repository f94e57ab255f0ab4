use crate::session::{RecognitionSession, SessionState, Step};
use speechlink_core::{RecognitionError, RecognitionEvent, RecognitionResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Serializes every input to one session: engine callbacks as well as the
/// controller's own start, end-of-input, expiry and failure signals.
///
/// Each session gets its own dispatcher, so locking is per session.
#[derive(Clone)]
pub struct EventDispatcher {
    session: Arc<Mutex<RecognitionSession>>,
    terminal_tx: Arc<watch::Sender<bool>>,
    progress: Option<mpsc::UnboundedSender<RecognitionResult>>,
}

impl EventDispatcher {
    pub fn new(session: RecognitionSession) -> Self {
        let (terminal_tx, _) = watch::channel(false);
        Self {
            session: Arc::new(Mutex::new(session)),
            terminal_tx: Arc::new(terminal_tx),
            progress: None,
        }
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<RecognitionResult>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn dispatch(&self, event: RecognitionEvent) -> Step {
        let mut session = self.lock();
        let progress = match &event {
            RecognitionEvent::PartialResult(text) => Some((text.clone(), false)),
            RecognitionEvent::FinalResult(text) => Some((text.clone(), true)),
            _ => None,
        };
        let kind = event.kind();
        let step = session.apply(event);
        tracing::trace!(session_id = session.id(), event = kind, step = ?step, "event dispatched");

        if step != Step::Ignored {
            if let (Some(tx), Some((text, is_final))) = (&self.progress, progress) {
                let _ = tx.send(RecognitionResult {
                    session_id: session.id(),
                    text,
                    is_final,
                });
            }
        }
        self.notify(step);
        step
    }

    pub fn start(&self) -> Step {
        let step = self.lock().start();
        self.notify(step);
        step
    }

    pub fn end_of_input(&self) -> Step {
        let step = self.lock().end_of_input();
        self.notify(step);
        step
    }

    pub fn expire(&self, timeout: Duration) -> Step {
        let step = self.lock().expire(timeout);
        self.notify(step);
        step
    }

    pub fn fail(&self, error: RecognitionError) -> Step {
        let step = self.lock().fail(error);
        self.notify(step);
        step
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn take_outcome(&self) -> Option<Result<String, RecognitionError>> {
        self.lock().take_outcome()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.terminal_tx.subscribe()
    }

    /// Resolve once the session is `Closed` or `Failed`.
    pub async fn wait_terminal(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|terminal| *terminal).await;
    }

    /// Feed engine callbacks into the session until the engine drops its sender.
    pub fn spawn(&self, mut events: mpsc::UnboundedReceiver<RecognitionEvent>) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                dispatcher.dispatch(event);
            }
            tracing::trace!("engine event channel closed");
        })
    }

    fn notify(&self, step: Step) {
        if step == Step::Terminal {
            self.terminal_tx.send_replace(true);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecognitionSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
