//! Session controller managing the voice session lifecycle.
//!
//! The `SessionController` owns at most one active session. It opens a
//! recognition stream on `start`, applies each event through `handle`, drives
//! the overlays and the silence timer, and commits text to the console on
//! `stop`. All mutation happens through `&mut self`; timer expiries come back
//! as [`SessionSignal`]s rather than running session code on timer tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use termvoice_core::config::{
    resolve_speech_timeout, ConfigProvider, CHAT_HINT_KEY, CHAT_PREVIEW_KEY, DEFAULT_CHAT_HINT,
    DEFAULT_CHAT_PREVIEW,
};
use termvoice_core::error::Result;
use termvoice_core::events::{RecognitionEvent, SessionEvent, StopReason};
use termvoice_core::types::Timestamp;

use crate::announce::{inserted_message, Announcer};
use crate::console::ConsoleService;
use crate::normalize::normalize;
use crate::overlay::{ChatOverlays, Overlay, OverlayManager};
use crate::scheduler::{CommitScheduler, DelayedTask, SessionSignal};
use crate::speech::{RecognitionStream, SpeechService};
use crate::state::{SessionStatus, StateMachine};

/// Delay between a chat-mode accept and the final commit.
pub const CHAT_COMMIT_DELAY: Duration = Duration::from_millis(2000);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something for the controller to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Event(RecognitionEvent),
    Signal(SessionSignal),
    /// The recognition stream ended without a `Stopped` event.
    StreamClosed,
}

/// The data of the active session.
struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    chat_mode: bool,
    input_text: String,
    timeout: Duration,
    preview_text: String,
    token: CancellationToken,
    events: Option<RecognitionStream>,
    overlays: OverlayManager,
    scheduler: CommitScheduler,
    pending_commit: Option<DelayedTask>,
    /// Hint and preview handed to `pending_commit`.
    chat_overlays: Vec<Arc<Overlay>>,
}

impl Session {
    /// Release everything the session owns.
    fn teardown(&mut self) {
        self.scheduler.cancel();
        self.overlays.dispose_all();
        self.token.cancel();
        self.events = None;
        self.release_chat_commit();
        self.input_text.clear();
    }

    /// Abort a pending chat commit and dispose its overlays now rather than
    /// when the aborted task is dropped.
    fn release_chat_commit(&mut self) {
        if let Some(mut commit) = self.pending_commit.take() {
            commit.cancel();
        }
        for overlay in self.chat_overlays.drain(..) {
            overlay.dispose();
        }
    }

    fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
        self.release_chat_commit();
    }
}

/// Owner of the single active voice session.
///
/// A host holds one controller (usually inside a [`crate::SessionRuntime`]);
/// starting a new session always terminates the previous one first, so no
/// two streams ever feed the same state.
pub struct SessionController {
    console: Arc<dyn ConsoleService>,
    speech: Arc<dyn SpeechService>,
    config: Arc<dyn ConfigProvider>,
    announcer: Arc<dyn Announcer>,
    state: StateMachine,
    session: Option<Session>,
    signals_tx: mpsc::UnboundedSender<SessionSignal>,
    signals_rx: mpsc::UnboundedReceiver<SessionSignal>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.state.current())
            .field("session_id", &self.session_id())
            .field("chat_mode", &self.chat_mode())
            .finish()
    }
}

impl SessionController {
    pub fn new(
        console: Arc<dyn ConsoleService>,
        speech: Arc<dyn SpeechService>,
        config: Arc<dyn ConfigProvider>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            console,
            speech,
            config,
            announcer,
            state: StateMachine::new(),
            session: None,
            signals_tx,
            signals_rx,
            events_tx,
        }
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.state.current()
    }

    /// Current normalized input, empty when no session holds text.
    pub fn input_text(&self) -> &str {
        self.session.as_ref().map_or("", |s| s.input_text.as_str())
    }

    pub fn chat_mode(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.chat_mode)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Silence timeout of the current session.
    pub fn timeout(&self) -> Option<Duration> {
        self.session.as_ref().map(|s| s.timeout)
    }

    /// Whether the silence timer has an outstanding expiry.
    pub fn is_commit_scheduled(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.scheduler.is_pending())
    }

    /// Whether a chat-mode commit is waiting to run.
    pub fn is_chat_commit_pending(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.pending_commit.as_ref())
            .is_some_and(|c| c.is_pending())
    }

    /// Number of overlays the current session still holds.
    pub fn overlay_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.overlays.active_count())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start a new session, terminating any existing one first.
    ///
    /// Fails only when the speech service cannot open a stream; the
    /// controller is then left stopped with no session.
    pub async fn start(&mut self, chat_mode: bool) -> Result<Uuid> {
        self.terminate(StopReason::Replaced);

        let timeout = resolve_speech_timeout(self.config.as_ref());
        let hint_text = self
            .config
            .get_string(CHAT_HINT_KEY)
            .unwrap_or_else(|| DEFAULT_CHAT_HINT.to_string());
        let preview_text = self
            .config
            .get_string(CHAT_PREVIEW_KEY)
            .unwrap_or_else(|| DEFAULT_CHAT_PREVIEW.to_string());

        let token = CancellationToken::new();
        let events = self.speech.create_session(token.clone()).await?;

        let id = Uuid::new_v4();
        if let Err(e) = self.state.transition(SessionStatus::Recording) {
            tracing::warn!(error = %e, "Unexpected state at session start");
        }
        self.session = Some(Session {
            id,
            started_at: Utc::now(),
            chat_mode,
            input_text: String::new(),
            timeout,
            preview_text,
            token,
            events: Some(events),
            overlays: OverlayManager::new(Arc::clone(&self.console), hint_text),
            scheduler: CommitScheduler::new(id, timeout, self.signals_tx.clone()),
            pending_commit: None,
            chat_overlays: Vec::new(),
        });

        tracing::info!(
            session_id = %id,
            chat_mode,
            timeout_ms = timeout.as_millis() as u64,
            "Voice session started"
        );
        self.publish(SessionEvent::Started {
            session_id: id,
            chat_mode,
            timestamp: Timestamp::now(),
        });
        Ok(id)
    }

    /// Stop the session.
    ///
    /// `send` commits the current text. Without `chat_mode` the session is
    /// torn down completely; with it, the accept hint and preview are shown
    /// and the text is committed as an executed line after
    /// [`CHAT_COMMIT_DELAY`].
    pub fn stop(&mut self, send: bool, chat_mode: bool) {
        self.stop_with(send, chat_mode, StopReason::Requested);
    }

    fn stop_with(&mut self, send: bool, chat_mode: bool, reason: StopReason) {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Stop requested with no session");
            return;
        };
        if self.state.current() == SessionStatus::Recording {
            if let Err(e) = self.state.transition(SessionStatus::Stopped) {
                tracing::warn!(error = %e, "Unexpected state at session stop");
            }
        }

        session.overlays.clear_status_active();
        session.overlays.dispose_status();

        if send {
            session.scheduler.cancel();
            commit_text(
                self.console.as_ref(),
                self.announcer.as_ref(),
                &self.events_tx,
                session.id,
                &session.input_text,
            );
        }

        let id = session.id;
        if chat_mode {
            session.scheduler.cancel();
            session.release_chat_commit();
            session.overlays.show_status(true);
            let preview = session.preview_text.clone();
            session.overlays.show_progress(&preview, true);

            let overlays = session.overlays.take_chat_overlays();
            session.chat_overlays = overlays.handles();
            let commit = ChatCommit {
                session_id: id,
                text: session.input_text.clone(),
                overlays,
                console: Arc::clone(&self.console),
                announcer: Arc::clone(&self.announcer),
                events_tx: self.events_tx.clone(),
                token: session.token.clone(),
            };
            session.pending_commit = Some(DelayedTask::spawn(CHAT_COMMIT_DELAY, commit.run()));
            tracing::info!(session_id = %id, ?reason, "Voice session accepted, commit pending");
        } else if let Some(mut session) = self.session.take() {
            let elapsed = session.elapsed_secs();
            session.teardown();
            tracing::info!(session_id = %id, ?reason, elapsed_secs = elapsed, "Voice session stopped");
        }

        self.publish(SessionEvent::Stopped {
            session_id: id,
            reason,
            timestamp: Timestamp::now(),
        });
    }

    /// Tear down the current session, if any, without committing.
    fn terminate(&mut self, reason: StopReason) {
        if self.session.is_some() {
            self.stop_with(false, false, reason);
        }
    }

    // -------------------------------------------------------------------------
    // Reactions
    // -------------------------------------------------------------------------

    /// Apply one recognition event.
    ///
    /// Events are ignored when there is no session, when its stream was
    /// cancelled, or once it left `Recording`.
    pub fn handle(&mut self, event: RecognitionEvent) {
        let status = self.state.current();
        let Some(session) = self.session.as_mut() else {
            tracing::trace!(event = event.kind(), "Dropping event without session");
            return;
        };
        if session.token.is_cancelled() || status != SessionStatus::Recording {
            tracing::debug!(
                session_id = %session.id,
                event = event.kind(),
                %status,
                "Dropping late recognition event"
            );
            return;
        }

        let timed = !session.timeout.is_zero();
        match &event {
            RecognitionEvent::Started => {
                if !session.overlays.has_status() {
                    session.overlays.show_status(false);
                }
            }
            RecognitionEvent::Recognizing { .. } => {
                if let Some(text) = event.text() {
                    session.input_text = normalize(text);
                    let shown = session.input_text.clone();
                    session.overlays.show_progress(&shown, false);
                    self.publish_text(false);
                }
                if timed {
                    if let Some(session) = self.session.as_mut() {
                        session.scheduler.cancel();
                    }
                }
            }
            RecognitionEvent::Recognized { .. } => {
                if let Some(text) = event.text() {
                    session.input_text = normalize(text);
                    self.publish_text(true);
                }
                if self.chat_mode() {
                    self.stop_with(false, true, StopReason::ChatAccepted);
                } else if timed {
                    if let Some(session) = self.session.as_mut() {
                        session.scheduler.schedule();
                    }
                }
            }
            RecognitionEvent::Stopped => {
                let chat_mode = session.chat_mode;
                self.stop_with(false, chat_mode, StopReason::EngineStopped);
            }
        }
    }

    /// Apply a timer expiry.
    pub fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::SilenceElapsed {
                session_id,
                generation,
            } => {
                let status = self.state.current();
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if session.id != session_id || !session.scheduler.accept(generation) {
                    tracing::trace!(%session_id, generation, "Ignoring stale silence expiry");
                    return;
                }
                if status != SessionStatus::Recording || session.token.is_cancelled() {
                    return;
                }
                tracing::debug!(%session_id, "Silence timeout elapsed, committing");
                self.stop_with(true, false, StopReason::SilenceTimeout);
            }
        }
    }

    /// Apply any input.
    pub fn dispatch(&mut self, input: SessionInput) {
        match input {
            SessionInput::Event(event) => self.handle(event),
            SessionInput::Signal(signal) => self.handle_signal(signal),
            SessionInput::StreamClosed => {
                if let Some(session) = self.session.as_mut() {
                    tracing::debug!(session_id = %session.id, "Recognition stream closed");
                    session.events = None;
                }
            }
        }
    }

    /// Wait for the next stream event or timer expiry. Cancel safe.
    ///
    /// Pends forever while there is neither an open stream nor a pending
    /// signal, so callers should select it against their own inputs.
    pub async fn next_input(&mut self) -> SessionInput {
        let events = self.session.as_mut().and_then(|s| s.events.as_mut());
        tokio::select! {
            Some(signal) = self.signals_rx.recv() => SessionInput::Signal(signal),
            event = recv_event(events) => match event {
                Some(event) => SessionInput::Event(event),
                None => SessionInput::StreamClosed,
            },
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    fn publish_text(&self, is_final: bool) {
        if let Some(session) = &self.session {
            self.publish(SessionEvent::TextUpdated {
                session_id: session.id,
                text: session.input_text.clone(),
                is_final,
            });
        }
    }
}

async fn recv_event(events: Option<&mut RecognitionStream>) -> Option<RecognitionEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Insert `text` at the prompt without executing it and announce it.
fn commit_text(
    console: &dyn ConsoleService,
    announcer: &dyn Announcer,
    events_tx: &broadcast::Sender<SessionEvent>,
    session_id: Uuid,
    text: &str,
) {
    if text.is_empty() {
        tracing::debug!(%session_id, "Nothing to commit");
        return;
    }
    let Some(instance) = console.active_instance() else {
        tracing::debug!(%session_id, "No active console, commit skipped");
        return;
    };
    instance.send_text(text, false);
    announcer.announce(&inserted_message(text));
    tracing::info!(%session_id, text_len = text.len(), "Dictated text inserted");
    let _ = events_tx.send(SessionEvent::Committed {
        session_id,
        text: text.to_string(),
        executed: false,
        timestamp: Timestamp::now(),
    });
}

/// The deferred half of a chat-mode stop.
///
/// Owns its overlays, a console handle and a snapshot of the text, so it
/// never reaches back into controller state.
struct ChatCommit {
    session_id: Uuid,
    text: String,
    overlays: ChatOverlays,
    console: Arc<dyn ConsoleService>,
    announcer: Arc<dyn Announcer>,
    events_tx: broadcast::Sender<SessionEvent>,
    token: CancellationToken,
}

impl ChatCommit {
    async fn run(mut self) {
        self.overlays.dispose();
        match self.console.active_instance() {
            Some(instance) => {
                instance.send_text(&self.text, true);
                // Clears markers other features registered too.
                instance.clear_markers();
                self.announcer.announce(&inserted_message(&self.text));
                tracing::info!(
                    session_id = %self.session_id,
                    text_len = self.text.len(),
                    "Chat text committed"
                );
                let _ = self.events_tx.send(SessionEvent::Committed {
                    session_id: self.session_id,
                    text: self.text.clone(),
                    executed: true,
                    timestamp: Timestamp::now(),
                });
            }
            None => {
                tracing::debug!(session_id = %self.session_id, "No active console, chat commit skipped");
            }
        }
        self.token.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
