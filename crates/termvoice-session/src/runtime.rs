//! Task that owns a `SessionController` and serializes everything it reacts to.
//!
//! Host commands, recognition events and timer signals are all funneled into
//! one loop, so the controller never sees two inputs at once. Hosts talk to
//! the loop through a cloneable [`SessionHandle`].

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use termvoice_core::error::{Result, TermVoiceError};
use termvoice_core::events::SessionEvent;

use crate::controller::{SessionController, SessionInput};
use crate::state::SessionStatus;

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<Uuid>,
    pub chat_mode: bool,
    pub input_text: String,
    pub commit_pending: bool,
}

impl SessionSnapshot {
    fn of(controller: &SessionController) -> Self {
        Self {
            status: controller.status(),
            session_id: controller.session_id(),
            chat_mode: controller.chat_mode(),
            input_text: controller.input_text().to_string(),
            commit_pending: controller.is_commit_scheduled() || controller.is_chat_commit_pending(),
        }
    }
}

#[derive(Debug)]
enum SessionCommand {
    Start {
        chat_mode: bool,
        reply: oneshot::Sender<Result<Uuid>>,
    },
    Stop {
        send: bool,
        chat_mode: bool,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

enum Step {
    Command(Option<SessionCommand>),
    Input(SessionInput),
}

/// Cloneable front end of a running [`SessionRuntime`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Start a new session, replacing any active one.
    pub async fn start(&self, chat_mode: bool) -> Result<Uuid> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Start { chat_mode, reply })?;
        rx.await.map_err(|_| runtime_stopped())?
    }

    pub fn stop(&self, send: bool, chat_mode: bool) -> Result<()> {
        self.send(SessionCommand::Stop { send, chat_mode })
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply })?;
        rx.await.map_err(|_| runtime_stopped())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ask the runtime to tear down the session and exit its loop.
    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown)
    }

    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| runtime_stopped())
    }
}

fn runtime_stopped() -> TermVoiceError {
    TermVoiceError::Session("Session runtime stopped".to_string())
}

/// The loop driving a [`SessionController`].
pub struct SessionRuntime {
    controller: SessionController,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl SessionRuntime {
    pub fn new(controller: SessionController) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            commands: tx,
            events: controller.event_sender(),
        };
        (
            Self {
                controller,
                commands: rx,
            },
            handle,
        )
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(controller: SessionController) -> (SessionHandle, JoinHandle<()>) {
        let (runtime, handle) = Self::new(controller);
        let task = tokio::spawn(runtime.run());
        (handle, task)
    }

    /// Run until `shutdown` is requested or every handle is dropped.
    pub async fn run(mut self) {
        tracing::debug!("Session runtime started");
        loop {
            // Inputs already queued are applied before the next command.
            let step = tokio::select! {
                biased;
                input = self.controller.next_input() => Step::Input(input),
                command = self.commands.recv() => Step::Command(command),
            };
            match step {
                Step::Input(input) => self.controller.dispatch(input),
                Step::Command(Some(SessionCommand::Start { chat_mode, reply })) => {
                    let result = self.controller.start(chat_mode).await;
                    if let Err(e) = &result {
                        tracing::warn!(error = %e, "Failed to start voice session");
                    }
                    let _ = reply.send(result);
                }
                Step::Command(Some(SessionCommand::Stop { send, chat_mode })) => {
                    self.controller.stop(send, chat_mode);
                }
                Step::Command(Some(SessionCommand::Snapshot { reply })) => {
                    let _ = reply.send(SessionSnapshot::of(&self.controller));
                }
                Step::Command(Some(SessionCommand::Shutdown)) | Step::Command(None) => break,
            }
        }
        self.controller.stop(false, false);
        tracing::debug!("Session runtime stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================
