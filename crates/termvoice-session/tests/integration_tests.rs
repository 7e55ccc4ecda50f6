//! End-to-end session flows driven through the runtime with mock collaborators.
//!
//! Every test runs on a paused clock so silence and chat delays are exact.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use termvoice_core::config::{TermVoiceConfig, DEFAULT_CHAT_HINT};
use termvoice_core::events::{RecognitionEvent, SessionEvent, StopReason};
use termvoice_core::types::ConsoleGeometry;
use termvoice_session::controller::CHAT_COMMIT_DELAY;
use termvoice_session::mock::{MockAnnouncer, MockConsole, MockConsoleInstance, MockSpeechService};
use termvoice_session::{Marker, SessionController, SessionHandle, SessionRuntime, SessionStatus};

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    handle: SessionHandle,
    console: Arc<MockConsole>,
    instance: Arc<MockConsoleInstance>,
    speech: Arc<MockSpeechService>,
    announcer: Arc<MockAnnouncer>,
}

fn geometry() -> ConsoleGeometry {
    ConsoleGeometry {
        cursor_row: Some(12),
        cursor_column: Some(8),
        total_columns: 120,
        is_first_row: false,
    }
}

fn harness_with(config: TermVoiceConfig) -> Harness {
    let instance = Arc::new(MockConsoleInstance::new(geometry()));
    let console = Arc::new(MockConsole::new(Arc::clone(&instance)));
    let speech = Arc::new(MockSpeechService::new());
    let announcer = Arc::new(MockAnnouncer::new());
    let controller = SessionController::new(
        Arc::clone(&console) as _,
        Arc::clone(&speech) as _,
        Arc::new(config),
        Arc::clone(&announcer) as _,
    );
    let (handle, _task) = SessionRuntime::spawn(controller);
    Harness {
        handle,
        console,
        instance,
        speech,
        announcer,
    }
}

fn harness(timeout_ms: i64) -> Harness {
    let mut config = TermVoiceConfig::default();
    config.voice.speech_timeout_ms = Some(toml::Value::Integer(timeout_ms));
    harness_with(config)
}

impl Harness {
    fn stream(&self, index: usize) -> mpsc::Sender<RecognitionEvent> {
        self.speech.sender(index).expect("session stream opened")
    }
}

/// Wait for the next commit, skipping other events.
async fn next_commit(events: &mut broadcast::Receiver<SessionEvent>) -> (String, bool) {
    loop {
        if let SessionEvent::Committed { text, executed, .. } = events.recv().await.unwrap() {
            return (text, executed);
        }
    }
}

// =============================================================================
// Dictation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn dictation_commits_normalized_text_after_silence() {
    let h = harness(1000);
    let mut events = h.handle.subscribe();
    h.handle.start(false).await.unwrap();

    let stream = h.stream(0);
    stream.send(RecognitionEvent::Started).await.unwrap();
    stream.send(RecognitionEvent::recognizing("echo")).await.unwrap();
    stream.send(RecognitionEvent::recognizing("echo dollar home")).await.unwrap();
    stream
        .send(RecognitionEvent::recognized("Echo dollar HOME."))
        .await
        .unwrap();

    let (text, executed) = next_commit(&mut events).await;
    assert_eq!(text, " Echo $ HOME");
    assert!(!executed);
    assert_eq!(h.instance.sent_text(), vec![(" Echo $ HOME".to_string(), false)]);
    assert_eq!(h.announcer.messages(), vec!["Echo $ HOME inserted".to_string()]);
    assert_eq!(h.instance.live_decorations().len(), 0);
    assert_eq!(h.instance.live_marker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dictation_commits_once_per_session() {
    let h = harness(200);
    h.handle.start(false).await.unwrap();
    let stream = h.stream(0);
    stream.send(RecognitionEvent::recognized("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The stream outlives the session; nothing it says is applied.
    let _ = stream.send(RecognitionEvent::recognized("second")).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.instance.sent_text().len(), 1);
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Stopped);
    assert_eq!(snapshot.input_text, "");
}

#[tokio::test(start_paused = true)]
async fn unusable_timeout_falls_back_to_default() {
    let mut config = TermVoiceConfig::default();
    config.voice.speech_timeout_ms = Some(toml::Value::String("soon".to_string()));
    let h = harness_with(config);
    h.handle.start(false).await.unwrap();
    h.stream(0)
        .send(RecognitionEvent::recognized("whoami"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(h.instance.sent_text().is_empty());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.instance.sent_text().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_discards_previous_session() {
    let h = harness(0);
    h.handle.start(false).await.unwrap();
    h.stream(0)
        .send(RecognitionEvent::recognizing("stale words"))
        .await
        .unwrap();
    h.handle.start(false).await.unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Recording);
    assert_eq!(snapshot.input_text, "");
    assert!(h.speech.token(0).unwrap().is_cancelled());
    assert_eq!(h.instance.live_decorations().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_console_is_tolerated() {
    let h = harness(100);
    h.console.set_active(None);
    h.handle.start(false).await.unwrap();
    let stream = h.stream(0);
    stream.send(RecognitionEvent::Started).await.unwrap();
    stream.send(RecognitionEvent::recognized("ls")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Stopped);
    assert!(h.instance.sent_text().is_empty());
    assert!(h.instance.decorations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refused_markers_skip_overlays_but_not_commit() {
    let h = harness(100);
    h.instance.refuse_markers(true);
    h.handle.start(false).await.unwrap();
    let stream = h.stream(0);
    stream.send(RecognitionEvent::Started).await.unwrap();
    stream.send(RecognitionEvent::recognized("date")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(h.instance.decorations().is_empty());
    assert_eq!(h.instance.sent_text(), vec![(" date".to_string(), false)]);
}

// =============================================================================
// Chat mode
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chat_accept_executes_and_clears_all_markers() {
    let h = harness(1000);
    let foreign = h.instance.add_foreign_marker();
    let mut events = h.handle.subscribe();
    h.handle.start(true).await.unwrap();

    let stream = h.stream(0);
    stream.send(RecognitionEvent::Started).await.unwrap();
    stream.send(RecognitionEvent::recognizing("what changed")).await.unwrap();
    stream
        .send(RecognitionEvent::recognized("What changed?"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Stopped);
    assert!(snapshot.commit_pending);
    let hint = h
        .instance
        .live_decorations()
        .into_iter()
        .find(|d| d.text().as_deref() == Some(DEFAULT_CHAT_HINT));
    assert!(hint.is_some());
    assert!(!foreign.is_disposed());

    let (text, executed) = next_commit(&mut events).await;
    assert_eq!(text, " What changed");
    assert!(executed);
    assert!(foreign.is_disposed());
    assert_eq!(h.instance.live_marker_count(), 0);
    assert_eq!(h.instance.live_decorations().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn chat_stop_with_send_commits_twice() {
    let h = harness(0);
    h.handle.start(true).await.unwrap();
    h.stream(0)
        .send(RecognitionEvent::recognizing("git log"))
        .await
        .unwrap();
    h.handle.snapshot().await.unwrap();
    h.handle.stop(true, true).unwrap();

    tokio::time::sleep(CHAT_COMMIT_DELAY + Duration::from_millis(10)).await;
    assert_eq!(
        h.instance.sent_text(),
        vec![
            (" git log".to_string(), false),
            (" git log".to_string(), true),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn new_session_aborts_pending_chat_commit() {
    let h = harness(0);
    let mut events = h.handle.subscribe();
    h.handle.start(true).await.unwrap();
    h.stream(0)
        .send(RecognitionEvent::recognized("rm -rf build"))
        .await
        .unwrap();
    h.handle.snapshot().await.unwrap();
    h.handle.start(false).await.unwrap();

    tokio::time::sleep(CHAT_COMMIT_DELAY * 2).await;
    assert!(h.instance.sent_text().is_empty());

    let mut reasons = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Stopped { reason, .. } = event {
            reasons.push(reason);
        }
    }
    assert_eq!(reasons, vec![StopReason::ChatAccepted, StopReason::Replaced]);
}
