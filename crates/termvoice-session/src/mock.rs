//! In-memory collaborators for tests and development.
//!
//! `MockConsole` records every marker, decoration and sent line so callers
//! can assert on what a session drew. `MockSpeechService` hands out
//! channels whose sending halves the test drives.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use termvoice_core::error::{Result, TermVoiceError};
use termvoice_core::events::RecognitionEvent;
use termvoice_core::types::{ConsoleGeometry, DecorationLayer, OverlayContent};

use crate::announce::Announcer;
use crate::console::{ConsoleInstance, ConsoleService, Decoration, DecorationOptions, Marker};
use crate::speech::{RecognitionStream, SpeechService};

// =============================================================================
// Console
// =============================================================================

#[derive(Debug)]
pub struct MockMarker {
    pub id: u64,
    line: Option<u32>,
    disposed: AtomicBool,
}

impl Marker for MockMarker {
    fn line(&self) -> Option<u32> {
        if self.is_disposed() {
            None
        } else {
            self.line
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockDecoration {
    pub id: u64,
    pub layer: DecorationLayer,
    pub x: u16,
    content: Mutex<Option<OverlayContent>>,
    renders: AtomicU64,
    disposed: AtomicBool,
}

impl MockDecoration {
    /// Content of the most recent render.
    pub fn content(&self) -> Option<OverlayContent> {
        self.content.lock().expect("mock mutex poisoned").clone()
    }

    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn text(&self) -> Option<String> {
        self.content().and_then(|c| c.text)
    }
}

impl Decoration for MockDecoration {
    fn render(&self, content: &OverlayContent) {
        *self.content.lock().expect("mock mutex poisoned") = Some(content.clone());
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// A console instance that records everything done to it.
#[derive(Debug)]
pub struct MockConsoleInstance {
    geometry: Mutex<ConsoleGeometry>,
    markers: Mutex<Vec<Arc<MockMarker>>>,
    decorations: Mutex<Vec<Arc<MockDecoration>>>,
    sent: Mutex<Vec<(String, bool)>>,
    refuse_markers: AtomicBool,
    next_id: AtomicU64,
}

impl MockConsoleInstance {
    pub fn new(geometry: ConsoleGeometry) -> Self {
        Self {
            geometry: Mutex::new(geometry),
            markers: Mutex::new(Vec::new()),
            decorations: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            refuse_markers: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_geometry(&self, geometry: ConsoleGeometry) {
        *self.geometry.lock().expect("mock mutex poisoned") = geometry;
    }

    /// Make `register_marker` return `None` until reset.
    pub fn refuse_markers(&self, refuse: bool) {
        self.refuse_markers.store(refuse, Ordering::SeqCst);
    }

    /// Register a marker on behalf of some other feature.
    pub fn add_foreign_marker(&self) -> Arc<MockMarker> {
        self.new_marker()
    }

    pub fn live_marker_count(&self) -> usize {
        self.markers
            .lock()
            .expect("mock mutex poisoned")
            .iter()
            .filter(|m| !m.is_disposed())
            .count()
    }

    pub fn decorations(&self) -> Vec<Arc<MockDecoration>> {
        self.decorations.lock().expect("mock mutex poisoned").clone()
    }

    pub fn live_decorations(&self) -> Vec<Arc<MockDecoration>> {
        self.decorations()
            .into_iter()
            .filter(|d| !d.is_disposed())
            .collect()
    }

    /// Every `(text, execute)` pair passed to `send_text`.
    pub fn sent_text(&self) -> Vec<(String, bool)> {
        self.sent.lock().expect("mock mutex poisoned").clone()
    }

    fn new_marker(&self) -> Arc<MockMarker> {
        let marker = Arc::new(MockMarker {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            line: self.geometry().cursor_row,
            disposed: AtomicBool::new(false),
        });
        self.markers
            .lock()
            .expect("mock mutex poisoned")
            .push(Arc::clone(&marker));
        marker
    }
}

impl ConsoleInstance for MockConsoleInstance {
    fn geometry(&self) -> ConsoleGeometry {
        *self.geometry.lock().expect("mock mutex poisoned")
    }

    fn register_marker(&self, _cursor_offset: Option<i32>) -> Option<Arc<dyn Marker>> {
        if self.refuse_markers.load(Ordering::SeqCst) {
            return None;
        }
        let marker: Arc<dyn Marker> = self.new_marker();
        Some(marker)
    }

    fn register_decoration(&self, options: DecorationOptions) -> Option<Arc<dyn Decoration>> {
        if options.marker.is_disposed() {
            return None;
        }
        let decoration = Arc::new(MockDecoration {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            layer: options.layer,
            x: options.x,
            content: Mutex::new(None),
            renders: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        });
        self.decorations
            .lock()
            .expect("mock mutex poisoned")
            .push(Arc::clone(&decoration));
        let decoration: Arc<dyn Decoration> = decoration;
        Some(decoration)
    }

    fn send_text(&self, text: &str, execute: bool) {
        self.sent
            .lock()
            .expect("mock mutex poisoned")
            .push((text.to_string(), execute));
    }

    fn markers(&self) -> Vec<Arc<dyn Marker>> {
        self.markers
            .lock()
            .expect("mock mutex poisoned")
            .iter()
            .filter(|m| !m.is_disposed())
            .map(|m| Arc::clone(m) as Arc<dyn Marker>)
            .collect()
    }
}

/// Console service whose active instance can be swapped or removed.
#[derive(Debug, Default)]
pub struct MockConsole {
    active: Mutex<Option<Arc<MockConsoleInstance>>>,
}

impl MockConsole {
    pub fn new(instance: Arc<MockConsoleInstance>) -> Self {
        Self {
            active: Mutex::new(Some(instance)),
        }
    }

    /// A console service with no active instance.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set_active(&self, instance: Option<Arc<MockConsoleInstance>>) {
        *self.active.lock().expect("mock mutex poisoned") = instance;
    }
}

impl ConsoleService for MockConsole {
    fn active_instance(&self) -> Option<Arc<dyn ConsoleInstance>> {
        let active = self.active.lock().expect("mock mutex poisoned").clone();
        active.map(|instance| instance as Arc<dyn ConsoleInstance>)
    }
}

// =============================================================================
// Announcer
// =============================================================================

#[derive(Debug, Default)]
pub struct MockAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl MockAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("mock mutex poisoned").clone()
    }
}

impl Announcer for MockAnnouncer {
    fn announce(&self, message: &str) {
        self.messages
            .lock()
            .expect("mock mutex poisoned")
            .push(message.to_string());
    }
}

// =============================================================================
// Speech
// =============================================================================

struct MockStream {
    sender: mpsc::Sender<RecognitionEvent>,
    token: CancellationToken,
}

/// Speech service that opens one channel per session.
#[derive(Default)]
pub struct MockSpeechService {
    streams: Mutex<Vec<MockStream>>,
    unavailable: AtomicBool,
}

impl std::fmt::Debug for MockSpeechService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSpeechService")
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl MockSpeechService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_session` fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn session_count(&self) -> usize {
        self.streams.lock().expect("mock mutex poisoned").len()
    }

    /// Sending half of the `index`th session's stream.
    pub fn sender(&self, index: usize) -> Option<mpsc::Sender<RecognitionEvent>> {
        self.streams
            .lock()
            .expect("mock mutex poisoned")
            .get(index)
            .map(|s| s.sender.clone())
    }

    /// Cancellation token the `index`th session was opened with.
    pub fn token(&self, index: usize) -> Option<CancellationToken> {
        self.streams
            .lock()
            .expect("mock mutex poisoned")
            .get(index)
            .map(|s| s.token.clone())
    }
}

#[async_trait]
impl SpeechService for MockSpeechService {
    async fn create_session(&self, token: CancellationToken) -> Result<RecognitionStream> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TermVoiceError::Speech(
                "Speech service unavailable".to_string(),
            ));
        }
        let (sender, receiver) = mpsc::channel(64);
        self.streams
            .lock()
            .expect("mock mutex poisoned")
            .push(MockStream { sender, token });
        Ok(receiver)
    }
}
