//! Console surface that reports overlays and input through `tracing`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use termvoice_core::types::{ConsoleGeometry, OverlayContent};
use termvoice_session::{ConsoleInstance, ConsoleService, Decoration, DecorationOptions, Marker};

struct LogMarker {
    id: u64,
    line: Option<u32>,
    disposed: AtomicBool,
}

impl Marker for LogMarker {
    fn line(&self) -> Option<u32> {
        self.line.filter(|_| !self.is_disposed())
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!(marker_id = self.id, "Marker disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

struct LogDecoration {
    id: u64,
    x: u16,
    disposed: AtomicBool,
}

impl Decoration for LogDecoration {
    fn render(&self, content: &OverlayContent) {
        tracing::info!(
            decoration_id = self.id,
            x = self.x,
            icon = content.icon.as_deref().unwrap_or(""),
            text = content.text.as_deref().unwrap_or(""),
            classes = ?content.style.classes,
            "Overlay rendered"
        );
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!(decoration_id = self.id, "Overlay disposed");
        }
    }
}

/// A fixed-geometry console that logs what it is asked to draw and type.
pub struct LoggingConsoleInstance {
    geometry: ConsoleGeometry,
    markers: Mutex<Vec<Arc<LogMarker>>>,
    input: Mutex<Vec<(String, bool)>>,
    next_id: AtomicU64,
}

impl LoggingConsoleInstance {
    pub fn new(geometry: ConsoleGeometry) -> Self {
        Self {
            geometry,
            markers: Mutex::new(Vec::new()),
            input: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Every `(text, execute)` pair sent so far.
    pub fn input(&self) -> Vec<(String, bool)> {
        self.input.lock().expect("console mutex poisoned").clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl ConsoleInstance for LoggingConsoleInstance {
    fn geometry(&self) -> ConsoleGeometry {
        self.geometry
    }

    fn register_marker(&self, cursor_offset: Option<i32>) -> Option<Arc<dyn Marker>> {
        let line = self
            .geometry
            .cursor_row
            .map(|row| row.saturating_add_signed(cursor_offset.unwrap_or(0)));
        let marker = Arc::new(LogMarker {
            id: self.next_id(),
            line,
            disposed: AtomicBool::new(false),
        });
        let mut markers = self.markers.lock().expect("console mutex poisoned");
        markers.retain(|m| !m.is_disposed());
        markers.push(Arc::clone(&marker));
        Some(marker)
    }

    fn register_decoration(&self, options: DecorationOptions) -> Option<Arc<dyn Decoration>> {
        if options.marker.is_disposed() {
            return None;
        }
        Some(Arc::new(LogDecoration {
            id: self.next_id(),
            x: options.x,
            disposed: AtomicBool::new(false),
        }))
    }

    fn send_text(&self, text: &str, execute: bool) {
        tracing::info!(text = %text, execute, "Console input");
        self.input
            .lock()
            .expect("console mutex poisoned")
            .push((text.to_string(), execute));
    }

    fn markers(&self) -> Vec<Arc<dyn Marker>> {
        self.markers
            .lock()
            .expect("console mutex poisoned")
            .iter()
            .filter(|m| !m.is_disposed())
            .map(|m| Arc::clone(m) as Arc<dyn Marker>)
            .collect()
    }
}

/// Console service with a single, always active, [`LoggingConsoleInstance`].
pub struct LoggingConsole {
    instance: Arc<LoggingConsoleInstance>,
}

impl LoggingConsole {
    pub fn new(instance: Arc<LoggingConsoleInstance>) -> Self {
        Self { instance }
    }
}

impl ConsoleService for LoggingConsole {
    fn active_instance(&self) -> Option<Arc<dyn ConsoleInstance>> {
        Some(Arc::clone(&self.instance) as Arc<dyn ConsoleInstance>)
    }
}
