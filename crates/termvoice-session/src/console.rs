//! Interfaces of the console surface the session draws on and inserts into.
//!
//! Painting is the console's business. The session only asks for markers at
//! the cursor, attaches decorations to them, and sends text.

use std::sync::Arc;

use termvoice_core::types::{ConsoleGeometry, DecorationLayer, OverlayContent};

/// A stable anchor into a console's scroll buffer.
pub trait Marker: Send + Sync {
    /// Buffer line the marker is attached to, if still valid.
    fn line(&self) -> Option<u32>;

    /// Release the marker. Calling this more than once has no effect.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Placement of a decoration.
#[derive(Clone)]
pub struct DecorationOptions {
    pub marker: Arc<dyn Marker>,
    pub layer: DecorationLayer,
    /// Column the decoration starts at.
    pub x: u16,
}

impl std::fmt::Debug for DecorationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecorationOptions")
            .field("marker_line", &self.marker.line())
            .field("layer", &self.layer)
            .field("x", &self.x)
            .finish()
    }
}

/// A visual element attached to a marker.
pub trait Decoration: Send + Sync {
    /// Replace what the decoration displays.
    fn render(&self, content: &OverlayContent);

    /// Remove the decoration. Calling this more than once has no effect.
    fn dispose(&self);
}

/// One console (terminal) instance.
pub trait ConsoleInstance: Send + Sync {
    fn geometry(&self) -> ConsoleGeometry;

    /// Register a marker relative to the cursor line. Returns `None` when
    /// the console cannot place one.
    fn register_marker(&self, cursor_offset: Option<i32>) -> Option<Arc<dyn Marker>>;

    fn register_decoration(&self, options: DecorationOptions) -> Option<Arc<dyn Decoration>>;

    /// Write text at the prompt, optionally followed by a newline.
    fn send_text(&self, text: &str, execute: bool);

    /// Every live marker on this console, including ones other features own.
    fn markers(&self) -> Vec<Arc<dyn Marker>>;

    /// Dispose every live marker on this console.
    fn clear_markers(&self) {
        for marker in self.markers() {
            marker.dispose();
        }
    }
}

/// Resolves the console that currently has focus.
pub trait ConsoleService: Send + Sync {
    fn active_instance(&self) -> Option<Arc<dyn ConsoleInstance>>;
}
