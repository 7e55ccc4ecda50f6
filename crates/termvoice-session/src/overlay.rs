//! Transient overlays drawn next to the console cursor.
//!
//! Three slots exist: the status indicator (recording icon or accept hint),
//! the live progress banner, and the final preview banner. Each slot holds at
//! most one overlay; showing a new one disposes the previous first.
//!
//! An [`Overlay`] pairs one marker with one decoration. Disposal releases
//! both, is idempotent, and also runs on drop, so an overlay cannot outlive
//! every handle to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use termvoice_core::types::{
    ConsoleGeometry, DecorationLayer, OverlayContent, OverlayStyle, OverlayWidth,
};

use crate::console::{ConsoleService, Decoration, DecorationOptions, Marker};
use crate::scheduler::DelayedTask;

/// How long a final preview stays up before removing itself.
pub const PREVIEW_LIFETIME: Duration = Duration::from_millis(2000);

pub const STATUS_CLASS: &str = "termvoice-status";
pub const RECORDING_CLASS: &str = "recording";
pub const HINT_CLASS: &str = "accept-hint";
pub const PROGRESS_CLASS: &str = "termvoice-progress";
pub const PREVIEW_CLASS: &str = "final-preview";

const RECORDING_ICON: &str = "mic-filled";
const HINT_BACKGROUND: &str = "#0e639c";
const HINT_WIDTH_COLUMNS: u16 = 24;

/// A marker and the decoration attached to it.
pub struct Overlay {
    marker: Arc<dyn Marker>,
    decoration: Arc<dyn Decoration>,
    content: OverlayContent,
    disposed: AtomicBool,
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("line", &self.marker.line())
            .field("content", &self.content)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Overlay {
    /// Place `content` next to the cursor of the active console.
    ///
    /// Returns `None`, after logging, when there is no active console or the
    /// console declines the marker or decoration.
    pub fn attach(console: &dyn ConsoleService, content: OverlayContent) -> Option<Self> {
        let Some(instance) = console.active_instance() else {
            tracing::debug!("No active console, skipping overlay");
            return None;
        };
        let geometry = instance.geometry();
        let Some(marker) = instance.register_marker(Some(0)) else {
            tracing::debug!("Marker registration failed, skipping overlay");
            return None;
        };
        let options = DecorationOptions {
            marker: Arc::clone(&marker),
            layer: DecorationLayer::Top,
            x: geometry.anchor_x(),
        };
        let Some(decoration) = instance.register_decoration(options) else {
            tracing::debug!("Decoration registration failed, skipping overlay");
            marker.dispose();
            return None;
        };
        decoration.render(&content);
        Some(Self {
            marker,
            decoration,
            content,
            disposed: AtomicBool::new(false),
        })
    }

    /// Render a modified copy of the content. The original is kept.
    pub fn restyle(&self, update: impl FnOnce(&mut OverlayContent)) {
        if self.is_disposed() {
            return;
        }
        let mut content = self.content.clone();
        update(&mut content);
        self.decoration.render(&content);
    }

    /// Dispose the decoration and its marker. Only the first call has effect.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.decoration.dispose();
        self.marker.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Progress banner slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSlot {
    /// Live text while the user is speaking.
    Live,
    /// Final or canned preview shown while a commit is pending.
    Preview,
}

/// Overlays handed over to a deferred chat commit.
#[derive(Debug, Default)]
pub struct ChatOverlays {
    pub hint: Option<Arc<Overlay>>,
    pub preview: Option<Arc<Overlay>>,
    preview_expiry: Option<DelayedTask>,
}

impl ChatOverlays {
    /// Shared handles to the hint and preview, for disposal by the owner
    /// while the commit is still pending.
    pub fn handles(&self) -> Vec<Arc<Overlay>> {
        self.hint.iter().chain(self.preview.iter()).cloned().collect()
    }

    pub fn dispose(&mut self) {
        if let Some(hint) = self.hint.take() {
            hint.dispose();
        }
        if let Some(preview) = self.preview.take() {
            preview.dispose();
        }
        self.preview_expiry = None;
    }
}

/// Owner of one session's overlays.
pub struct OverlayManager {
    console: Arc<dyn ConsoleService>,
    hint_text: String,
    status: Option<Arc<Overlay>>,
    live: Option<Arc<Overlay>>,
    preview: Option<Arc<Overlay>>,
    preview_expiry: Option<DelayedTask>,
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayManager")
            .field("status", &self.status)
            .field("live", &self.live)
            .field("preview", &self.preview)
            .finish()
    }
}

impl OverlayManager {
    pub fn new(console: Arc<dyn ConsoleService>, hint_text: impl Into<String>) -> Self {
        Self {
            console,
            hint_text: hint_text.into(),
            status: None,
            live: None,
            preview: None,
            preview_expiry: None,
        }
    }

    /// Show the status indicator, replacing any existing one.
    ///
    /// Outside chat mode this is the recording icon; in chat mode it is the
    /// accept hint. Returns whether an overlay was created.
    pub fn show_status(&mut self, chat_mode: bool) -> bool {
        self.dispose_status();
        let content = if chat_mode {
            hint_content(&self.hint_text)
        } else {
            recording_content()
        };
        self.status = Overlay::attach(self.console.as_ref(), content).map(Arc::new);
        self.status.is_some()
    }

    /// Remove the active highlighting from the status indicator.
    pub fn clear_status_active(&self) {
        if let Some(status) = &self.status {
            status.restyle(|content| content.style.classes.retain(|c| c != RECORDING_CLASS));
        }
    }

    pub fn dispose_status(&mut self) {
        if let Some(status) = self.status.take() {
            status.dispose();
        }
    }

    /// Show `text` as a banner to the right of the cursor.
    ///
    /// A final preview also replaces the live banner and removes itself
    /// after [`PREVIEW_LIFETIME`]. Returns whether an overlay was created.
    pub fn show_progress(&mut self, text: &str, is_final_preview: bool) -> bool {
        if is_final_preview {
            self.dispose_progress(ProgressSlot::Live);
        }
        let slot = if is_final_preview {
            ProgressSlot::Preview
        } else {
            ProgressSlot::Live
        };
        self.dispose_progress(slot);

        let Some(instance) = self.console.active_instance() else {
            tracing::debug!("No active console, skipping progress overlay");
            return false;
        };
        let content = progress_content(text, &instance.geometry(), is_final_preview);
        let Some(overlay) = Overlay::attach(self.console.as_ref(), content).map(Arc::new) else {
            return false;
        };

        if is_final_preview {
            let expiring = Arc::clone(&overlay);
            self.preview_expiry = Some(DelayedTask::spawn(PREVIEW_LIFETIME, async move {
                expiring.dispose();
            }));
            self.preview = Some(overlay);
        } else {
            self.live = Some(overlay);
        }
        true
    }

    pub fn dispose_progress(&mut self, slot: ProgressSlot) {
        let overlay = match slot {
            ProgressSlot::Live => self.live.take(),
            ProgressSlot::Preview => {
                self.preview_expiry = None;
                self.preview.take()
            }
        };
        if let Some(overlay) = overlay {
            overlay.dispose();
        }
    }

    /// Dispose every overlay this manager holds. Safe to call repeatedly.
    pub fn dispose_all(&mut self) {
        self.dispose_status();
        self.dispose_progress(ProgressSlot::Live);
        self.dispose_progress(ProgressSlot::Preview);
    }

    /// Move the hint and preview overlays out, together with the preview's
    /// self-disposal timer.
    pub fn take_chat_overlays(&mut self) -> ChatOverlays {
        ChatOverlays {
            hint: self.status.take(),
            preview: self.preview.take(),
            preview_expiry: self.preview_expiry.take(),
        }
    }

    pub fn has_status(&self) -> bool {
        self.status.as_ref().is_some_and(|o| !o.is_disposed())
    }

    pub fn has_progress(&self, slot: ProgressSlot) -> bool {
        let overlay = match slot {
            ProgressSlot::Live => &self.live,
            ProgressSlot::Preview => &self.preview,
        };
        overlay.as_ref().is_some_and(|o| !o.is_disposed())
    }

    /// Number of live overlays across all slots.
    pub fn active_count(&self) -> usize {
        [&self.status, &self.live, &self.preview]
            .into_iter()
            .filter(|slot| slot.as_ref().is_some_and(|o| !o.is_disposed()))
            .count()
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

fn recording_content() -> OverlayContent {
    OverlayContent {
        icon: Some(RECORDING_ICON.to_string()),
        text: None,
        style: OverlayStyle {
            classes: vec![STATUS_CLASS.to_string(), RECORDING_CLASS.to_string()],
            ..OverlayStyle::default()
        },
    }
}

fn hint_content(hint: &str) -> OverlayContent {
    OverlayContent {
        icon: None,
        text: Some(hint.to_string()),
        style: OverlayStyle {
            classes: vec![STATUS_CLASS.to_string(), HINT_CLASS.to_string()],
            background: Some(HINT_BACKGROUND.to_string()),
            width: OverlayWidth::Columns(HINT_WIDTH_COLUMNS),
        },
    }
}

fn progress_content(
    text: &str,
    geometry: &ConsoleGeometry,
    is_final_preview: bool,
) -> OverlayContent {
    let mut classes = vec![PROGRESS_CLASS.to_string()];
    if is_final_preview {
        classes.push(PREVIEW_CLASS.to_string());
    }
    OverlayContent {
        icon: None,
        text: Some(text.to_string()),
        style: OverlayStyle {
            classes,
            background: None,
            width: OverlayWidth::Percent(geometry.remaining_width_percent()),
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConsole, MockConsoleInstance};

    fn geometry(column: u16, first_row: bool) -> ConsoleGeometry {
        ConsoleGeometry {
            cursor_row: Some(if first_row { 0 } else { 12 }),
            cursor_column: Some(column),
            total_columns: 80,
            is_first_row: first_row,
        }
    }

    fn manager_on(geometry: ConsoleGeometry) -> (OverlayManager, Arc<MockConsoleInstance>) {
        let instance = Arc::new(MockConsoleInstance::new(geometry));
        let console = Arc::new(MockConsole::new(Arc::clone(&instance)));
        (OverlayManager::new(console, "Accept"), instance)
    }

    #[tokio::test]
    async fn test_show_status_recording_indicator() {
        let (mut overlays, instance) = manager_on(geometry(10, false));
        assert!(overlays.show_status(false));

        let decorations = instance.live_decorations();
        assert_eq!(decorations.len(), 1);
        assert_eq!(decorations[0].x, 11);
        let content = decorations[0].content().unwrap();
        assert_eq!(content.icon.as_deref(), Some(RECORDING_ICON));
        assert!(content.style.has_class(RECORDING_CLASS));
    }

    #[tokio::test]
    async fn test_show_status_chat_hint_on_first_row() {
        let (mut overlays, instance) = manager_on(geometry(10, true));
        overlays.show_status(true);

        let decorations = instance.live_decorations();
        let decoration = &decorations[0];
        assert_eq!(decoration.x, 14);
        let content = decoration.content().unwrap();
        assert_eq!(content.text.as_deref(), Some("Accept"));
        assert_eq!(content.style.width, OverlayWidth::Columns(HINT_WIDTH_COLUMNS));
        assert_eq!(content.style.background.as_deref(), Some(HINT_BACKGROUND));
    }

    #[tokio::test]
    async fn test_status_replaced_not_duplicated() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        overlays.show_status(false);
        overlays.show_status(false);
        assert_eq!(instance.live_decorations().len(), 1);
        assert_eq!(instance.live_marker_count(), 1);
        assert_eq!(instance.decorations().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_status_active_removes_recording_class() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        overlays.show_status(false);
        overlays.clear_status_active();

        let decorations = instance.live_decorations();
        let decoration = &decorations[0];
        assert_eq!(decoration.render_count(), 2);
        let content = decoration.content().unwrap();
        assert!(!content.style.has_class(RECORDING_CLASS));
        assert!(content.style.has_class(STATUS_CLASS));
    }

    #[tokio::test]
    async fn test_progress_width_and_replacement() {
        let (mut overlays, instance) = manager_on(geometry(20, false));
        overlays.show_progress(" hello", false);
        overlays.show_progress(" hello world", false);

        let live = instance.live_decorations();
        assert_eq!(live.len(), 1);
        let content = live[0].content().unwrap();
        assert_eq!(content.text.as_deref(), Some(" hello world"));
        assert_eq!(content.style.width, OverlayWidth::Percent(75.0));
        assert!(overlays.has_progress(ProgressSlot::Live));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_preview_replaces_live_and_expires() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        overlays.show_progress(" typing", false);
        overlays.show_progress("Sending", true);

        assert!(!overlays.has_progress(ProgressSlot::Live));
        assert!(overlays.has_progress(ProgressSlot::Preview));
        assert_eq!(instance.live_decorations().len(), 1);

        tokio::time::sleep(PREVIEW_LIFETIME + Duration::from_millis(1)).await;
        assert!(!overlays.has_progress(ProgressSlot::Preview));
        assert_eq!(instance.live_decorations().len(), 0);
        assert_eq!(instance.live_marker_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_all_is_idempotent() {
        let (mut overlays, instance) = manager_on(geometry(5, false));
        overlays.show_status(false);
        overlays.show_progress(" a", false);
        overlays.show_progress(" b", true);
        assert_eq!(overlays.active_count(), 2);

        overlays.dispose_all();
        overlays.dispose_all();
        assert_eq!(overlays.active_count(), 0);
        assert_eq!(instance.live_marker_count(), 0);
        assert!(instance.live_decorations().is_empty());
    }

    #[tokio::test]
    async fn test_no_active_console_is_noop() {
        let console = Arc::new(MockConsole::empty());
        let mut overlays = OverlayManager::new(console, "Accept");
        assert!(!overlays.show_status(false));
        assert!(!overlays.show_progress(" text", false));
        assert_eq!(overlays.active_count(), 0);
    }

    #[tokio::test]
    async fn test_marker_refusal_skips_render() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        instance.refuse_markers(true);
        assert!(!overlays.show_status(false));
        assert!(instance.decorations().is_empty());

        instance.refuse_markers(false);
        assert!(overlays.show_status(false));
    }

    #[tokio::test]
    async fn test_drop_disposes_overlays() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        overlays.show_status(false);
        overlays.show_progress(" a", false);
        drop(overlays);
        assert_eq!(instance.live_marker_count(), 0);
    }

    #[tokio::test]
    async fn test_take_chat_overlays() {
        let (mut overlays, instance) = manager_on(geometry(0, false));
        overlays.show_status(true);
        overlays.show_progress("Sending", true);

        let mut handed = overlays.take_chat_overlays();
        assert_eq!(overlays.active_count(), 0);
        assert!(handed.hint.is_some());
        assert!(handed.preview.is_some());
        assert_eq!(instance.live_decorations().len(), 2);

        handed.dispose();
        assert!(instance.live_decorations().is_empty());
    }
}
