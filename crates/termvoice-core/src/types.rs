use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Time
// =============================================================================

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}

// =============================================================================
// Console geometry
// =============================================================================

/// Cursor and viewport dimensions of a console instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleGeometry {
    /// Cursor row within the buffer, if known.
    pub cursor_row: Option<u32>,
    /// Cursor column, if known.
    pub cursor_column: Option<u16>,
    /// Width of the console in columns.
    pub total_columns: u16,
    /// Whether the cursor sits on the console's first row.
    pub is_first_row: bool,
}

impl ConsoleGeometry {
    /// Horizontal anchor for an overlay next to the cursor.
    ///
    /// The first row reserves a wider offset than the rest.
    pub fn anchor_x(&self) -> u16 {
        let column = self.cursor_column.unwrap_or(0);
        if self.is_first_row {
            column.saturating_add(4)
        } else {
            column.saturating_add(1)
        }
    }

    /// Share of the console width to the right of the cursor, in percent.
    pub fn remaining_width_percent(&self) -> f32 {
        if self.total_columns == 0 {
            return 100.0;
        }
        let column = self.cursor_column.unwrap_or(0).min(self.total_columns);
        let remaining = self.total_columns - column;
        f32::from(remaining) / f32::from(self.total_columns) * 100.0
    }
}

// =============================================================================
// Overlay rendering
// =============================================================================

/// Layer a decoration is painted on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationLayer {
    #[default]
    Top,
}

/// Horizontal extent of an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayWidth {
    Auto,
    Columns(u16),
    Percent(f32),
}

/// Presentation attributes applied to an overlay element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub classes: Vec<String>,
    pub background: Option<String>,
    pub width: OverlayWidth,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            background: None,
            width: OverlayWidth::Auto,
        }
    }
}

impl OverlayStyle {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// What an overlay displays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayContent {
    pub icon: Option<String>,
    pub text: Option<String>,
    pub style: OverlayStyle,
}

// =============================================================================
// Tests
// =============================================================================
