pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{ConfigProvider, TermVoiceConfig};
pub use error::{Result, TermVoiceError};
pub use events::{RecognitionEvent, SessionEvent};
pub use types::*;
