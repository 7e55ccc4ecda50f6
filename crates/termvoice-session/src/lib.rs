//! termvoice session crate - voice session state machine, overlays, and commit scheduling.
//!
//! Turns a stream of speech-recognition events into a normalized text buffer,
//! transient overlays on a console surface, and a final commit of the text
//! into that console. The lifecycle is a strict state machine:
//! Idle -> Recording -> Stopped -> Recording -> ...

pub mod announce;
pub mod console;
pub mod controller;
pub mod mock;
pub mod normalize;
pub mod overlay;
pub mod runtime;
pub mod scheduler;
pub mod speech;
pub mod state;

pub use announce::{Announcer, TracingAnnouncer};
pub use console::{ConsoleInstance, ConsoleService, Decoration, DecorationOptions, Marker};
pub use controller::{SessionController, SessionInput};
pub use normalize::normalize;
pub use overlay::{Overlay, OverlayManager, ProgressSlot};
pub use runtime::{SessionHandle, SessionRuntime, SessionSnapshot};
pub use scheduler::{CommitScheduler, DelayedTask, SessionSignal};
pub use speech::{RecognitionStream, SpeechService};
pub use state::{SessionStatus, StateMachine};
