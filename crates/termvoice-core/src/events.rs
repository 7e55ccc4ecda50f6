use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Timestamp;

/// A status update from a speech-to-text stream.
///
/// Events of one stream are consumed once, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// The engine began listening.
    Started,
    /// Partial hypothesis for the utterance in progress.
    Recognizing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Finalized utterance.
    Recognized {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// The engine ended the stream.
    Stopped,
}

impl RecognitionEvent {
    pub fn recognizing(text: impl Into<String>) -> Self {
        RecognitionEvent::Recognizing {
            text: Some(text.into()),
        }
    }

    pub fn recognized(text: impl Into<String>) -> Self {
        RecognitionEvent::Recognized {
            text: Some(text.into()),
        }
    }

    /// The carried text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        match self {
            RecognitionEvent::Recognizing { text } | RecognitionEvent::Recognized { text } => {
                text.as_deref().filter(|t| !t.is_empty())
            }
            RecognitionEvent::Started | RecognitionEvent::Stopped => None,
        }
    }

    /// Short lowercase name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RecognitionEvent::Started => "started",
            RecognitionEvent::Recognizing { .. } => "recognizing",
            RecognitionEvent::Recognized { .. } => "recognized",
            RecognitionEvent::Stopped => "stopped",
        }
    }
}

/// Why a session stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The host called `stop`.
    Requested,
    /// The silence timeout elapsed after a finalized utterance.
    SilenceTimeout,
    /// A finalized utterance arrived in chat mode.
    ChatAccepted,
    /// The recognition engine ended the stream.
    EngineStopped,
    /// A new session replaced this one.
    Replaced,
}

/// Notifications published by the session controller.
///
/// Hosts subscribe to these to mirror session progress elsewhere (status
/// bars, logs) without reaching into controller state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A session began recording.
    Started {
        session_id: Uuid,
        chat_mode: bool,
        timestamp: Timestamp,
    },
    /// The normalized input text changed.
    TextUpdated {
        session_id: Uuid,
        text: String,
        is_final: bool,
    },
    /// Text was sent to the console.
    Committed {
        session_id: Uuid,
        text: String,
        executed: bool,
        timestamp: Timestamp,
    },
    /// A session stopped.
    Stopped {
        session_id: Uuid,
        reason: StopReason,
        timestamp: Timestamp,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_event_wire_format() {
        let event: RecognitionEvent =
            serde_json::from_str(r#"{"status":"recognizing","text":"hello"}"#).unwrap();
        assert_eq!(event, RecognitionEvent::recognizing("hello"));

        let event: RecognitionEvent = serde_json::from_str(r#"{"status":"started"}"#).unwrap();
        assert_eq!(event, RecognitionEvent::Started);

        let event: RecognitionEvent = serde_json::from_str(r#"{"status":"recognized"}"#).unwrap();
        assert_eq!(event, RecognitionEvent::Recognized { text: None });
    }

    #[test]
    fn test_recognition_event_text_ignores_empty() {
        assert_eq!(RecognitionEvent::recognized("hi").text(), Some("hi"));
        assert_eq!(RecognitionEvent::recognized("").text(), None);
        assert_eq!(RecognitionEvent::Recognizing { text: None }.text(), None);
        assert_eq!(RecognitionEvent::Stopped.text(), None);
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(RecognitionEvent::Started.kind(), "started");
        assert_eq!(RecognitionEvent::recognizing("a").kind(), "recognizing");
        assert_eq!(RecognitionEvent::recognized("a").kind(), "recognized");
        assert_eq!(RecognitionEvent::Stopped.kind(), "stopped");
    }

    #[test]
    fn test_session_event_serializes() {
        let event = SessionEvent::Stopped {
            session_id: Uuid::nil(),
            reason: StopReason::SilenceTimeout,
            timestamp: Timestamp(0),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("silence_timeout"));
    }
}
