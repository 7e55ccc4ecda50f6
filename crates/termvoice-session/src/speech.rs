use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use termvoice_core::error::Result;
use termvoice_core::events::RecognitionEvent;

/// Ordered events of one recognition session.
pub type RecognitionStream = mpsc::Receiver<RecognitionEvent>;

/// Speech-to-text engine.
///
/// Implementations should stop producing events once `token` is cancelled.
/// The session drops anything that still arrives afterwards.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn create_session(&self, token: CancellationToken) -> Result<RecognitionStream>;
}
