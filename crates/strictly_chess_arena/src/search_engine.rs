//! Search engine seam.

use strictly_chess::{EngineError, EngineResponse, SearchRequest};
use tokio::sync::mpsc;

/// Sending half for tagged engine replies.
pub type ResponseSender = mpsc::UnboundedSender<EngineResponse>;

/// Receiving half for tagged engine replies.
pub type ResponseReceiver = mpsc::UnboundedReceiver<EngineResponse>;

/// Trait for move-search backends.
///
/// Replies are not returned from these calls. Every implementation delivers
/// them, tagged with the session of the request, on the channel it was
/// built with, so the driver never blocks on a search.
#[async_trait::async_trait]
pub trait SearchEngine: Send {
    /// Starts the handshake; a `Ready` reply follows when it completes.
    async fn initialize(&mut self) -> Result<(), EngineError>;

    /// Starts a search.
    async fn submit(&mut self, request: &SearchRequest) -> Result<(), EngineError>;

    /// Asks the engine to abandon its current search.
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Returns the engine's display name.
    fn name(&self) -> &str;
}
