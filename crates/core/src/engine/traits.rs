//! Trait definitions for transcode engines.

use std::sync::Arc;

use super::listener::CompressionListener;
use super::types::{EngineJobHandle, EngineRequest};

/// An external engine that transcodes one file at a time per request.
///
/// `start` never fails synchronously: every outcome, including failures to
/// launch, is reported through the listener.
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Starts a transcode and returns a handle for cancelling it.
    fn start(
        &self,
        request: EngineRequest,
        listener: Arc<dyn CompressionListener>,
    ) -> EngineJobHandle;

    /// Requests cancellation. The engine answers with `on_cancelled` or, if it
    /// already finished, with whatever terminal callback it was about to send.
    fn cancel(&self, handle: &EngineJobHandle);
}
