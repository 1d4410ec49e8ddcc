use thiserror::Error;

/// Errors surfaced by page ports and capture providers.
#[derive(Debug, Error)]
pub enum PortError {
    /// The host capture primitive rejected or failed the request.
    #[error("viewport capture failed: {0}")]
    CaptureFailed(String),

    /// The capture round trip exceeded its deadline.
    #[error("viewport capture timed out")]
    CaptureTimeout,

    /// A previously handed-out element handle no longer resolves.
    #[error("element gone: {0}")]
    ElementGone(String),

    /// Page-side evaluation failed.
    #[error("page script failed: {0}")]
    ScriptFailed(String),

    /// The capability is not available in this host environment.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl PortError {
    /// Whether a retry of the same operation can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CaptureFailed(_) | Self::CaptureTimeout)
    }
}
