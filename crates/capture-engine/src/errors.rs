use integrity_chain::IntegrityError;
use page_port::PortError;
use sticky_guard::StickyError;
use thiserror::Error;
use tile_stitcher::StitchError;

/// User-facing session errors. Expected conditions are typed; the
/// technical detail behind a `Failed` is logged through tracing, not
/// shown to end users.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A session is already active; concurrent starts are rejected, not
    /// queued.
    #[error("a capture is already in progress")]
    CaptureInProgress,

    /// The session was cancelled before producing anything stitchable.
    #[error("capture cancelled")]
    Cancelled,

    #[error("{message} (after {duration_ms} ms)")]
    Failed { message: String, duration_ms: u64 },
}

/// Internal fault taxonomy threaded through the orchestrator. Mapped to
/// [`CaptureError`] at the public boundary.
#[derive(Debug, Error)]
pub(crate) enum EngineError {
    #[error("cancelled")]
    Cancelled,

    #[error("viewport capture failed after {attempts} attempts: {last}")]
    CaptureExhausted { attempts: u32, last: PortError },

    #[error("page access failed: {0}")]
    Port(#[from] PortError),

    #[error("sticky element handling failed: {0}")]
    Sticky(#[from] StickyError),

    #[error("stitching failed: {0}")]
    Stitch(#[from] StitchError),

    #[error("integrity hashing failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("internal task failed: {0}")]
    Internal(String),
}
