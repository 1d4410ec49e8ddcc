use page_port::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StickyError {
    /// `handle()` was called again without an intervening `restore()`.
    #[error("sticky handling already active for this session")]
    HandleAlreadyActive,

    #[error("page port error: {0}")]
    Port(#[from] PortError),

    #[error("band image processing failed: {0}")]
    Image(String),
}
