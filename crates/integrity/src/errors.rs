use page_port::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hash computation exceeded its time budget")]
    HashTimeout,

    #[error("hash task failed: {0}")]
    TaskFailed(String),

    #[error("page port error: {0}")]
    Port(#[from] PortError),

    #[error("metadata serialization failed: {0}")]
    Serialize(String),

    #[error("missing {0} snapshot")]
    MissingSnapshot(&'static str),
}
