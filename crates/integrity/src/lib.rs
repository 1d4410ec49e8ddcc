//! Integrity hashing for forensically-defensible captures.
//!
//! Two jobs: hash capture artifacts (image bytes, HTML, JSON metadata)
//! under a bounded timeout, and prove the page was returned to its
//! original layout by comparing DOM-structure signatures taken before any
//! mutation and after restoration.

pub mod chain;
pub mod errors;
pub mod hash;
pub mod signature;

pub use chain::{IntegrityHashChain, IntegrityHashes};
pub use errors::IntegrityError;
pub use hash::HashService;
pub use signature::{dom_signature, SignatureOptions};
