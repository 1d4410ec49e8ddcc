//! Capability surface between the capture engine and a live page.
//!
//! The engine never talks to a rendering surface directly. It consumes two
//! narrow traits: [`PagePort`] for DOM inspection, scrolling and reversible
//! style mutation, and [`ViewportCapture`] for the host's opaque
//! screenshot primitive. Real adapters (DevTools, extension runtime) live
//! with their hosts; this crate only defines the contract plus a
//! deterministic in-memory [`fake::FakePage`] for tests (feature
//! `fake-page`).

pub mod errors;
pub mod models;
pub mod port;

#[cfg(feature = "fake-page")]
pub mod fake;

pub use errors::PortError;
pub use models::*;
pub use port::{PagePort, ViewportCapture};
