//! Full-page capture orchestration.
//!
//! The engine drives one capture session end to end: probe the page for
//! infinite scrolling, plan scroll offsets, neutralize sticky elements
//! once, capture each viewport tile with retries and rate limiting,
//! stitch the tiles into one raster, and close the integrity hash chain.
//! Cleanup (sticky restore, scroll restore, overflow restore) runs
//! unconditionally, whether the session completed, failed, timed out or
//! was cancelled.

pub mod errors;
pub mod orchestrator;
pub mod planner;
pub mod result;
pub mod scroll_probe;
pub mod session;

pub use errors::CaptureError;
pub use orchestrator::CaptureEngine;
pub use planner::{plan, PlanPolicy, TilePlan};
pub use result::{CaptureResult, CaptureScope, DualModeCapture, ModeCapture};
pub use scroll_probe::{InfiniteScrollDetector, ProbeConfig, ScrollProbeReport};
pub use session::CaptureSession;

pub use pageproof_core_types::{
    CaptureConfig, CaptureStage, ImageFormat, NullProgressSink, ProgressSink, ProgressUpdate,
    TruncationReason,
};
pub use tokio_util::sync::CancellationToken;
