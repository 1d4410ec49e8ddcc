//! Tile compositing for full-page capture.
//!
//! Takes the ordered viewport tiles produced by the capture loop plus the
//! one-time header/footer band captures and composites them into a single
//! raster at physical-pixel resolution. Because sticky elements were
//! neutralized before capture, tiles need no edge blending or overlap
//! trimming; the only geometry work is DPR scaling and band cropping.

pub mod compose;
pub mod errors;
pub mod models;

pub use compose::Stitcher;
pub use errors::StitchError;
pub use models::{StitchOptions, StitchedImage};
