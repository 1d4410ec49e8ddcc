//! Sticky/fixed element handling for full-page capture.
//!
//! Elements that do not scroll with the page would repeat in every tile of
//! a scroll-and-stitch capture. This crate discovers them, classifies them
//! (cookie banner, known widget, header, footer, sidebar, widget, other),
//! captures header/footer bands once for later recomposition, re-anchors
//! everything else into the document layer, and records every change with
//! a style snapshot sufficient for exact reversal.

pub mod classify;
pub mod errors;
pub mod handler;
pub mod models;

pub use classify::classify;
pub use errors::StickyError;
pub use handler::StickyGuard;
pub use models::*;
