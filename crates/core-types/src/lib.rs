//! Shared primitives for the pageproof capture engine crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one capture session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub String);

impl CaptureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CaptureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rectangle in logical (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Image format for captured rasters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless; required for integrity hashing.
    Png,
    Jpeg,
}

/// One viewport screenshot taken at a planned scroll offset.
///
/// Tiles are ordered by strictly increasing `scroll_offset_y` and their
/// bands (after DPR scaling) exactly cover `[0, capped_height)` without
/// overlap. `crop_top` is how far into the raster the tile's band begins;
/// it is non-zero only when the host clamped the requested scroll offset
/// near the document end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportTile {
    pub scroll_offset_y: f64,
    pub crop_top: f64,
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    /// Logical viewport width at capture time.
    pub width: f64,
    /// Logical height of the band this tile contributes.
    pub height: f64,
    pub captured_at_dpr: f64,
}

/// Which page band a one-time capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Header,
    Footer,
}

/// A header or footer raster captured once before neutralization, to be
/// recomposed at the top/bottom of the stitched image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandCapture {
    pub role: BandRole,
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    pub logical_width: f64,
    pub logical_height: f64,
}

/// Why a capture covered less than the full page height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    InfiniteScrollDetected,
    MaxHeightExceeded,
    Timeout,
    Cancelled,
}

/// Linear capture pipeline stages. `Failed` and `Cancelled` are parallel
/// terminals; everything after `Hashing` is driven by external
/// collaborators through the progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    Initializing,
    Lockdown,
    WaitingResources,
    Capturing,
    Stitching,
    Hashing,
    Timestamp,
    Uploading,
    OpeningPreview,
    Complete,
    Failed,
    Cancelled,
}

impl CaptureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Lockdown => "lockdown",
            Self::WaitingResources => "waiting_resources",
            Self::Capturing => "capturing",
            Self::Stitching => "stitching",
            Self::Hashing => "hashing",
            Self::Timestamp => "timestamp",
            Self::Uploading => "uploading",
            Self::OpeningPreview => "opening_preview",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pipeline percent at which this stage begins. The capturing stage
    /// interpolates between its base and the stitching base.
    pub fn base_percent(&self) -> u8 {
        match self {
            Self::Initializing => 2,
            Self::Lockdown => 6,
            Self::WaitingResources => 10,
            Self::Capturing => 15,
            Self::Stitching => 80,
            Self::Hashing => 88,
            Self::Timestamp => 92,
            Self::Uploading => 96,
            Self::OpeningPreview => 98,
            Self::Complete => 100,
            Self::Failed | Self::Cancelled => 100,
        }
    }
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress report emitted at every stage transition and once per tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub stage: CaptureStage,
    /// 0-100, monotonically non-decreasing across the whole pipeline.
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tile: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tiles: Option<u32>,
}

impl ProgressUpdate {
    pub fn stage(stage: CaptureStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent,
            message: message.into(),
            current_tile: None,
            total_tiles: None,
        }
    }
}

/// Sink for progress updates. Implementations must be cheap and
/// non-blocking; the orchestrator calls them inline from the capture loop.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Sink that discards every update.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Recognized capture options. Field names on the wire match the
/// configuration surface exposed to embedders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Budget for the initial page-load settle, milliseconds.
    #[serde(rename = "pageLoadTimeout")]
    pub page_load_timeout_ms: u64,
    /// Budget for one viewport capture round trip, milliseconds.
    #[serde(rename = "viewportTimeout")]
    pub viewport_timeout_ms: u64,
    /// Budget for one hash computation, milliseconds.
    #[serde(rename = "hashTimeout")]
    pub hash_timeout_ms: u64,
    pub format: ImageFormat,
    /// Pages at or below this height skip infinite-scroll probing.
    pub max_height_before_split: f64,
    /// Height cap for pages with a fixed length, logical pixels.
    pub max_capture_height: f64,
    /// Height cap once infinite scrolling was detected, logical pixels.
    pub infinite_scroll_max_height: f64,
    /// How many viewport-heights the detector force-scrolls through.
    pub infinite_scroll_detection_viewports: u32,
    /// Document growth ratio above which a page counts as infinite.
    pub infinite_scroll_growth_threshold: f64,
    pub max_capture_time_ms: u64,
    pub max_capture_time_ms_infinite_scroll: u64,
    /// Pause after each scroll before capturing, milliseconds.
    pub render_settle_ms: u64,
    /// Base budget for in-viewport lazy images; scaled by connection class.
    pub lazy_image_timeout_ms: u64,
    /// Minimum delay between two viewport captures (host rate limit).
    pub min_between_captures_ms: u64,
    pub capture_retry_max: u32,
    pub capture_retry_backoff_ms: u64,
    /// Stitched canvases taller than this log a warning but proceed.
    pub max_canvas_height_px: u32,
    /// Exclude invisible elements from the DOM-structure signature.
    pub exclude_invisible_elements: bool,
    pub include_html: bool,
    pub include_metadata: bool,
    pub dual_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_ms: 30_000,
            viewport_timeout_ms: 10_000,
            hash_timeout_ms: 5_000,
            format: ImageFormat::Png,
            max_height_before_split: 5_000.0,
            max_capture_height: 120_000.0,
            infinite_scroll_max_height: 30_000.0,
            infinite_scroll_detection_viewports: 3,
            infinite_scroll_growth_threshold: 0.15,
            max_capture_time_ms: 120_000,
            max_capture_time_ms_infinite_scroll: 180_000,
            render_settle_ms: 350,
            lazy_image_timeout_ms: 3_000,
            min_between_captures_ms: 500,
            capture_retry_max: 3,
            capture_retry_backoff_ms: 400,
            max_canvas_height_px: 16_384,
            exclude_invisible_elements: true,
            include_html: false,
            include_metadata: false,
            dual_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_id_is_unique() {
        assert_ne!(CaptureId::new(), CaptureId::new());
    }

    #[test]
    fn stage_percent_is_monotonic_over_linear_stages() {
        let stages = [
            CaptureStage::Initializing,
            CaptureStage::Lockdown,
            CaptureStage::WaitingResources,
            CaptureStage::Capturing,
            CaptureStage::Stitching,
            CaptureStage::Hashing,
            CaptureStage::Timestamp,
            CaptureStage::Uploading,
            CaptureStage::OpeningPreview,
            CaptureStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].base_percent() < pair[1].base_percent());
        }
    }

    #[test]
    fn config_round_trips_camel_case() {
        let cfg = CaptureConfig::default();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["maxCaptureHeight"], 120_000.0);
        assert_eq!(json["infiniteScrollGrowthThreshold"], 0.15);
        assert_eq!(json["pageLoadTimeout"], 30_000);
        assert_eq!(json["maxCaptureTimeMs"], 120_000);
        assert_eq!(json["format"], "png");

        let parsed: CaptureConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.capture_retry_max, 3);
    }

    #[test]
    fn truncation_reason_uses_snake_case() {
        let json = serde_json::to_string(&TruncationReason::MaxHeightExceeded).unwrap();
        assert_eq!(json, "\"max_height_exceeded\"");
        let json = serde_json::to_string(&TruncationReason::InfiniteScrollDetected).unwrap();
        assert_eq!(json, "\"infinite_scroll_detected\"");
    }
}
