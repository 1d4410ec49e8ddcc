//! Per-capture session state.

use chrono::{DateTime, Utc};
use pageproof_core_types::{CaptureId, CaptureStage, TruncationReason, ViewportTile};
use sticky_guard::StickyHandlingResult;

use crate::result::CaptureScope;

/// State of one capture attempt, owned exclusively by the orchestrator
/// for the session's lifetime and discarded once the result is returned.
#[derive(Debug)]
pub struct CaptureSession {
    pub id: CaptureId,
    pub url: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub stage: CaptureStage,
    pub tiles: Vec<ViewportTile>,
    pub sticky: Option<StickyHandlingResult>,
    pub scope: Option<CaptureScope>,
    /// Caller scroll position to restore during cleanup.
    pub original_scroll: f64,
    /// Body overflow value to restore during cleanup.
    pub original_overflow: String,
}

impl CaptureSession {
    pub fn new(url: String, title: String, original_scroll: f64, original_overflow: String) -> Self {
        Self {
            id: CaptureId::new(),
            url,
            title,
            started_at: Utc::now(),
            stage: CaptureStage::Initializing,
            tiles: Vec::new(),
            sticky: None,
            scope: None,
            original_scroll,
            original_overflow,
        }
    }

    /// Logical height covered by the tiles captured so far.
    pub fn captured_span(&self) -> f64 {
        self.tiles
            .last()
            .map(|tile| tile.scroll_offset_y + tile.height)
            .unwrap_or(0.0)
    }

    /// Mark the session truncated at the current tile set.
    pub fn truncate(&mut self, reason: TruncationReason) {
        let span = self.captured_span();
        if let Some(scope) = self.scope.as_mut() {
            scope.was_truncated = true;
            scope.truncation_reason = Some(reason);
            scope.captured_height = span;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(offset: f64, height: f64) -> ViewportTile {
        ViewportTile {
            scroll_offset_y: offset,
            crop_top: 0.0,
            image_bytes: vec![],
            width: 800.0,
            height,
            captured_at_dpr: 1.0,
        }
    }

    #[test]
    fn captured_span_follows_the_last_tile() {
        let mut session =
            CaptureSession::new("https://a.test".into(), "A".into(), 0.0, "visible".into());
        assert_eq!(session.captured_span(), 0.0);
        session.tiles.push(tile(0.0, 600.0));
        session.tiles.push(tile(600.0, 400.0));
        assert_eq!(session.captured_span(), 1_000.0);
    }

    #[test]
    fn truncate_rewrites_the_scope() {
        let mut session =
            CaptureSession::new("https://a.test".into(), "A".into(), 0.0, "visible".into());
        session.scope = Some(CaptureScope {
            total_page_height: 6_000.0,
            captured_height: 6_000.0,
            was_truncated: false,
            truncation_reason: None,
            infinite_scroll_detected: false,
            scroll_height_growth_ratio: 0.0,
        });
        session.tiles.push(tile(0.0, 600.0));
        session.truncate(TruncationReason::Timeout);

        let scope = session.scope.unwrap();
        assert!(scope.was_truncated);
        assert_eq!(scope.truncation_reason, Some(TruncationReason::Timeout));
        assert_eq!(scope.captured_height, 600.0);
    }
}
