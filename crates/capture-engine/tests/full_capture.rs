//! End-to-end engine tests against the in-memory fake page.

use std::sync::Arc;

use capture_engine::{
    CancellationToken, CaptureConfig, CaptureEngine, CaptureError, CaptureResult, ProgressSink,
    ProgressUpdate, TruncationReason,
};
use page_port::fake::{FakePage, FakePageConfig};
use page_port::{FixedElementInfo, NodeHandle};
use pageproof_core_types::Rect;

/// Millisecond-scale waits so a full session runs in tens of ms.
fn fast_config() -> CaptureConfig {
    CaptureConfig {
        render_settle_ms: 1,
        lazy_image_timeout_ms: 20,
        min_between_captures_ms: 1,
        capture_retry_backoff_ms: 1,
        viewport_timeout_ms: 1_000,
        hash_timeout_ms: 2_000,
        max_capture_time_ms: 30_000,
        max_capture_time_ms_infinite_scroll: 30_000,
        ..CaptureConfig::default()
    }
}

fn engine(page: &Arc<FakePage>, config: CaptureConfig) -> CaptureEngine {
    CaptureEngine::new(page.clone(), page.clone(), config)
}

fn decoded_dims(result: &CaptureResult) -> (u32, u32) {
    let img = image::load_from_memory(&result.image_data).unwrap();
    (img.width(), img.height())
}

fn header_element() -> FixedElementInfo {
    FixedElementInfo {
        handle: NodeHandle(1),
        selector: "header.site".to_string(),
        tag_name: "header".to_string(),
        id: None,
        classes: vec!["site".to_string()],
        text_excerpt: "Site title".to_string(),
        rect: Rect::new(0.0, 0.0, 100.0, 16.0),
        z_index: Some(50),
        has_explicit_offsets: false,
        position: "fixed".to_string(),
    }
}

fn widget_element() -> FixedElementInfo {
    FixedElementInfo {
        handle: NodeHandle(2),
        selector: "#helper".to_string(),
        tag_name: "div".to_string(),
        id: Some("helper".to_string()),
        classes: vec![],
        text_excerpt: String::new(),
        rect: Rect::new(70.0, 50.0, 20.0, 20.0),
        z_index: Some(99_999),
        has_explicit_offsets: true,
        position: "fixed".to_string(),
    }
}

#[tokio::test]
async fn fixed_page_is_captured_in_full() {
    // 400 px page, 80 px viewport: five tiles.
    let page = Arc::new(FakePage::with_height(400.0));
    let result = engine(&page, fast_config())
        .capture_page(CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(decoded_dims(&result), (100, 400));
    assert_eq!((result.width, result.height), (100, 400));
    assert!(result.image_hash.starts_with("img_"));

    let scope = result.capture_scope.as_ref().unwrap();
    assert!(!scope.was_truncated);
    assert_eq!(scope.truncation_reason, None);
    assert_eq!(scope.total_page_height, 400.0);
    assert_eq!(scope.captured_height, 400.0);
    assert!(!scope.infinite_scroll_detected);

    let integrity = result.integrity_hashes.unwrap();
    assert!(integrity.integrity_verified);
    assert_eq!(integrity.captured_image_hash, result.image_hash);

    // Cleanup restored the caller's world.
    assert_eq!(page.current_scroll(), 0.0);
    assert_eq!(page.current_body_overflow(), "visible");
}

#[tokio::test]
async fn tall_page_is_truncated_at_the_height_cap() {
    let page = Arc::new(FakePage::with_height(2_000.0));
    let config = CaptureConfig {
        max_capture_height: 240.0,
        ..fast_config()
    };
    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();

    let scope = result.capture_scope.as_ref().unwrap();
    assert!(scope.was_truncated);
    assert_eq!(
        scope.truncation_reason,
        Some(TruncationReason::MaxHeightExceeded)
    );
    assert_eq!(scope.captured_height, 240.0);
    assert_eq!(decoded_dims(&result), (100, 240));
}

#[tokio::test]
async fn transient_capture_failures_are_retried() {
    let page = Arc::new(FakePage::with_height(400.0));
    page.fail_next_captures(2);

    let result = engine(&page, fast_config())
        .capture_page(CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success);
    // Five tiles plus the two failed attempts on the first one.
    assert_eq!(page.capture_count(), 7);
}

#[tokio::test]
async fn exhausted_retries_fail_the_session_but_cleanup_runs() {
    let page = Arc::new(FakePage::with_height(400.0));
    page.fail_all_captures();

    let err = engine(&page, fast_config())
        .capture_page(CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        CaptureError::Failed { message, .. } => {
            assert!(message.contains("3 attempts"), "message: {message}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(page.capture_count(), 3);
    assert_eq!(page.current_body_overflow(), "visible");
    assert_eq!(page.current_scroll(), 0.0);
}

struct CancelAtTile {
    token: CancellationToken,
    at: u32,
}

impl ProgressSink for CancelAtTile {
    fn report(&self, update: ProgressUpdate) {
        if update.current_tile == Some(self.at) {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_mid_loop_still_stitches_captured_tiles() {
    // 800 px page, 80 px viewport: ten planned tiles, cancelled after 5.
    let page = Arc::new(FakePage::with_height(800.0));
    let token = CancellationToken::new();
    let sink = Arc::new(CancelAtTile {
        token: token.clone(),
        at: 5,
    });
    let engine = CaptureEngine::with_progress(page.clone(), page.clone(), fast_config(), sink);

    let result = engine.capture_page(token).await.unwrap();
    let scope = result.capture_scope.as_ref().unwrap();
    assert!(scope.was_truncated);
    assert_eq!(scope.truncation_reason, Some(TruncationReason::Cancelled));
    assert_eq!(scope.captured_height, 400.0);
    assert_eq!(decoded_dims(&result), (100, 400));
    assert_eq!(page.current_body_overflow(), "visible");
}

#[tokio::test]
async fn cancellation_before_the_first_tile_cancels_the_session() {
    let page = Arc::new(FakePage::with_height(400.0));
    let token = CancellationToken::new();
    token.cancel();

    let err = engine(&page, fast_config())
        .capture_page(token)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::Cancelled));
    assert_eq!(page.current_body_overflow(), "visible");
}

#[tokio::test]
async fn session_timeout_truncates_instead_of_failing() {
    let page = Arc::new(FakePage::with_height(800.0));
    let config = CaptureConfig {
        max_capture_time_ms: 1,
        max_capture_time_ms_infinite_scroll: 1,
        render_settle_ms: 5,
        ..fast_config()
    };

    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();
    let scope = result.capture_scope.as_ref().unwrap();
    assert!(scope.was_truncated);
    assert_eq!(scope.truncation_reason, Some(TruncationReason::Timeout));
    // The first tile always lands; the budget is checked from the second
    // iteration on.
    assert!(scope.captured_height >= 80.0);
    assert!(scope.captured_height < 800.0);
}

#[tokio::test]
async fn concurrent_session_is_rejected_not_queued() {
    let page = Arc::new(FakePage::with_height(400.0));
    let config = CaptureConfig {
        render_settle_ms: 50,
        ..fast_config()
    };
    let engine = Arc::new(CaptureEngine::new(page.clone(), page.clone(), config));

    let background = tokio::spawn({
        let engine = engine.clone();
        async move { engine.capture_page(CancellationToken::new()).await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(engine.is_capturing());
    assert!(matches!(
        engine.capture_page(CancellationToken::new()).await,
        Err(CaptureError::CaptureInProgress)
    ));

    let first = background.await.unwrap().unwrap();
    assert!(first.success);
    assert!(!engine.is_capturing());
}

#[tokio::test]
async fn infinite_scroll_is_detected_and_capped() {
    let page = Arc::new(FakePage::new(FakePageConfig {
        document_height: 200.0,
        growth_per_reach: 200.0,
        growth_limit: 2_000.0,
        ..FakePageConfig::default()
    }));
    let config = CaptureConfig {
        max_height_before_split: 100.0,
        infinite_scroll_max_height: 240.0,
        ..fast_config()
    };

    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();
    let scope = result.capture_scope.as_ref().unwrap();
    assert!(scope.infinite_scroll_detected);
    assert!(scope.scroll_height_growth_ratio > 0.15);
    assert!(scope.was_truncated);
    assert_eq!(
        scope.truncation_reason,
        Some(TruncationReason::InfiniteScrollDetected)
    );
    assert_eq!(scope.captured_height, 240.0);
    assert_eq!(decoded_dims(&result), (100, 240));
}

#[tokio::test]
async fn dual_mode_pairs_raw_and_enhanced_captures() {
    let page = Arc::new(FakePage::with_height(400.0));
    page.add_fixed_element(header_element());
    page.add_fixed_element(widget_element());
    let config = CaptureConfig {
        dual_mode: true,
        ..fast_config()
    };

    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();
    let dual = result.dual_mode_capture.expect("dual mode capture");

    assert!(dual.raw.modifications.is_empty());
    assert!(dual.raw.captured_at <= dual.enhanced.captured_at);
    assert!(dual.time_difference_ms >= 0);
    assert!(dual
        .enhanced
        .modifications
        .iter()
        .any(|m| m.contains("overflow suppressed")));
    assert!(dual.enhanced.modifications.len() >= 3);
    assert!(dual.raw.image_hash.starts_with("img_"));
    assert!(dual.enhanced.image_hash.starts_with("img_"));
}

#[tokio::test]
async fn sticky_elements_are_restored_and_integrity_verifies() {
    let page = Arc::new(FakePage::with_height(400.0));
    let header = page.add_fixed_element(header_element());
    let widget = page.add_fixed_element(widget_element());

    let result = engine(&page, fast_config())
        .capture_page(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(page.inline_style(header).unwrap(), "");
    assert_eq!(page.inline_style(widget).unwrap(), "");
    assert!(result.integrity_hashes.unwrap().integrity_verified);
}

#[tokio::test]
async fn single_viewport_page_skips_sticky_handling() {
    let page = Arc::new(FakePage::with_height(60.0));
    let header = page.add_fixed_element(header_element());
    let config = CaptureConfig {
        dual_mode: true,
        ..fast_config()
    };

    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();

    // One planned offset: the handler never runs, the page keeps its
    // natural appearance and no enhanced capture exists to pair.
    assert_eq!(decoded_dims(&result), (100, 80));
    assert!(result.dual_mode_capture.is_none());
    assert_eq!(page.inline_style(header).unwrap(), "");
}

#[tokio::test]
async fn optional_blocks_follow_configuration() {
    let page = Arc::new(FakePage::with_height(400.0));
    let config = CaptureConfig {
        include_html: true,
        include_metadata: true,
        ..fast_config()
    };

    let result = engine(&page, config)
        .capture_page(CancellationToken::new())
        .await
        .unwrap();

    assert!(result.html_content.as_deref().unwrap().contains("<html>"));
    assert!(result.html_hash.as_deref().unwrap().starts_with("html_"));
    let metadata = result.metadata.clone().unwrap();
    assert_eq!(metadata["url"], "https://fake.test/page");
    assert!(result
        .metadata_hash
        .as_deref()
        .unwrap()
        .starts_with("meta_"));

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("htmlContent").is_some());
    assert!(json.get("metadataHash").is_some());
    assert!(json.get("captureScope").is_some());
    assert!(json.get("integrityHashes").is_some());
}
