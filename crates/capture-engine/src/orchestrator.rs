//! The capture state machine.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use integrity_chain::{HashService, IntegrityHashChain, SignatureOptions};
use page_port::{PagePort, PortError, ScrollBehavior, ViewportCapture, ViewportMetrics};
use pageproof_core_types::{
    CaptureConfig, CaptureStage, ImageFormat, NullProgressSink, ProgressSink, ProgressUpdate,
    TruncationReason, ViewportTile,
};
use serde_json::json;
use sticky_guard::StickyGuard;
use tile_stitcher::{StitchOptions, StitchedImage, Stitcher};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{CaptureError, EngineError};
use crate::planner::{plan, PlanPolicy, TilePlan};
use crate::result::{CaptureResult, CaptureScope, DualModeCapture, ModeCapture};
use crate::scroll_probe::{InfiniteScrollDetector, ProbeConfig, ScrollProbeReport};
use crate::session::CaptureSession;

/// Per-session progress reporter enforcing a monotonically non-decreasing
/// percent across the whole pipeline.
struct Reporter {
    sink: Arc<dyn ProgressSink>,
    last_percent: AtomicU8,
}

impl Reporter {
    fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            last_percent: AtomicU8::new(0),
        }
    }

    fn stage(&self, stage: CaptureStage, message: &str) {
        self.emit(stage, stage.base_percent(), message.to_string(), None, None);
    }

    /// Terminal report that keeps the percent where the pipeline stopped.
    fn terminal(&self, stage: CaptureStage, message: &str) {
        let percent = self.last_percent.load(Ordering::SeqCst);
        self.emit(stage, percent, message.to_string(), None, None);
    }

    fn tile(&self, current: u32, total: u32) {
        let base = CaptureStage::Capturing.base_percent() as u32;
        let span = CaptureStage::Stitching.base_percent() as u32 - base;
        let percent = (base + current * span / total.max(1)) as u8;
        self.emit(
            CaptureStage::Capturing,
            percent,
            format!("captured tile {current} of {total}"),
            Some(current),
            Some(total),
        );
    }

    fn emit(
        &self,
        stage: CaptureStage,
        percent: u8,
        message: String,
        current_tile: Option<u32>,
        total_tiles: Option<u32>,
    ) {
        let previous = self.last_percent.fetch_max(percent, Ordering::SeqCst);
        self.sink.report(ProgressUpdate {
            stage,
            percent: percent.max(previous),
            message,
            current_tile,
            total_tiles,
        });
    }
}

/// Top-level capture engine. One engine can serve many sessions, but only
/// one at a time: concurrent starts are rejected through the
/// `is_capturing` guard, not queued.
pub struct CaptureEngine {
    port: Arc<dyn PagePort>,
    capture: Arc<dyn ViewportCapture>,
    config: CaptureConfig,
    progress: Arc<dyn ProgressSink>,
    capturing: AtomicBool,
}

impl CaptureEngine {
    pub fn new(
        port: Arc<dyn PagePort>,
        capture: Arc<dyn ViewportCapture>,
        config: CaptureConfig,
    ) -> Self {
        Self::with_progress(port, capture, config, Arc::new(NullProgressSink))
    }

    pub fn with_progress(
        port: Arc<dyn PagePort>,
        capture: Arc<dyn ViewportCapture>,
        config: CaptureConfig,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            port,
            capture,
            config,
            progress,
            capturing: AtomicBool::new(false),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Run one full capture session. Cancellation is cooperative and
    /// polled once per tile; cleanup runs on every exit path.
    pub async fn capture_page(
        &self,
        cancel: CancellationToken,
    ) -> Result<CaptureResult, CaptureError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::CaptureInProgress);
        }

        let started = Instant::now();
        let reporter = Reporter::new(self.progress.clone());
        let outcome = self.run_session(&cancel, started, &reporter).await;
        self.capturing.store(false, Ordering::SeqCst);

        match outcome {
            Ok(result) => Ok(result),
            Err(EngineError::Cancelled) => {
                reporter.terminal(CaptureStage::Cancelled, "capture cancelled");
                Err(CaptureError::Cancelled)
            }
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                error!(
                    target: "capture-engine",
                    detail = ?err,
                    duration_ms,
                    "capture session failed"
                );
                let message = err.to_string();
                reporter.terminal(CaptureStage::Failed, &message);
                Err(CaptureError::Failed {
                    message,
                    duration_ms,
                })
            }
        }
    }

    async fn run_session(
        &self,
        cancel: &CancellationToken,
        started: Instant,
        reporter: &Reporter,
    ) -> Result<CaptureResult, EngineError> {
        let cfg = &self.config;
        reporter.stage(CaptureStage::Initializing, "preparing capture session");
        if cfg.format != ImageFormat::Png {
            warn!(
                target: "capture-engine",
                "lossless PNG is required for integrity hashing, ignoring the requested format"
            );
        }

        let url = self.port.page_url().await?;
        let title = self.port.page_title().await?;
        let original_scroll = self.port.scroll_position().await?;
        let original_overflow = self.port.body_overflow().await?;
        let mut session = CaptureSession::new(url, title, original_scroll, original_overflow);
        debug!(
            target: "capture-engine",
            session = %session.id,
            url = %session.url,
            "capture session started"
        );

        let hasher = HashService::new(Duration::from_millis(cfg.hash_timeout_ms));
        let mut chain = IntegrityHashChain::new(
            hasher.clone(),
            SignatureOptions {
                exclude_invisible: cfg.exclude_invisible_elements,
                ..SignatureOptions::default()
            },
        );
        chain.snapshot_before(self.port.as_ref()).await?;

        let mut guard = StickyGuard::new(self.port.clone(), self.capture.clone());
        let mut raw_mode = None;
        let mut enhanced_mode = None;

        // Everything from the first scroll to the last tile mutates the
        // page; cleanup restores sticky elements, scroll position and
        // overflow styling no matter how this phase exits — completion,
        // failure, timeout or cancellation.
        let phase = self
            .mutating_phase(
                &mut session,
                &mut guard,
                &mut raw_mode,
                &mut enhanced_mode,
                &hasher,
                cancel,
                started,
                reporter,
            )
            .await;
        self.cleanup(&mut guard, &session).await;
        phase?;

        session.stage = CaptureStage::Stitching;
        reporter.stage(CaptureStage::Stitching, "compositing captured tiles");
        let stitched = self.stitch_tiles(&mut session).await?;

        session.stage = CaptureStage::Hashing;
        reporter.stage(CaptureStage::Hashing, "hashing capture artifacts");
        let image_hash = hasher.hash_image(&stitched.image_bytes).await?;
        chain.snapshot_after(self.port.as_ref()).await?;
        let integrity = chain.finalize(image_hash.clone())?;

        let (html_content, html_hash) = if cfg.include_html {
            let html = self.port.page_html().await?;
            let hash = hasher.hash_html(&html).await?;
            (Some(html), Some(hash))
        } else {
            (None, None)
        };

        let (metadata, metadata_hash) = if cfg.include_metadata {
            let metadata = json!({
                "url": session.url,
                "title": session.title,
                "sessionId": session.id,
                "capturedAt": session.started_at.to_rfc3339(),
            });
            let hash = hasher.hash_metadata(&metadata).await?;
            (Some(metadata), Some(hash))
        } else {
            (None, None)
        };

        let dual_mode_capture = match (raw_mode, enhanced_mode) {
            (Some(raw), Some(enhanced)) => Some(DualModeCapture::pair(raw, enhanced)),
            _ => None,
        };

        // Certification, upload and preview are external collaborators;
        // their stage transitions are reported so they can hook in.
        reporter.stage(CaptureStage::Timestamp, "ready for trusted timestamping");
        reporter.stage(CaptureStage::Uploading, "ready for evidence upload");
        reporter.stage(CaptureStage::OpeningPreview, "ready for preview");
        session.stage = CaptureStage::Complete;
        reporter.stage(CaptureStage::Complete, "capture complete");

        Ok(CaptureResult {
            success: true,
            image_data: stitched.image_bytes,
            width: stitched.width,
            height: stitched.height,
            image_hash,
            html_content,
            html_hash,
            metadata,
            metadata_hash,
            duration_ms: started.elapsed().as_millis() as u64,
            integrity_hashes: Some(integrity),
            dual_mode_capture,
            capture_scope: session.scope.clone(),
        })
    }

    /// The page-mutating portion of a session: raw dual-mode capture,
    /// lockdown, resource waits, scroll probing, planning and the tile
    /// loop. Callers run cleanup regardless of this phase's outcome.
    #[allow(clippy::too_many_arguments)]
    async fn mutating_phase(
        &self,
        session: &mut CaptureSession,
        guard: &mut StickyGuard,
        raw_mode: &mut Option<ModeCapture>,
        enhanced_mode: &mut Option<ModeCapture>,
        hasher: &HashService,
        cancel: &CancellationToken,
        started: Instant,
        reporter: &Reporter,
    ) -> Result<(), EngineError> {
        let cfg = &self.config;

        // The raw dual-mode capture precedes every layout mutation,
        // including the overflow lockdown; its modification list is empty
        // by construction.
        if cfg.dual_mode {
            self.port.scroll_to(0.0, ScrollBehavior::Instant).await?;
            sleep(Duration::from_millis(cfg.render_settle_ms)).await;
            let bytes = self.capture_with_retry().await?;
            let image_hash = hasher.hash_image(&bytes).await?;
            *raw_mode = Some(ModeCapture {
                image_data: bytes,
                image_hash,
                captured_at: Utc::now(),
                modifications: Vec::new(),
            });
        }

        session.stage = CaptureStage::Lockdown;
        reporter.stage(CaptureStage::Lockdown, "locking page layout");
        self.port.set_body_overflow("hidden").await?;

        session.stage = CaptureStage::WaitingResources;
        reporter.stage(CaptureStage::WaitingResources, "waiting for page resources");
        let load_budget = Duration::from_millis(cfg.page_load_timeout_ms);
        if timeout(load_budget, async {
            sleep(Duration::from_millis(cfg.render_settle_ms)).await;
            self.wait_lazy_images().await;
        })
        .await
        .is_err()
        {
            warn!(
                target: "capture-engine",
                "initial resource wait exceeded the page load budget, continuing"
            );
        }

        let mut total_height = self.port.height_readings().await?.document_height();
        let viewport = self.port.viewport().await?;

        let probe = if total_height > cfg.max_height_before_split {
            let detector = InfiniteScrollDetector::new(self.port.clone(), self.probe_config());
            let report = detector.detect().await?;
            // Probing may itself have grown the document.
            total_height = total_height.max(report.final_height);
            report
        } else {
            ScrollProbeReport::fixed(total_height)
        };
        if probe.is_infinite {
            info!(
                target: "capture-engine",
                growth_ratio = probe.growth_ratio,
                "infinite scrolling detected, applying the smaller height cap"
            );
        }

        let tile_plan = plan(
            total_height.max(viewport.height),
            viewport.height,
            &PlanPolicy {
                max_capture_height: cfg.max_capture_height,
                infinite_scroll_max_height: cfg.infinite_scroll_max_height,
                infinite_scroll_detected: probe.is_infinite,
            },
        );
        session.scope = Some(CaptureScope {
            total_page_height: total_height,
            captured_height: tile_plan.capped_height,
            was_truncated: tile_plan.truncation_reason.is_some(),
            truncation_reason: tile_plan.truncation_reason,
            infinite_scroll_detected: probe.is_infinite,
            scroll_height_growth_ratio: probe.growth_ratio,
        });

        let session_budget = Duration::from_millis(if probe.is_infinite {
            cfg.max_capture_time_ms_infinite_scroll
        } else {
            cfg.max_capture_time_ms
        });
        let deadline = started + session_budget;

        session.stage = CaptureStage::Capturing;
        self.capture_loop(
            session,
            &tile_plan,
            &viewport,
            guard,
            enhanced_mode,
            hasher,
            cancel,
            deadline,
            reporter,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture_loop(
        &self,
        session: &mut CaptureSession,
        tile_plan: &TilePlan,
        viewport: &ViewportMetrics,
        guard: &mut StickyGuard,
        enhanced: &mut Option<ModeCapture>,
        hasher: &HashService,
        cancel: &CancellationToken,
        deadline: Instant,
        reporter: &Reporter,
    ) -> Result<(), EngineError> {
        let total = tile_plan.offsets.len() as u32;
        let mut last_capture: Option<Instant> = None;

        for (index, &offset) in tile_plan.offsets.iter().enumerate() {
            // Cancellation is cooperative: polled once per iteration, so
            // an in-flight capture always completes first.
            if cancel.is_cancelled() {
                if session.tiles.is_empty() {
                    return Err(EngineError::Cancelled);
                }
                warn!(
                    target: "capture-engine",
                    captured = session.tiles.len(),
                    planned = total,
                    "cancelled mid-loop, stitching captured tiles"
                );
                session.truncate(TruncationReason::Cancelled);
                return Ok(());
            }
            if !session.tiles.is_empty() && Instant::now() >= deadline {
                warn!(
                    target: "capture-engine",
                    captured = session.tiles.len(),
                    planned = total,
                    "session time budget exhausted, stitching captured tiles"
                );
                session.truncate(TruncationReason::Timeout);
                return Ok(());
            }

            // The very first tile keeps the page's natural top-of-page
            // appearance, header included; sticky handling runs exactly
            // once, from the second tile on.
            if index == 1 {
                let handled = guard.handle().await?;
                if self.config.dual_mode {
                    let bytes = self.capture_with_retry().await?;
                    let image_hash = hasher.hash_image(&bytes).await?;
                    let mut modifications = vec!["body overflow suppressed".to_string()];
                    modifications.extend(handled.modifications.iter().cloned());
                    *enhanced = Some(ModeCapture {
                        image_data: bytes,
                        image_hash,
                        captured_at: Utc::now(),
                        modifications,
                    });
                }
                session.sticky = Some(handled);
            }

            self.port.scroll_to(offset, ScrollBehavior::Smooth).await?;
            sleep(Duration::from_millis(self.config.render_settle_ms)).await;
            self.wait_lazy_images().await;

            // The host capture primitive is rate limited.
            if let Some(previous) = last_capture {
                let min_gap = Duration::from_millis(self.config.min_between_captures_ms);
                let since = previous.elapsed();
                if since < min_gap {
                    sleep(min_gap - since).await;
                }
            }

            let bytes = self.capture_with_retry().await?;
            last_capture = Some(Instant::now());

            let actual = self.port.scroll_position().await?;
            session.tiles.push(ViewportTile {
                scroll_offset_y: offset,
                crop_top: (offset - actual).max(0.0),
                image_bytes: bytes,
                width: viewport.width,
                height: tile_plan.band_height(offset, viewport.height),
                captured_at_dpr: viewport.device_pixel_ratio,
            });
            reporter.tile(index as u32 + 1, total);
        }
        Ok(())
    }

    /// One viewport capture with up to `capture_retry_max` attempts and a
    /// fixed backoff between them. Exhaustion is fatal for the session.
    async fn capture_with_retry(&self) -> Result<Vec<u8>, EngineError> {
        let budget = Duration::from_millis(self.config.viewport_timeout_ms);
        let backoff = Duration::from_millis(self.config.capture_retry_backoff_ms);
        let max_attempts = self.config.capture_retry_max.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match timeout(budget, self.capture.capture()).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(err)) => err,
                Err(_) => PortError::CaptureTimeout,
            };
            warn!(
                target: "capture-engine",
                attempt,
                max_attempts,
                %err,
                "viewport capture attempt failed"
            );
            if attempt >= max_attempts {
                return Err(EngineError::CaptureExhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            sleep(backoff).await;
        }
    }

    /// Wait for in-viewport lazy images, bounded by a connection-speed
    /// adaptive budget. Hitting the budget is logged, never fatal.
    async fn wait_lazy_images(&self) {
        let base = Duration::from_millis(self.config.lazy_image_timeout_ms);
        let budget = match self.port.effective_connection().await {
            Ok(class) => class.scale(base),
            Err(_) => base,
        };
        let deadline = Instant::now() + budget;
        loop {
            match self.port.pending_lazy_images().await {
                Ok(0) => return,
                Ok(pending) => {
                    if Instant::now() >= deadline {
                        warn!(
                            target: "capture-engine",
                            pending,
                            "lazy images still loading at the wait deadline"
                        );
                        return;
                    }
                }
                Err(err) => {
                    debug!(target: "capture-engine", %err, "lazy image probe unavailable");
                    return;
                }
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn cleanup(&self, guard: &mut StickyGuard, session: &CaptureSession) {
        if guard.is_active() {
            if let Err(err) = guard.restore().await {
                warn!(target: "capture-engine", %err, "sticky restore failed during cleanup");
            }
        }
        if let Err(err) = self
            .port
            .scroll_to(session.original_scroll, ScrollBehavior::Instant)
            .await
        {
            warn!(target: "capture-engine", %err, "scroll restore failed during cleanup");
        }
        if let Err(err) = self
            .port
            .set_body_overflow(&session.original_overflow)
            .await
        {
            warn!(target: "capture-engine", %err, "overflow restore failed during cleanup");
        }
    }

    async fn stitch_tiles(
        &self,
        session: &mut CaptureSession,
    ) -> Result<StitchedImage, EngineError> {
        let tiles = std::mem::take(&mut session.tiles);
        let header = session.sticky.as_ref().and_then(|s| s.header.clone());
        let footer = session.sticky.as_ref().and_then(|s| s.footer.clone());
        let options = StitchOptions {
            max_canvas_height_px: self.config.max_canvas_height_px,
            ..StitchOptions::default()
        };

        let stitched = tokio::task::spawn_blocking(move || {
            Stitcher::new(options).stitch(&tiles, header.as_ref(), footer.as_ref())
        })
        .await
        .map_err(|err| EngineError::Internal(err.to_string()))??;
        Ok(stitched)
    }

    fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            detection_viewports: self.config.infinite_scroll_detection_viewports,
            growth_threshold: self.config.infinite_scroll_growth_threshold,
            step_pause: Duration::from_millis(120.min(self.config.render_settle_ms.max(1))),
            settle: Duration::from_millis(self.config.render_settle_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    #[test]
    fn reporter_percent_never_decreases() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = Reporter::new(sink.clone());

        reporter.stage(CaptureStage::Capturing, "capturing");
        reporter.tile(9, 10);
        // A stage with a lower base percent must not move the needle back.
        reporter.stage(CaptureStage::Capturing, "still capturing");
        reporter.stage(CaptureStage::Stitching, "stitching");

        let updates = sink.updates.lock().unwrap();
        let percents: Vec<u8> = updates.iter().map(|u| u.percent).collect();
        for pair in percents.windows(2) {
            assert!(pair[0] <= pair[1], "percents: {percents:?}");
        }
        assert_eq!(updates.last().unwrap().stage, CaptureStage::Stitching);
    }

    #[test]
    fn tile_percent_interpolates_between_capturing_and_stitching() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = Reporter::new(sink.clone());
        reporter.tile(5, 10);
        reporter.tile(10, 10);

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates[0].percent, 47);
        assert_eq!(updates[0].current_tile, Some(5));
        assert_eq!(updates[0].total_tiles, Some(10));
        assert_eq!(updates[1].percent, 80);
    }
}
