//! One-shot sticky handling pass and its reversal.

use std::io::Cursor;
use std::sync::Arc;

use image::GenericImageView;
use page_port::{
    DocumentAnchor, FixedElementInfo, PagePort, ScrollBehavior, ViewportCapture, ViewportMetrics,
};
use pageproof_core_types::{BandCapture, BandRole, Rect};
use tracing::{debug, warn};

use crate::classify::classify;
use crate::errors::StickyError;
use crate::models::{StickyAction, StickyClass, StickyElementRecord, StickyHandlingResult};

/// Discovers, classifies and neutralizes sticky elements, keeping enough
/// state to restore the page exactly.
///
/// `handle()` is one-shot: calling it again without `restore()` is an
/// error. `restore()` is safe to call even after a partial failure.
pub struct StickyGuard {
    port: Arc<dyn PagePort>,
    capture: Arc<dyn ViewportCapture>,
    records: Vec<StickyElementRecord>,
    active: bool,
}

impl StickyGuard {
    pub fn new(port: Arc<dyn PagePort>, capture: Arc<dyn ViewportCapture>) -> Self {
        Self {
            port,
            capture,
            records: Vec::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Run the one-time handling pass. Scrolls to the top to get
    /// scroll-independent coordinates and restores the caller's scroll
    /// position before returning.
    pub async fn handle(&mut self) -> Result<StickyHandlingResult, StickyError> {
        if self.active {
            return Err(StickyError::HandleAlreadyActive);
        }
        self.active = true;

        let caller_scroll = self.port.scroll_position().await?;
        self.port.scroll_to(0.0, ScrollBehavior::Instant).await?;
        let viewport = self.port.viewport().await?;
        let scroll_y = self.port.scroll_position().await?;
        let elements = self.port.fixed_elements().await?;

        let mut result = StickyHandlingResult::empty();
        for info in &elements {
            let class = classify(info, &viewport);
            debug!(
                target: "sticky-guard",
                selector = %info.selector,
                class = class.as_str(),
                "classified fixed element"
            );
            let outcome = self
                .neutralize(info, class, scroll_y, &viewport, &mut result)
                .await;
            if let Err(err) = outcome {
                warn!(
                    target: "sticky-guard",
                    selector = %info.selector,
                    %err,
                    "failed to neutralize element; leaving it in place"
                );
            }
        }

        self.port
            .scroll_to(caller_scroll, ScrollBehavior::Instant)
            .await?;

        result.records = self.records.clone();
        Ok(result)
    }

    /// Reverse every recorded change, newest first. Per-record failures
    /// are logged and skipped so a partial failure never blocks the rest.
    pub async fn restore(&mut self) -> Result<(), StickyError> {
        for record in self.records.iter().rev() {
            if let Err(err) = self.port.restore_style(&record.original_style).await {
                warn!(
                    target: "sticky-guard",
                    selector = %record.selector,
                    %err,
                    "restore failed for element"
                );
            }
        }
        self.records.clear();
        self.active = false;
        Ok(())
    }

    async fn neutralize(
        &mut self,
        info: &FixedElementInfo,
        class: StickyClass,
        scroll_y: f64,
        viewport: &ViewportMetrics,
        result: &mut StickyHandlingResult,
    ) -> Result<(), StickyError> {
        let snapshot = self.port.snapshot_style(info.handle).await?;

        let wants_band = match class {
            StickyClass::Header => result.header.is_none(),
            StickyClass::Footer => result.footer.is_none(),
            _ => false,
        };

        if wants_band {
            let role = if class == StickyClass::Header {
                BandRole::Header
            } else {
                BandRole::Footer
            };
            let band = self.capture_band(role, info.rect, viewport).await?;
            self.port.hide_element(info.handle).await?;
            match role {
                BandRole::Header => result.header = Some(band),
                BandRole::Footer => result.footer = Some(band),
            }
            self.records.push(StickyElementRecord {
                selector: info.selector.clone(),
                classification: class,
                original_style: snapshot,
                action: StickyAction::CapturedOnce,
            });
            result.modifications.push(format!(
                "{} {} captured once and removed from scrolling layers",
                class.as_str(),
                info.selector
            ));
            return Ok(());
        }

        let anchor = DocumentAnchor {
            x: info.rect.x,
            y: info.rect.y + scroll_y,
            width: info.rect.width,
            height: info.rect.height,
            z_index: info.z_index,
        };
        let action = match self.port.pin_to_document(info.handle, anchor).await {
            Ok(()) => StickyAction::Repositioned,
            Err(err) => {
                // Re-anchoring can fail on exotic layouts; hiding is the
                // fallback neutralization.
                warn!(
                    target: "sticky-guard",
                    selector = %info.selector,
                    %err,
                    "re-anchor failed, hiding instead"
                );
                self.port.hide_element(info.handle).await?;
                StickyAction::Hidden
            }
        };
        self.records.push(StickyElementRecord {
            selector: info.selector.clone(),
            classification: class,
            original_style: snapshot,
            action,
        });
        result.modifications.push(match action {
            StickyAction::Repositioned => format!(
                "{} {} re-anchored to document position y={}",
                class.as_str(),
                info.selector,
                anchor.y
            ),
            _ => format!("{} {} hidden", class.as_str(), info.selector),
        });
        Ok(())
    }

    /// Capture the viewport once and crop the element's rectangle out of
    /// it at physical resolution.
    async fn capture_band(
        &self,
        role: BandRole,
        rect: Rect,
        viewport: &ViewportMetrics,
    ) -> Result<BandCapture, StickyError> {
        let bytes = self.capture.capture().await?;
        let img =
            image::load_from_memory(&bytes).map_err(|err| StickyError::Image(err.to_string()))?;
        let dpr = img.width() as f64 / viewport.width;

        let x = ((rect.x * dpr).round() as u32).min(img.width().saturating_sub(1));
        let y = ((rect.y * dpr).round() as u32).min(img.height().saturating_sub(1));
        let w = ((rect.width * dpr).round() as u32)
            .max(1)
            .min(img.width() - x);
        let h = ((rect.height * dpr).round() as u32)
            .max(1)
            .min(img.height() - y);

        let band = image::imageops::crop_imm(&img, x, y, w, h).to_image();
        let mut buf = Vec::new();
        band.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|err| StickyError::Image(err.to_string()))?;

        Ok(BandCapture {
            role,
            image_bytes: buf,
            logical_width: rect.width,
            logical_height: rect.height,
        })
    }
}
