//! Infinite-scroll detection.

use std::sync::Arc;
use std::time::Duration;

use page_port::{PagePort, PortError, ScrollBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Probe tuning.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// How many viewport-heights to force-scroll through.
    pub detection_viewports: u32,
    /// Growth ratio strictly above which a page counts as infinite.
    pub growth_threshold: f64,
    /// Pause after each discrete scroll step, so intersection-based lazy
    /// loaders that ignore instantaneous jumps get to fire.
    pub step_pause: Duration,
    /// Wait for lazy-loaded content to settle before the final reading.
    pub settle: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            detection_viewports: 3,
            growth_threshold: 0.15,
            step_pause: Duration::from_millis(120),
            settle: Duration::from_millis(350),
        }
    }
}

/// Probe verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollProbeReport {
    pub is_infinite: bool,
    pub initial_height: f64,
    pub final_height: f64,
    pub growth_ratio: f64,
}

impl ScrollProbeReport {
    /// Report for a page that was not probed (already known fixed).
    pub fn fixed(height: f64) -> Self {
        Self {
            is_infinite: false,
            initial_height: height,
            final_height: height,
            growth_ratio: 0.0,
        }
    }
}

/// Growth verdict from the two height readings. Growth exactly at the
/// threshold is not infinite.
pub(crate) fn evaluate_growth(initial: f64, fin: f64, threshold: f64) -> (f64, bool) {
    if initial <= 0.0 {
        return (0.0, false);
    }
    let ratio = (fin - initial) / initial;
    (ratio, ratio > threshold)
}

/// Classifies a page as fixed-length or infinitely-growing by
/// force-scrolling forward and measuring document growth.
pub struct InfiniteScrollDetector {
    port: Arc<dyn PagePort>,
    config: ProbeConfig,
}

impl InfiniteScrollDetector {
    pub fn new(port: Arc<dyn PagePort>, config: ProbeConfig) -> Self {
        Self { port, config }
    }

    /// Run the probe. The scroll position is restored to the origin
    /// before returning, even when the probe itself failed.
    pub async fn detect(&self) -> Result<ScrollProbeReport, PortError> {
        let outcome = self.probe().await;
        if let Err(err) = self.port.scroll_to(0.0, ScrollBehavior::Instant).await {
            warn!(target: "capture-engine", %err, "origin restore after scroll probe failed");
        }
        outcome
    }

    async fn probe(&self) -> Result<ScrollProbeReport, PortError> {
        let initial_height = self.port.height_readings().await?.document_height();
        let viewport = self.port.viewport().await?;
        if initial_height <= 0.0 || viewport.height <= 0.0 {
            return Ok(ScrollProbeReport::fixed(initial_height));
        }

        let steps = self.config.detection_viewports.max(1);
        for step in 1..=steps {
            let target = step as f64 * viewport.height;
            self.port.scroll_to(target, ScrollBehavior::Smooth).await?;
            tokio::time::sleep(self.config.step_pause).await;
        }
        tokio::time::sleep(self.config.settle).await;

        let final_height = self.port.height_readings().await?.document_height();
        let (growth_ratio, is_infinite) =
            evaluate_growth(initial_height, final_height, self.config.growth_threshold);

        debug!(
            target: "capture-engine",
            initial_height,
            final_height,
            growth_ratio,
            is_infinite,
            "scroll probe finished"
        );

        Ok(ScrollProbeReport {
            is_infinite,
            initial_height,
            final_height,
            growth_ratio,
        })
    }
}
