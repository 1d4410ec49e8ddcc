//! Scroll offset planning.

use pageproof_core_types::TruncationReason;
use serde::{Deserialize, Serialize};

/// Height caps to apply when planning, selected by the infinite-scroll
/// verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanPolicy {
    pub max_capture_height: f64,
    pub infinite_scroll_max_height: f64,
    pub infinite_scroll_detected: bool,
}

impl PlanPolicy {
    fn effective_max_height(&self) -> f64 {
        if self.infinite_scroll_detected {
            self.infinite_scroll_max_height
        } else {
            self.max_capture_height
        }
    }
}

/// Ordered scroll offsets to visit, plus the height actually covered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilePlan {
    pub offsets: Vec<f64>,
    pub capped_height: f64,
    pub truncation_reason: Option<TruncationReason>,
}

impl TilePlan {
    /// Logical height the tile at `offset` contributes.
    pub fn band_height(&self, offset: f64, viewport_height: f64) -> f64 {
        (self.capped_height - offset).min(viewport_height)
    }
}

/// Plan the offsets for a page of `total_height` under the policy caps.
///
/// Offsets step by one viewport height from 0 until `capped_height` is
/// reached; no padding or overlap is introduced, since sticky elements
/// are neutralized before tiles are taken. Callers must pass a positive
/// viewport height and a total of at least one viewport.
pub fn plan(total_height: f64, viewport_height: f64, policy: &PlanPolicy) -> TilePlan {
    let capped_height = total_height.min(policy.effective_max_height());

    let offsets = if viewport_height > 0.0 && capped_height > 0.0 {
        let mut offsets = Vec::new();
        let mut y = 0.0;
        while y < capped_height {
            offsets.push(y);
            y += viewport_height;
        }
        offsets
    } else {
        vec![0.0]
    };

    let truncation_reason = if capped_height < total_height {
        if policy.infinite_scroll_detected {
            Some(TruncationReason::InfiniteScrollDetected)
        } else {
            Some(TruncationReason::MaxHeightExceeded)
        }
    } else {
        None
    };

    TilePlan {
        offsets,
        capped_height,
        truncation_reason,
    }
}
