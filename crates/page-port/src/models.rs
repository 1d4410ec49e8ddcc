use pageproof_core_types::Rect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stable handle to a live element, valid for the lifetime of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

/// The document height readings a page exposes. Different engines disagree
/// on which one is authoritative; the maximum wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightReadings {
    pub scroll_height: f64,
    pub offset_height: f64,
    pub client_height: f64,
}

impl HeightReadings {
    pub fn document_height(&self) -> f64 {
        self.scroll_height
            .max(self.offset_height)
            .max(self.client_height)
    }
}

/// Current viewport geometry and scroll state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportMetrics {
    /// Logical viewport width, CSS pixels.
    pub width: f64,
    /// Logical viewport height, CSS pixels.
    pub height: f64,
    pub scroll_y: f64,
    pub device_pixel_ratio: f64,
}

/// How a scroll should be performed. Smooth scrolling triggers
/// scroll-dependent lazy loaders that do not fire on instantaneous jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Instant,
    Smooth,
}

/// One fixed/sticky element as discovered in the page, with everything the
/// classifier needs: identity, on-screen geometry and styling hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedElementInfo {
    pub handle: NodeHandle,
    /// Best-effort unique CSS selector for the element.
    pub selector: String,
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// First characters of the element's visible text.
    pub text_excerpt: String,
    /// On-screen rectangle in viewport coordinates.
    pub rect: Rect,
    pub z_index: Option<i64>,
    /// Whether the element declares explicit bottom/right offset styling.
    pub has_explicit_offsets: bool,
    /// Computed `position` value, `fixed` or `sticky`.
    pub position: String,
}

/// One element in the DOM-structure inventory used for integrity
/// signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub rect: Rect,
    pub text_excerpt: String,
    pub visible: bool,
}

/// Full inline-style snapshot of an element taken before any mutation.
/// Restoring the snapshot restores the element exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSnapshot {
    pub handle: NodeHandle,
    pub selector: String,
    /// The element's inline `style` text at snapshot time (may be empty).
    pub inline_style: String,
}

/// Target for re-anchoring an element out of the fixed/sticky layer into
/// document-relative absolute positioning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnchor {
    /// Document-coordinate position, CSS pixels.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub z_index: Option<i64>,
}

/// Coarse effective-connection classification, used to scale lazy-image
/// wait budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Fast,
    Moderate,
    Slow,
}

impl ConnectionClass {
    /// Scale a base timeout by connection quality.
    pub fn scale(self, base: Duration) -> Duration {
        match self {
            Self::Fast => base,
            Self::Moderate => base * 2,
            Self::Slow => base * 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_height_takes_the_max_reading() {
        let readings = HeightReadings {
            scroll_height: 4_000.0,
            offset_height: 4_200.0,
            client_height: 600.0,
        };
        assert_eq!(readings.document_height(), 4_200.0);
    }

    #[test]
    fn connection_class_scales_budgets() {
        let base = Duration::from_millis(500);
        assert_eq!(ConnectionClass::Fast.scale(base), base);
        assert_eq!(ConnectionClass::Slow.scale(base), Duration::from_secs(2));
    }
}
