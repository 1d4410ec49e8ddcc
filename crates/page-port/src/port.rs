use async_trait::async_trait;

use crate::errors::PortError;
use crate::models::{
    ConnectionClass, DocumentAnchor, ElementDescriptor, FixedElementInfo, HeightReadings,
    NodeHandle, ScrollBehavior, StyleSnapshot, ViewportMetrics,
};

/// Minimal page capability surface required by the capture engine.
///
/// Every mutation is paired with a way to reverse it exactly: callers
/// snapshot an element's style before pinning or hiding it and restore
/// from the snapshot afterwards.
#[async_trait]
pub trait PagePort: Send + Sync {
    async fn height_readings(&self) -> Result<HeightReadings, PortError>;

    async fn viewport(&self) -> Result<ViewportMetrics, PortError>;

    async fn scroll_to(&self, y: f64, behavior: ScrollBehavior) -> Result<(), PortError>;

    async fn scroll_position(&self) -> Result<f64, PortError>;

    /// Elements whose computed position is `fixed` or `sticky`, in
    /// document order.
    async fn fixed_elements(&self) -> Result<Vec<FixedElementInfo>, PortError>;

    /// Inventory of elements for the DOM-structure signature. With
    /// `include_invisible` false, elements that do not render are omitted.
    async fn element_inventory(
        &self,
        include_invisible: bool,
    ) -> Result<Vec<ElementDescriptor>, PortError>;

    async fn snapshot_style(&self, handle: NodeHandle) -> Result<StyleSnapshot, PortError>;

    /// Force the element out of the fixed/sticky layer by giving it
    /// document-relative absolute positioning at `anchor`, preserving
    /// explicit width/height/z-index.
    async fn pin_to_document(
        &self,
        handle: NodeHandle,
        anchor: DocumentAnchor,
    ) -> Result<(), PortError>;

    async fn hide_element(&self, handle: NodeHandle) -> Result<(), PortError>;

    async fn restore_style(&self, snapshot: &StyleSnapshot) -> Result<(), PortError>;

    async fn body_overflow(&self) -> Result<String, PortError>;

    async fn set_body_overflow(&self, value: &str) -> Result<(), PortError>;

    /// Count of lazy images intersecting the viewport that have not
    /// finished loading.
    async fn pending_lazy_images(&self) -> Result<usize, PortError>;

    async fn effective_connection(&self) -> Result<ConnectionClass, PortError>;

    async fn page_url(&self) -> Result<String, PortError>;

    async fn page_title(&self) -> Result<String, PortError>;

    async fn page_html(&self) -> Result<String, PortError>;
}

/// The host's screenshot primitive: returns the current on-screen raster
/// as an encoded image. Treated as opaque and unreliable; callers retry.
#[async_trait]
pub trait ViewportCapture: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>, PortError>;
}
