//! Deterministic in-memory page for engine tests.
//!
//! `FakePage` models just enough of a document to exercise the capture
//! pipeline: a scrollable height that can grow when the bottom is reached
//! (infinite pages), fixed elements with mutable inline styles, a body
//! overflow property, and a capture primitive that renders a solid-color
//! band per viewport so stitching tests can assert pixel placement.

use std::collections::VecDeque;
use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageBuffer, Rgba};
use parking_lot::Mutex;

use crate::errors::PortError;
use crate::models::{
    ConnectionClass, DocumentAnchor, ElementDescriptor, FixedElementInfo, HeightReadings,
    NodeHandle, ScrollBehavior, StyleSnapshot, ViewportMetrics,
};
use crate::port::{PagePort, ViewportCapture};
use pageproof_core_types::Rect;

/// Distinct per-band fill colors; the band index wraps around the palette.
pub const BAND_PALETTE: [[u8; 4]; 6] = [
    [220, 60, 60, 255],
    [60, 180, 90, 255],
    [70, 90, 220, 255],
    [230, 190, 60, 255],
    [170, 70, 200, 255],
    [60, 200, 210, 255],
];

/// Static configuration for a [`FakePage`].
#[derive(Debug, Clone)]
pub struct FakePageConfig {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub device_pixel_ratio: f64,
    pub document_height: f64,
    /// Document growth applied each time a scroll reaches the bottom;
    /// zero models a fixed-length page.
    pub growth_per_reach: f64,
    /// Growth stops once the document reaches this height.
    pub growth_limit: f64,
    pub connection: ConnectionClass,
    /// How many `pending_lazy_images` polls report outstanding images
    /// before the count drains to zero.
    pub lazy_image_polls: usize,
    pub url: String,
    pub title: String,
    pub html: String,
}

impl Default for FakePageConfig {
    fn default() -> Self {
        Self {
            viewport_width: 100.0,
            viewport_height: 80.0,
            device_pixel_ratio: 1.0,
            document_height: 400.0,
            growth_per_reach: 0.0,
            growth_limit: 0.0,
            connection: ConnectionClass::Fast,
            lazy_image_polls: 0,
            url: "https://fake.test/page".to_string(),
            title: "Fake page".to_string(),
            html: "<html><body>fake</body></html>".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct FakeElement {
    info: FixedElementInfo,
    inline_style: String,
}

#[derive(Debug)]
struct FakeState {
    cfg: FakePageConfig,
    document_height: f64,
    scroll_y: f64,
    scroll_history: Vec<f64>,
    body_overflow: String,
    elements: Vec<FakeElement>,
    static_inventory: Vec<ElementDescriptor>,
    lazy_polls_left: usize,
    capture_count: u64,
    capture_failures: VecDeque<&'static str>,
    fail_all_captures: bool,
}

/// In-memory [`PagePort`] + [`ViewportCapture`] double.
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(cfg: FakePageConfig) -> Self {
        let document_height = cfg.document_height;
        let lazy_polls_left = cfg.lazy_image_polls;
        Self {
            state: Mutex::new(FakeState {
                cfg,
                document_height,
                scroll_y: 0.0,
                scroll_history: Vec::new(),
                body_overflow: "visible".to_string(),
                elements: Vec::new(),
                static_inventory: default_inventory(),
                lazy_polls_left,
                capture_count: 0,
                capture_failures: VecDeque::new(),
                fail_all_captures: false,
            }),
        }
    }

    /// Fixed-length page of the given height with the default viewport.
    pub fn with_height(document_height: f64) -> Self {
        Self::new(FakePageConfig {
            document_height,
            ..FakePageConfig::default()
        })
    }

    /// Register a fixed/sticky element. Returns its handle.
    pub fn add_fixed_element(&self, info: FixedElementInfo) -> NodeHandle {
        let mut state = self.state.lock();
        let handle = info.handle;
        state.elements.push(FakeElement {
            info,
            inline_style: String::new(),
        });
        handle
    }

    /// The next `n` capture calls fail with a transient error.
    pub fn fail_next_captures(&self, n: usize) {
        let mut state = self.state.lock();
        for _ in 0..n {
            state.capture_failures.push_back("synthetic capture failure");
        }
    }

    /// Every capture call fails from now on.
    pub fn fail_all_captures(&self) {
        self.state.lock().fail_all_captures = true;
    }

    pub fn capture_count(&self) -> u64 {
        self.state.lock().capture_count
    }

    pub fn scroll_history(&self) -> Vec<f64> {
        self.state.lock().scroll_history.clone()
    }

    pub fn current_scroll(&self) -> f64 {
        self.state.lock().scroll_y
    }

    pub fn current_body_overflow(&self) -> String {
        self.state.lock().body_overflow.clone()
    }

    pub fn document_height(&self) -> f64 {
        self.state.lock().document_height
    }

    /// Current inline style of a registered fixed element.
    pub fn inline_style(&self, handle: NodeHandle) -> Option<String> {
        self.state
            .lock()
            .elements
            .iter()
            .find(|el| el.info.handle == handle)
            .map(|el| el.inline_style.clone())
    }

    fn max_scroll(state: &FakeState) -> f64 {
        (state.document_height - state.cfg.viewport_height).max(0.0)
    }
}

fn default_inventory() -> Vec<ElementDescriptor> {
    vec![
        ElementDescriptor {
            tag_name: "body".to_string(),
            id: None,
            classes: vec![],
            rect: Rect::new(0.0, 0.0, 100.0, 400.0),
            text_excerpt: "fake".to_string(),
            visible: true,
        },
        ElementDescriptor {
            tag_name: "main".to_string(),
            id: Some("content".to_string()),
            classes: vec!["page".to_string()],
            rect: Rect::new(0.0, 0.0, 100.0, 380.0),
            text_excerpt: "fake content".to_string(),
            visible: true,
        },
    ]
}

#[async_trait]
impl PagePort for FakePage {
    async fn height_readings(&self) -> Result<HeightReadings, PortError> {
        let state = self.state.lock();
        Ok(HeightReadings {
            scroll_height: state.document_height,
            offset_height: state.document_height,
            client_height: state.cfg.viewport_height,
        })
    }

    async fn viewport(&self) -> Result<ViewportMetrics, PortError> {
        let state = self.state.lock();
        Ok(ViewportMetrics {
            width: state.cfg.viewport_width,
            height: state.cfg.viewport_height,
            scroll_y: state.scroll_y,
            device_pixel_ratio: state.cfg.device_pixel_ratio,
        })
    }

    async fn scroll_to(&self, y: f64, _behavior: ScrollBehavior) -> Result<(), PortError> {
        let mut state = self.state.lock();
        // Growth fires when the request reaches (or passes) the current
        // bottom, like lazy loaders observing a sentinel element.
        if state.cfg.growth_per_reach > 0.0 && y >= Self::max_scroll(&state) {
            let grown = state.document_height + state.cfg.growth_per_reach;
            state.document_height = grown.min(state.cfg.growth_limit.max(state.document_height));
        }
        let clamped = y.clamp(0.0, Self::max_scroll(&state));
        state.scroll_y = clamped;
        state.scroll_history.push(clamped);
        Ok(())
    }

    async fn scroll_position(&self) -> Result<f64, PortError> {
        Ok(self.state.lock().scroll_y)
    }

    async fn fixed_elements(&self) -> Result<Vec<FixedElementInfo>, PortError> {
        Ok(self
            .state
            .lock()
            .elements
            .iter()
            .map(|el| el.info.clone())
            .collect())
    }

    async fn element_inventory(
        &self,
        include_invisible: bool,
    ) -> Result<Vec<ElementDescriptor>, PortError> {
        let state = self.state.lock();
        let mut inventory = state.static_inventory.clone();
        // Fixed elements surface their current inline style through the
        // text excerpt so structural hashes notice unreverted mutations.
        for el in &state.elements {
            let hidden = el.inline_style.contains("display: none");
            inventory.push(ElementDescriptor {
                tag_name: el.info.tag_name.clone(),
                id: el.info.id.clone(),
                classes: el.info.classes.clone(),
                rect: el.info.rect,
                text_excerpt: format!("{}|{}", el.info.text_excerpt, el.inline_style),
                visible: !hidden,
            });
        }
        if !include_invisible {
            inventory.retain(|el| el.visible);
        }
        Ok(inventory)
    }

    async fn snapshot_style(&self, handle: NodeHandle) -> Result<StyleSnapshot, PortError> {
        let state = self.state.lock();
        let el = state
            .elements
            .iter()
            .find(|el| el.info.handle == handle)
            .ok_or_else(|| PortError::ElementGone(format!("handle {:?}", handle)))?;
        Ok(StyleSnapshot {
            handle,
            selector: el.info.selector.clone(),
            inline_style: el.inline_style.clone(),
        })
    }

    async fn pin_to_document(
        &self,
        handle: NodeHandle,
        anchor: DocumentAnchor,
    ) -> Result<(), PortError> {
        let mut state = self.state.lock();
        let el = state
            .elements
            .iter_mut()
            .find(|el| el.info.handle == handle)
            .ok_or_else(|| PortError::ElementGone(format!("handle {:?}", handle)))?;
        let z_index = anchor.z_index.unwrap_or(1);
        el.inline_style = format!(
            "position: absolute; left: {}px; top: {}px; width: {}px; height: {}px; z-index: {};",
            anchor.x, anchor.y, anchor.width, anchor.height, z_index
        );
        Ok(())
    }

    async fn hide_element(&self, handle: NodeHandle) -> Result<(), PortError> {
        let mut state = self.state.lock();
        let el = state
            .elements
            .iter_mut()
            .find(|el| el.info.handle == handle)
            .ok_or_else(|| PortError::ElementGone(format!("handle {:?}", handle)))?;
        el.inline_style = "display: none;".to_string();
        Ok(())
    }

    async fn restore_style(&self, snapshot: &StyleSnapshot) -> Result<(), PortError> {
        let mut state = self.state.lock();
        let el = state
            .elements
            .iter_mut()
            .find(|el| el.info.handle == snapshot.handle)
            .ok_or_else(|| PortError::ElementGone(format!("handle {:?}", snapshot.handle)))?;
        el.inline_style = snapshot.inline_style.clone();
        Ok(())
    }

    async fn body_overflow(&self) -> Result<String, PortError> {
        Ok(self.state.lock().body_overflow.clone())
    }

    async fn set_body_overflow(&self, value: &str) -> Result<(), PortError> {
        self.state.lock().body_overflow = value.to_string();
        Ok(())
    }

    async fn pending_lazy_images(&self) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.lazy_polls_left > 0 {
            state.lazy_polls_left -= 1;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn effective_connection(&self) -> Result<ConnectionClass, PortError> {
        Ok(self.state.lock().cfg.connection)
    }

    async fn page_url(&self) -> Result<String, PortError> {
        Ok(self.state.lock().cfg.url.clone())
    }

    async fn page_title(&self) -> Result<String, PortError> {
        Ok(self.state.lock().cfg.title.clone())
    }

    async fn page_html(&self) -> Result<String, PortError> {
        Ok(self.state.lock().cfg.html.clone())
    }
}

#[async_trait]
impl ViewportCapture for FakePage {
    async fn capture(&self) -> Result<Vec<u8>, PortError> {
        let mut state = self.state.lock();
        state.capture_count += 1;
        if state.fail_all_captures {
            return Err(PortError::CaptureFailed(
                "synthetic permanent failure".to_string(),
            ));
        }
        if let Some(reason) = state.capture_failures.pop_front() {
            return Err(PortError::CaptureFailed(reason.to_string()));
        }

        let dpr = state.cfg.device_pixel_ratio;
        let width = (state.cfg.viewport_width * dpr).round() as u32;
        let height = (state.cfg.viewport_height * dpr).round() as u32;
        let band = (state.scroll_y / state.cfg.viewport_height).floor() as usize;
        let color = BAND_PALETTE[band % BAND_PALETTE.len()];

        let img = ImageBuffer::from_pixel(width.max(1), height.max(1), Rgba(color));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|err| PortError::CaptureFailed(err.to_string()))?;
        Ok(buf)
    }
}
