use page_port::StyleSnapshot;
use pageproof_core_types::BandCapture;
use serde::{Deserialize, Serialize};

/// Classification assigned to a fixed/sticky element; first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StickyClass {
    Header,
    Footer,
    CookieBanner,
    Widget,
    Sidebar,
    Other,
}

impl StickyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::CookieBanner => "cookie-banner",
            Self::Widget => "widget",
            Self::Sidebar => "sidebar",
            Self::Other => "other",
        }
    }
}

/// What was done to a classified element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StickyAction {
    /// Band-captured once, then removed from the scrolling layers.
    CapturedOnce,
    Hidden,
    /// Re-anchored to document-relative absolute positioning.
    Repositioned,
}

/// One reversible change made during sticky handling. The union of all
/// records' style snapshots restores the page to its pre-capture layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyElementRecord {
    pub selector: String,
    pub classification: StickyClass,
    pub original_style: StyleSnapshot,
    pub action: StickyAction,
}

/// Outcome of the one-time sticky-handling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyHandlingResult {
    pub records: Vec<StickyElementRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<BandCapture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<BandCapture>,
    /// Human-readable summary of every modification, in order.
    pub modifications: Vec<String>,
}

impl StickyHandlingResult {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            header: None,
            footer: None,
            modifications: Vec::new(),
        }
    }
}
