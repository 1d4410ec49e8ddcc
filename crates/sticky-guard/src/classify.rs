//! First-match-wins classification of fixed/sticky elements.

use page_port::{FixedElementInfo, ViewportMetrics};

use crate::models::StickyClass;

/// Keywords that mark cookie/consent banners, matched case-insensitively
/// over text, classes and id.
const COOKIE_KEYWORDS: &[&str] = &[
    "cookie",
    "consent",
    "gdpr",
    "privacy notice",
    "we use cookies",
    "cmp-",
];

/// Known third-party overlay widgets: chat bubbles, cookie managers,
/// floating action buttons, social share docks, WhatsApp buttons and
/// accessibility widgets. Matched as substrings of selector, id or class.
const WIDGET_MARKERS: &[&str] = &[
    "intercom",
    "hubspot-messages",
    "drift-frame",
    "tidio",
    "crisp-client",
    "fc_frame",
    "zopim",
    "livechat",
    "tawk",
    "onetrust",
    "osano",
    "cookiebot",
    "addthis",
    "at-share-dock",
    "fb_dialog",
    "whatsapp",
    "wa.me",
    "back-to-top",
    "scroll-top",
    "floating-action",
    "fab-",
    "userway",
    "acsb",
    "accessibly",
    "accessibility-widget",
];

const HEADER_MARKERS: &[&str] = &["header", "navbar", "nav-bar", "top-bar", "masthead", "banner"];
const FOOTER_MARKERS: &[&str] = &["footer", "bottom-bar", "bottombar"];
const SIDEBAR_MARKERS: &[&str] = &["sidebar", "side-nav", "sidenav", "drawer", "rail"];

/// Geometry thresholds, in logical pixels or viewport fractions.
const EDGE_SNAP_PX: f64 = 16.0;
const FULL_WIDTH_FRACTION: f64 = 0.9;
const BAND_MIN_HEIGHT_PX: f64 = 24.0;
const BAND_MAX_HEIGHT_FRACTION: f64 = 0.4;
const SIDEBAR_MAX_WIDTH_FRACTION: f64 = 0.35;
const SIDEBAR_MIN_HEIGHT_FRACTION: f64 = 0.5;
const EXTREME_Z_INDEX: i64 = 10_000;
const CORNER_WIDGET_MAX_SIZE_PX: f64 = 160.0;
const CORNER_SNAP_PX: f64 = 120.0;

fn haystack(info: &FixedElementInfo) -> String {
    let mut parts = vec![info.selector.to_ascii_lowercase()];
    if let Some(id) = &info.id {
        parts.push(id.to_ascii_lowercase());
    }
    parts.extend(info.classes.iter().map(|c| c.to_ascii_lowercase()));
    parts.join(" ")
}

fn matches_any(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| haystack.contains(marker))
}

fn is_cookie_banner(info: &FixedElementInfo, haystack: &str) -> bool {
    let text = info.text_excerpt.to_ascii_lowercase();
    COOKIE_KEYWORDS
        .iter()
        .any(|kw| text.contains(kw) || haystack.contains(kw))
}

fn is_header(info: &FixedElementInfo, haystack: &str, viewport: &ViewportMetrics) -> bool {
    if info.tag_name.eq_ignore_ascii_case("header")
        || info.tag_name.eq_ignore_ascii_case("nav")
        || matches_any(haystack, HEADER_MARKERS)
    {
        return true;
    }
    let near_top = info.rect.y <= EDGE_SNAP_PX;
    let near_full_width = info.rect.width >= viewport.width * FULL_WIDTH_FRACTION;
    let plausible_height = info.rect.height >= BAND_MIN_HEIGHT_PX
        && info.rect.height <= viewport.height * BAND_MAX_HEIGHT_FRACTION;
    near_top && near_full_width && plausible_height
}

fn is_footer(info: &FixedElementInfo, haystack: &str, viewport: &ViewportMetrics) -> bool {
    if info.tag_name.eq_ignore_ascii_case("footer") || matches_any(haystack, FOOTER_MARKERS) {
        return true;
    }
    let near_bottom = info.rect.bottom() >= viewport.height - EDGE_SNAP_PX;
    let near_full_width = info.rect.width >= viewport.width * FULL_WIDTH_FRACTION;
    let plausible_height = info.rect.height >= BAND_MIN_HEIGHT_PX
        && info.rect.height <= viewport.height * BAND_MAX_HEIGHT_FRACTION;
    near_bottom && near_full_width && plausible_height
}

fn is_sidebar(info: &FixedElementInfo, haystack: &str, viewport: &ViewportMetrics) -> bool {
    if matches_any(haystack, SIDEBAR_MARKERS) {
        return true;
    }
    let narrow = info.rect.width <= viewport.width * SIDEBAR_MAX_WIDTH_FRACTION;
    let tall = info.rect.height >= viewport.height * SIDEBAR_MIN_HEIGHT_FRACTION;
    let against_edge =
        info.rect.x <= EDGE_SNAP_PX || info.rect.right() >= viewport.width - EDGE_SNAP_PX;
    narrow && tall && against_edge
}

fn is_heuristic_widget(info: &FixedElementInfo, viewport: &ViewportMetrics) -> bool {
    if info.z_index.map_or(false, |z| z >= EXTREME_Z_INDEX) {
        return true;
    }
    let small = info.rect.width <= CORNER_WIDGET_MAX_SIZE_PX
        && info.rect.height <= CORNER_WIDGET_MAX_SIZE_PX;
    let bottom_corner = info.rect.bottom() >= viewport.height - CORNER_SNAP_PX
        && (info.rect.x <= CORNER_SNAP_PX || info.rect.right() >= viewport.width - CORNER_SNAP_PX);
    small && bottom_corner && info.has_explicit_offsets
}

/// Classify a fixed/sticky element. Order matters: cookie banner, known
/// widget, header, footer, sidebar, widget by heuristics, other.
pub fn classify(info: &FixedElementInfo, viewport: &ViewportMetrics) -> StickyClass {
    let haystack = haystack(info);
    if is_cookie_banner(info, &haystack) {
        StickyClass::CookieBanner
    } else if matches_any(&haystack, WIDGET_MARKERS) {
        StickyClass::Widget
    } else if is_header(info, &haystack, viewport) {
        StickyClass::Header
    } else if is_footer(info, &haystack, viewport) {
        StickyClass::Footer
    } else if is_sidebar(info, &haystack, viewport) {
        StickyClass::Sidebar
    } else if is_heuristic_widget(info, viewport) {
        StickyClass::Widget
    } else {
        StickyClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::NodeHandle;
    use pageproof_core_types::Rect;

    fn viewport() -> ViewportMetrics {
        ViewportMetrics {
            width: 1280.0,
            height: 800.0,
            scroll_y: 0.0,
            device_pixel_ratio: 1.0,
        }
    }

    fn element(rect: Rect) -> FixedElementInfo {
        FixedElementInfo {
            handle: NodeHandle(1),
            selector: "div".to_string(),
            tag_name: "div".to_string(),
            id: None,
            classes: vec![],
            text_excerpt: String::new(),
            rect,
            z_index: None,
            has_explicit_offsets: false,
            position: "fixed".to_string(),
        }
    }

    #[test]
    fn cookie_text_wins_over_header_geometry() {
        let mut el = element(Rect::new(0.0, 0.0, 1280.0, 90.0));
        el.text_excerpt = "We use cookies to improve your experience".to_string();
        assert_eq!(classify(&el, &viewport()), StickyClass::CookieBanner);
    }

    #[test]
    fn known_widget_by_class_marker() {
        let mut el = element(Rect::new(1180.0, 700.0, 80.0, 80.0));
        el.classes = vec!["intercom-lightweight-app".to_string()];
        assert_eq!(classify(&el, &viewport()), StickyClass::Widget);
    }

    #[test]
    fn header_by_tag() {
        let mut el = element(Rect::new(0.0, 120.0, 400.0, 60.0));
        el.tag_name = "header".to_string();
        assert_eq!(classify(&el, &viewport()), StickyClass::Header);
    }

    #[test]
    fn header_by_geometry() {
        let el = element(Rect::new(0.0, 0.0, 1280.0, 72.0));
        assert_eq!(classify(&el, &viewport()), StickyClass::Header);
    }

    #[test]
    fn footer_by_geometry() {
        let el = element(Rect::new(0.0, 740.0, 1280.0, 60.0));
        assert_eq!(classify(&el, &viewport()), StickyClass::Footer);
    }

    #[test]
    fn sidebar_by_geometry() {
        let el = element(Rect::new(0.0, 100.0, 280.0, 700.0));
        assert_eq!(classify(&el, &viewport()), StickyClass::Sidebar);
    }

    #[test]
    fn extreme_z_index_is_a_widget() {
        let mut el = element(Rect::new(500.0, 300.0, 300.0, 300.0));
        el.z_index = Some(2_147_483_647);
        assert_eq!(classify(&el, &viewport()), StickyClass::Widget);
    }

    #[test]
    fn small_bottom_corner_with_offsets_is_a_widget() {
        let mut el = element(Rect::new(1190.0, 720.0, 64.0, 64.0));
        el.has_explicit_offsets = true;
        assert_eq!(classify(&el, &viewport()), StickyClass::Widget);
    }

    #[test]
    fn unmatched_element_is_other() {
        let el = element(Rect::new(400.0, 300.0, 500.0, 200.0));
        assert_eq!(classify(&el, &viewport()), StickyClass::Other);
    }
}
