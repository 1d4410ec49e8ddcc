//! Result types exposed to downstream collaborators.

use chrono::{DateTime, Utc};
use integrity_chain::IntegrityHashes;
use pageproof_core_types::TruncationReason;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Image bytes travel base64-encoded on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// How much of the page one session covered, derived once and immutable
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScope {
    pub total_page_height: f64,
    pub captured_height: f64,
    pub was_truncated: bool,
    pub truncation_reason: Option<TruncationReason>,
    pub infinite_scroll_detected: bool,
    pub scroll_height_growth_ratio: f64,
}

/// One side of a dual-mode capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeCapture {
    #[serde(with = "base64_bytes")]
    pub image_data: Vec<u8>,
    pub image_hash: String,
    pub captured_at: DateTime<Utc>,
    /// Empty for the raw capture by definition.
    pub modifications: Vec<String>,
}

/// Paired raw/enhanced captures of the same moment-in-time content. The
/// raw side precedes any DOM mutation; the enhanced side follows sticky
/// handling and carries the full modification list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualModeCapture {
    pub raw: ModeCapture,
    pub enhanced: ModeCapture,
    pub time_difference_ms: i64,
}

impl DualModeCapture {
    pub fn pair(raw: ModeCapture, enhanced: ModeCapture) -> Self {
        let time_difference_ms = (enhanced.captured_at - raw.captured_at)
            .num_milliseconds()
            .max(0);
        Self {
            raw,
            enhanced,
            time_difference_ms,
        }
    }
}

/// Final session output. Field presence follows configuration: HTML and
/// metadata blocks only appear when their collection was enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub success: bool,
    #[serde(with = "base64_bytes")]
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub image_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_hash: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_hashes: Option<IntegrityHashes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dual_mode_capture: Option<DualModeCapture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_scope: Option<CaptureScope>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_mode_time_difference_is_never_negative() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(40);
        let raw = ModeCapture {
            image_data: vec![1],
            image_hash: "img_a".to_string(),
            captured_at: earlier,
            modifications: vec![],
        };
        let enhanced = ModeCapture {
            image_data: vec![2],
            image_hash: "img_b".to_string(),
            captured_at: later,
            modifications: vec!["header hidden".to_string()],
        };
        assert_eq!(DualModeCapture::pair(raw.clone(), enhanced.clone()).time_difference_ms, 40);

        // Clock skew cannot drive the pair negative.
        let skewed = DualModeCapture::pair(enhanced, raw);
        assert_eq!(skewed.time_difference_ms, 0);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let result = CaptureResult {
            success: true,
            image_data: vec![0, 1, 2],
            width: 800,
            height: 600,
            image_hash: "img_x".to_string(),
            html_content: None,
            html_hash: None,
            metadata: None,
            metadata_hash: None,
            duration_ms: 12,
            integrity_hashes: None,
            dual_mode_capture: None,
            capture_scope: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("htmlContent").is_none());
        assert!(json.get("metadataHash").is_none());
        assert_eq!(json["imageHash"], "img_x");
        // Image bytes are base64 on the wire.
        assert_eq!(json["imageData"], "AAEC");
    }

    #[test]
    fn scope_serializes_null_reason_for_untruncated_pages() {
        let scope = CaptureScope {
            total_page_height: 3_000.0,
            captured_height: 3_000.0,
            was_truncated: false,
            truncation_reason: None,
            infinite_scroll_detected: false,
            scroll_height_growth_ratio: 0.02,
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert!(json["truncationReason"].is_null());
    }
}
