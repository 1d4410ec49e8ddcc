//! Order-independent DOM-structure signature.

use page_port::{ElementDescriptor, PagePort};

use crate::errors::IntegrityError;

/// Controls which elements enter the signature and how much text each
/// contributes.
#[derive(Debug, Clone)]
pub struct SignatureOptions {
    /// Skip elements that do not render.
    pub exclude_invisible: bool,
    /// Characters of text content kept per element.
    pub text_excerpt_len: usize,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            exclude_invisible: true,
            text_excerpt_len: 40,
        }
    }
}

fn element_tuple(el: &ElementDescriptor, text_excerpt_len: usize) -> String {
    let id = el.id.as_deref().unwrap_or("");
    let classes = el.classes.join(".");
    let text: String = el.text_excerpt.chars().take(text_excerpt_len).collect();
    // Bounding boxes are rounded to whole pixels so sub-pixel layout
    // jitter does not flip the verdict.
    format!(
        "{}#{}.{}@{},{},{}x{}:{}",
        el.tag_name.to_ascii_lowercase(),
        id,
        classes,
        el.rect.x.round(),
        el.rect.y.round(),
        el.rect.width.round(),
        el.rect.height.round(),
        text
    )
}

/// Build the page's structure signature: one tuple per element, sorted
/// lexicographically so the result is robust to non-deterministic
/// traversal order, joined into a single string.
pub async fn dom_signature(
    port: &dyn PagePort,
    options: &SignatureOptions,
) -> Result<String, IntegrityError> {
    let inventory = port.element_inventory(!options.exclude_invisible).await?;
    let mut tuples: Vec<String> = inventory
        .iter()
        .filter(|el| el.visible || !options.exclude_invisible)
        .map(|el| element_tuple(el, options.text_excerpt_len))
        .collect();
    tuples.sort_unstable();
    Ok(tuples.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageproof_core_types::Rect;

    fn descriptor(tag: &str, id: &str, y: f64) -> ElementDescriptor {
        ElementDescriptor {
            tag_name: tag.to_string(),
            id: Some(id.to_string()),
            classes: vec!["c".to_string()],
            rect: Rect::new(0.0, y, 100.0, 50.0),
            text_excerpt: "text".to_string(),
            visible: true,
        }
    }

    #[test]
    fn tuples_round_geometry() {
        let mut el = descriptor("div", "a", 10.2);
        el.rect.width = 99.6;
        let tuple = element_tuple(&el, 40);
        assert!(tuple.contains("@0,10,100x50"), "tuple: {tuple}");
    }

    #[test]
    fn signature_is_traversal_order_independent() {
        let forward = [descriptor("div", "a", 0.0), descriptor("p", "b", 50.0)];
        let backward = [descriptor("p", "b", 50.0), descriptor("div", "a", 0.0)];

        let mut forward: Vec<String> = forward.iter().map(|e| element_tuple(e, 40)).collect();
        let mut backward: Vec<String> = backward.iter().map(|e| element_tuple(e, 40)).collect();
        forward.sort_unstable();
        backward.sort_unstable();
        assert_eq!(forward.join("|"), backward.join("|"));
    }

    #[test]
    fn text_excerpt_is_truncated() {
        let mut el = descriptor("div", "a", 0.0);
        el.text_excerpt = "x".repeat(200);
        let tuple = element_tuple(&el, 40);
        assert!(tuple.ends_with(&"x".repeat(40)));
        assert!(!tuple.ends_with(&"x".repeat(41)));
    }
}
