//! Bounded-timeout content hashing.

use std::time::Duration;

use blake3::Hasher;
use serde_json::Value;
use tokio::time::timeout;

use crate::errors::IntegrityError;

pub(crate) fn hash_bytes(prefix: &str, bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    format!("{}_{}", prefix, hasher.finalize().to_hex())
}

/// Hashes capture artifacts with a purpose prefix on the digest. Every
/// computation runs on the blocking pool under one time budget; image
/// payloads can be tens of megabytes.
#[derive(Debug, Clone)]
pub struct HashService {
    budget: Duration,
}

impl HashService {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    async fn run(&self, prefix: &'static str, bytes: Vec<u8>) -> Result<String, IntegrityError> {
        let task = tokio::task::spawn_blocking(move || hash_bytes(prefix, &bytes));
        match timeout(self.budget, task).await {
            Ok(Ok(digest)) => Ok(digest),
            Ok(Err(err)) => Err(IntegrityError::TaskFailed(err.to_string())),
            Err(_) => Err(IntegrityError::HashTimeout),
        }
    }

    /// Hash an encoded image, `img_`-prefixed.
    pub async fn hash_image(&self, bytes: &[u8]) -> Result<String, IntegrityError> {
        self.run("img", bytes.to_vec()).await
    }

    /// Hash a DOM-structure signature string, `dom_`-prefixed.
    pub async fn hash_dom_signature(&self, signature: &str) -> Result<String, IntegrityError> {
        self.run("dom", signature.as_bytes().to_vec()).await
    }

    /// Hash page HTML, `html_`-prefixed.
    pub async fn hash_html(&self, html: &str) -> Result<String, IntegrityError> {
        self.run("html", html.as_bytes().to_vec()).await
    }

    /// Hash JSON metadata in its canonical serialized form,
    /// `meta_`-prefixed.
    pub async fn hash_metadata(&self, metadata: &Value) -> Result<String, IntegrityError> {
        let bytes = serde_json::to_vec(metadata)
            .map_err(|err| IntegrityError::Serialize(err.to_string()))?;
        self.run("meta", bytes).await
    }
}
