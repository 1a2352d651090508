//! Node label publication
//!
//! Labels are the cluster-visible record of this node's role and health.
//! Writes are JSON merge patches touching a single key.

mod pod;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;

pub use pod::PodLabelStore;

/// Label store error
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Kubernetes client unavailable: {0}")]
    Client(String),

    #[error("{op} on pod {pod} timed out")]
    Timeout { op: &'static str, pod: String },

    #[error("{op} on pod {pod} failed: {message}")]
    Api {
        op: &'static str,
        pod: String,
        message: String,
    },
}

/// Merge patch changing one label and nothing else
pub fn label_patch(key: &str, value: &str) -> serde_json::Value {
    json!({ "metadata": { "labels": { key: value } } })
}

/// Read and patch the labels of this node
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Current labels; empty when they cannot be read
    async fn read_labels(&self) -> BTreeMap<String, String>;

    async fn patch_label(&self, key: &str, value: &str) -> Result<(), MetadataError>;

    /// Patch `key` only when its stored value differs
    ///
    /// Returns whether a write happened.
    async fn publish_if_changed(&self, key: &str, value: &str) -> Result<bool, MetadataError> {
        let labels = self.read_labels().await;
        if labels.get(key).map(String::as_str) == Some(value) {
            return Ok(false);
        }
        self.patch_label(key, value).await?;
        Ok(true)
    }
}
