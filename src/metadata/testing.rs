//! In-memory `LabelStore`

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LabelStore, MetadataError};

#[derive(Default)]
struct MemoryState {
    labels: BTreeMap<String, String>,
    patches: Vec<(String, String)>,
    fail_reads: bool,
    fail_patches: bool,
}

#[derive(Default)]
pub struct MemoryLabelStore {
    state: Mutex<MemoryState>,
}

impl MemoryLabelStore {
    pub fn with_labels(pairs: &[(&str, &str)]) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().labels = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        store
    }

    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    pub fn fail_patches(&self) {
        self.state.lock().unwrap().fail_patches = true;
    }

    /// Successful patches in order
    pub fn patches(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().labels.get(key).cloned()
    }
}

#[async_trait]
impl LabelStore for MemoryLabelStore {
    async fn read_labels(&self) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return BTreeMap::new();
        }
        state.labels.clone()
    }

    async fn patch_label(&self, key: &str, value: &str) -> Result<(), MetadataError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_patches {
            return Err(MetadataError::Api {
                op: "patch_label",
                pod: "mysql-0".to_string(),
                message: "forbidden".to_string(),
            });
        }
        state.labels.insert(key.to_string(), value.to_string());
        state.patches.push((key.to_string(), value.to_string()));
        Ok(())
    }
}
