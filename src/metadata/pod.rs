use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::{debug, info, warn};

use super::{label_patch, LabelStore, MetadataError};
use crate::config::{MetadataConfig, NodeConfig};

const FIELD_MANAGER: &str = "mysql-role-coordinator";

/// Labels of this node's pod, through the Kubernetes API
pub struct PodLabelStore {
    api: Api<Pod>,
    pod_name: String,
    timeout: Duration,
}

impl PodLabelStore {
    pub fn new(client: Client, node: &NodeConfig, config: &MetadataConfig) -> Self {
        Self {
            api: Api::namespaced(client, &node.namespace),
            pod_name: node.pod_name.clone(),
            timeout: config.timeout(),
        }
    }

    /// Build from the in-cluster or kubeconfig environment
    pub async fn connect(node: &NodeConfig, config: &MetadataConfig) -> Result<Self, MetadataError> {
        let client = tokio::time::timeout(config.timeout(), Client::try_default())
            .await
            .map_err(|_| MetadataError::Client("timed out building client".to_string()))?
            .map_err(|e| MetadataError::Client(e.to_string()))?;
        Ok(Self::new(client, node, config))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, MetadataError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(MetadataError::Api {
                op,
                pod: self.pod_name.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(MetadataError::Timeout {
                op,
                pod: self.pod_name.clone(),
            }),
        }
    }
}

#[async_trait]
impl LabelStore for PodLabelStore {
    async fn read_labels(&self) -> BTreeMap<String, String> {
        match self.bounded("read_labels", self.api.get(&self.pod_name)).await {
            Ok(pod) => pod.metadata.labels.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read pod labels");
                BTreeMap::new()
            }
        }
    }

    async fn patch_label(&self, key: &str, value: &str) -> Result<(), MetadataError> {
        let patch = label_patch(key, value);
        let pp = PatchParams::apply(FIELD_MANAGER);
        debug!(pod = %self.pod_name, key, value, "Patching pod label");

        self.bounded(
            "patch_label",
            self.api.patch(&self.pod_name, &pp, &Patch::Merge(&patch)),
        )
        .await?;

        info!(pod = %self.pod_name, key, value, "Pod label updated");
        Ok(())
    }
}
