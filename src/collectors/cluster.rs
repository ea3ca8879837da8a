use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::collectors::kubectl::KubectlCollector;
use crate::constants::{CLUSTER_COLLECTION_DIR, KUBERNETES_RESOURCES};
use crate::models::CollectedFile;

/// What a cluster-wide collector produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterCollection {
    pub collected: Vec<CollectedFile>,
    pub skipped: Vec<String>,
}

/// Collection that belongs to the cluster as a whole rather than one node.
///
/// Runs on its own thread alongside the per-node captures and writes
/// straight into the staging tree.
pub trait ClusterCollector: Send + Sync {
    fn name(&self) -> String;
    fn collect(&self, staging_dir: &Path) -> Result<ClusterCollection>;
}

/// Dumps namespace-level Kubernetes resources as YAML.
pub struct KubernetesResourceCollector {
    kubectl: Arc<KubectlCollector>,
    resources: Vec<String>,
}

impl KubernetesResourceCollector {
    pub fn new(kubectl: Arc<KubectlCollector>) -> Self {
        Self {
            kubectl,
            resources: KUBERNETES_RESOURCES.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn with_resources(kubectl: Arc<KubectlCollector>, resources: Vec<String>) -> Self {
        Self { kubectl, resources }
    }
}

impl ClusterCollector for KubernetesResourceCollector {
    fn name(&self) -> String {
        "kubernetes-resources".to_string()
    }

    fn collect(&self, staging_dir: &Path) -> Result<ClusterCollection> {
        let out_dir = staging_dir.join(CLUSTER_COLLECTION_DIR);
        fs::create_dir_all(&out_dir).context(format!("Failed to create {}", out_dir.display()))?;

        let mut result = ClusterCollection::default();
        for resource in &self.resources {
            let file_name = format!("{}.yaml", resource);
            match self.kubectl.get_resource(resource) {
                Ok(yaml) => {
                    let path = out_dir.join(&file_name);
                    fs::write(&path, &yaml).context(format!("Failed to write {}", path.display()))?;
                    result.collected.push(CollectedFile {
                        path: format!("{}/{}", CLUSTER_COLLECTION_DIR, file_name),
                        size: yaml.len() as u64,
                    });
                }
                Err(e) => {
                    warn!("skipping {} for namespace {}: {}", resource, self.kubectl.config().namespace, e);
                    result.skipped.push(format!("{}/{}", CLUSTER_COLLECTION_DIR, file_name));
                }
            }
        }

        info!(
            "collected {} kubernetes resource listings ({} skipped)",
            result.collected.len(),
            result.skipped.len()
        );
        Ok(result)
    }
}
