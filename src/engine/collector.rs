use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::ClusterStateProvider;
use crate::config::DiagnosisConfig;
use crate::models::{ClusterView, ResourceDiscovery, ResourceInventory, ResourceKind};

/// Parallel list calls per namespace inventory.
const LIST_CONCURRENCY: usize = 8;

/// Reads cluster state for the evaluator. Read failures never abort a pass:
/// they become notes and empty (not healthy) results.
pub struct Collector {
    provider: Arc<dyn ClusterStateProvider>,
    config: DiagnosisConfig,
}

impl Collector {
    pub fn new(provider: Arc<dyn ClusterStateProvider>, config: DiagnosisConfig) -> Self {
        Self { provider, config }
    }

    pub async fn cluster_view(&self) -> ClusterView {
        let mut view = ClusterView::default();

        match self.provider.list_api_services().await {
            Ok(api_services) => view.api_services = api_services,
            Err(e) => {
                warn!("Failed to read APIService health: {}", e);
                view.notes
                    .push(format!("APIService health unknown: {}", e));
            }
        }

        match self.provider.list_webhooks().await {
            Ok(webhooks) => view.webhooks = webhooks,
            Err(e) => {
                warn!("Failed to read webhook configurations: {}", e);
                view.notes
                    .push(format!("webhook configurations unknown: {}", e));
            }
        }

        debug!(
            "Cluster view: {} APIServices ({} unavailable), {} webhook configurations",
            view.api_services.len(),
            view.unavailable_api_services().count(),
            view.webhooks.len()
        );
        view
    }

    pub async fn discover_kinds(&self) -> ResourceDiscovery {
        match self.provider.list_resource_kinds().await {
            Ok(mut discovery) => {
                discovery.kinds.retain(|k| !self.is_skipped(k));
                discovery.kinds.sort();
                discovery.kinds.dedup();
                discovery
            }
            Err(e) => {
                warn!("Resource discovery failed: {}", e);
                ResourceDiscovery {
                    kinds: Vec::new(),
                    failed_groups: vec![format!("all API groups ({})", e)],
                }
            }
        }
    }

    /// Counts every discovered kind in `namespace`. A kind whose listing
    /// fails counts as zero and is recorded as omitted.
    pub async fn inventory(&self, namespace: &str, discovery: &ResourceDiscovery) -> ResourceInventory {
        let mut inventory = ResourceInventory::new();
        for group in &discovery.failed_groups {
            inventory.omit(group.clone());
        }

        let sample = self.config.sample_size;
        let counts: Vec<_> = stream::iter(discovery.kinds.iter())
            .map(|kind| async move {
                let result = self.provider.count_resources(kind, namespace, sample).await;
                (kind.clone(), result)
            })
            .buffer_unordered(LIST_CONCURRENCY)
            .collect()
            .await;

        for (kind, result) in counts {
            match result {
                Ok(count) => inventory.record(kind, count),
                // the kind disappeared between discovery and listing
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!("Could not list {} in {}: {}", kind, namespace, e);
                    inventory.omit(kind.qualified_name());
                }
            }
        }

        inventory.sort();
        debug!(
            "Inventory of {}: {} live resources across {} kinds, {} omitted",
            namespace,
            inventory.total(),
            inventory.entries.len(),
            inventory.omitted.len()
        );
        inventory
    }

    fn is_skipped(&self, kind: &ResourceKind) -> bool {
        self.config.skip_kinds.iter().any(|s| kind.matches_name(s))
    }
}
