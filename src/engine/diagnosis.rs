use std::sync::Arc;
use tracing::{debug, info};

use super::collector::Collector;
use super::evaluator::evaluate;
use crate::clients::ClusterStateProvider;
use crate::config::DiagnosisConfig;
use crate::error::Result;
use crate::models::{ClusterView, Diagnosis, NamespaceSnapshot, ResourceDiscovery, ResourceInventory};

pub struct Diagnoser {
    provider: Arc<dyn ClusterStateProvider>,
    collector: Collector,
}

impl Diagnoser {
    pub fn new(provider: Arc<dyn ClusterStateProvider>, config: DiagnosisConfig) -> Self {
        let collector = Collector::new(provider.clone(), config);
        Self {
            provider,
            collector,
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Diagnoses one namespace against a cluster view shared by the pass.
    /// Namespaces that are not terminating are not enumerated at all.
    pub async fn diagnose(
        &self,
        snapshot: NamespaceSnapshot,
        discovery: &ResourceDiscovery,
        cluster: &ClusterView,
    ) -> Diagnosis {
        if !snapshot.is_terminating() {
            debug!(
                "Namespace {} is {}, nothing to diagnose",
                snapshot.name, snapshot.phase
            );
            let note = format!("namespace is {}, not Terminating", snapshot.phase);
            return Diagnosis {
                snapshot,
                inventory: ResourceInventory::new(),
                blockers: Vec::new(),
                notes: vec![note],
            };
        }

        let inventory = self.collector.inventory(&snapshot.name, discovery).await;
        let blockers = evaluate(&snapshot, &inventory, cluster);

        let mut notes = cluster.notes.clone();
        if !inventory.omitted.is_empty() {
            notes.push(format!(
                "could not list {}; counted as zero",
                inventory.omitted.join(", ")
            ));
        }

        info!(
            "Namespace {}: {} blocker(s)",
            snapshot.name,
            blockers.len()
        );
        for blocker in &blockers {
            debug!("  {}", blocker);
        }

        Diagnosis {
            snapshot,
            inventory,
            blockers,
            notes,
        }
    }

    /// Re-reads the namespace and the cluster state and diagnoses again.
    /// `None` means the namespace is gone.
    pub async fn rediagnose(&self, namespace: &str) -> Result<Option<Diagnosis>> {
        let Some(snapshot) = self.provider.get_namespace(namespace).await? else {
            return Ok(None);
        };

        if !snapshot.is_terminating() {
            let diagnosis = self
                .diagnose(snapshot, &ResourceDiscovery::default(), &ClusterView::default())
                .await;
            return Ok(Some(diagnosis));
        }

        let cluster = self.collector.cluster_view().await;
        let discovery = self.collector.discover_kinds().await;
        Ok(Some(self.diagnose(snapshot, &discovery, &cluster).await))
    }
}
