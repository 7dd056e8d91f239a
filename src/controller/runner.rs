use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{ClusterMutator, ClusterStateProvider, KubeCluster};
use crate::config::AppConfig;
use crate::engine::{scope, sequencer, ConfirmStep, Diagnoser, Executor, Scope};
use crate::error::Result;
use crate::eventbus::EventBus;
use crate::models::{
    Diagnosis, DiagnosticEvent, ExecutionMode, ExecutionReport, HealthReport, NamespacePlan,
    NamespaceReport, RunReport, VerificationOutcome,
};

/// One diagnoser/remediator wired to a cluster. Each call to `diagnose`,
/// `fix` or `health` is an independent pass over fresh cluster state.
pub struct Runner {
    provider: Arc<dyn ClusterStateProvider>,
    mutator: Arc<dyn ClusterMutator>,
    config: AppConfig,
    event_bus: EventBus,
    running: Arc<RwLock<bool>>,
}

impl Runner {
    pub fn new(
        provider: Arc<dyn ClusterStateProvider>,
        mutator: Arc<dyn ClusterMutator>,
        config: AppConfig,
    ) -> Self {
        Self {
            provider,
            mutator,
            config,
            event_bus: EventBus::new(),
            running: Arc::new(RwLock::new(true)),
        }
    }

    pub async fn connect(config: AppConfig) -> Result<Self> {
        let cluster = Arc::new(KubeCluster::connect(&config.kube).await?);
        Ok(Self::new(cluster.clone(), cluster, config))
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stops any further mutating calls of the current and later passes.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        warn!("Stop requested, no further changes will be made");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    fn diagnoser(&self) -> Diagnoser {
        Diagnoser::new(self.provider.clone(), self.config.diagnosis.clone())
    }

    fn concurrency(&self) -> usize {
        self.config.remediation.max_concurrency.max(1)
    }

    pub async fn diagnose(&self, target: Option<&str>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let mut report = RunReport::new(run_id, target.map(String::from), None);

        let snapshots = match scope::resolve(self.provider.as_ref(), target).await? {
            Scope::NotFound(name) => {
                report.not_found = Some(name);
                return Ok(report);
            }
            Scope::Namespaces(snapshots) => snapshots,
        };
        self.event_bus.publish(DiagnosticEvent::scope_resolved(
            run_id,
            snapshots.iter().map(|s| s.name.clone()).collect(),
        ));

        if snapshots.is_empty() {
            info!("No terminating namespaces found");
            return Ok(report);
        }

        let diagnoser = self.diagnoser();
        let any_terminating = snapshots.iter().any(|s| s.is_terminating());
        let (cluster, discovery) = if any_terminating {
            let cluster = diagnoser.collector().cluster_view().await;
            let discovery = diagnoser.collector().discover_kinds().await;
            (cluster, discovery)
        } else {
            Default::default()
        };

        let mut diagnoses: Vec<Diagnosis> = stream::iter(snapshots)
            .map(|snapshot| {
                let diagnoser = &diagnoser;
                let discovery = &discovery;
                let cluster = &cluster;
                async move {
                    let diagnosis = diagnoser.diagnose(snapshot, discovery, cluster).await;
                    self.event_bus
                        .publish(DiagnosticEvent::namespace_diagnosed(run_id, &diagnosis));
                    diagnosis
                }
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        diagnoses.sort_by(|a, b| a.namespace().cmp(b.namespace()));

        report.cluster = cluster;
        report.namespaces = diagnoses
            .into_iter()
            .map(|diagnosis| NamespaceReport {
                plan: sequencer::plan(&diagnosis.blockers),
                diagnosis,
                execution: None,
                verification: None,
            })
            .collect();

        info!(
            "Diagnosed {} namespace(s), {} blocked",
            report.namespaces.len(),
            report.blocked_count()
        );
        Ok(report)
    }

    /// Diagnoses, then executes the merged plan: shared APIService deletions
    /// once, then each namespace's own steps on one worker per namespace,
    /// then one verification per remediated namespace.
    pub async fn fix(
        &self,
        target: Option<&str>,
        mode: ExecutionMode,
        confirm: &dyn ConfirmStep,
    ) -> Result<RunReport> {
        let mut report = self.diagnose(target).await?;
        report.mode = Some(mode);

        let plans: Vec<NamespacePlan> = report
            .namespaces
            .iter()
            .map(|n| NamespacePlan {
                namespace: n.namespace().to_string(),
                steps: n.plan.clone(),
            })
            .collect();
        let remediated: HashSet<String> = plans
            .iter()
            .filter(|p| !p.steps.is_empty())
            .map(|p| p.namespace.clone())
            .collect();
        if remediated.is_empty() {
            info!("Nothing to remediate");
            return Ok(report);
        }

        let merged = sequencer::merge_plans(&plans);
        let executor = Executor::new(
            self.mutator.clone(),
            Duration::from_secs(self.config.remediation.verification_wait_seconds),
        )
        .with_running_flag(self.running.clone())
        .with_events(self.event_bus.clone(), report.run_id);
        let diagnoser = self.diagnoser();

        if !merged.shared.is_empty() {
            info!(
                "Resolving {} unavailable APIService(s) before namespace steps",
                merged.shared.len()
            );
            report.shared_execution = Some(executor.execute(&merged.shared, mode, confirm).await);
        }

        // prompts must never interleave
        let concurrency = match mode {
            ExecutionMode::ApplyWithConfirmation => 1,
            _ => self.concurrency(),
        };

        let results: Vec<(String, ExecutionReport, Option<VerificationOutcome>)> =
            stream::iter(merged.namespaces)
                .filter(|plan| futures::future::ready(remediated.contains(&plan.namespace)))
                .map(|plan| {
                    let executor = &executor;
                    let diagnoser = &diagnoser;
                    async move {
                        let execution = executor.execute(&plan.steps, mode, confirm).await;
                        let verification = if mode.mutates() && executor.is_running().await {
                            Some(executor.verify(&plan.namespace, diagnoser).await)
                        } else {
                            None
                        };
                        (plan.namespace, execution, verification)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut by_namespace: HashMap<String, (ExecutionReport, Option<VerificationOutcome>)> =
            results
                .into_iter()
                .map(|(namespace, execution, verification)| {
                    (namespace, (execution, verification))
                })
                .collect();
        for namespace_report in &mut report.namespaces {
            if let Some((execution, verification)) =
                by_namespace.remove(namespace_report.namespace())
            {
                namespace_report.execution = Some(execution);
                namespace_report.verification = verification;
            }
        }

        report.cancelled = !self.is_running().await;
        debug!(
            "Run {} finished, unresolved: {}",
            report.run_id,
            report.has_unresolved()
        );
        Ok(report)
    }

    /// Cluster-wide summary of everything that can keep namespaces stuck.
    pub async fn health(&self) -> Result<HealthReport> {
        let terminating = scope::resolve(self.provider.as_ref(), None).await?;
        let cluster = self.diagnoser().collector().cluster_view().await;

        Ok(HealthReport {
            unavailable_api_services: cluster.unavailable_api_services().cloned().collect(),
            broken_webhooks: cluster
                .webhooks
                .iter()
                .filter(|w| w.has_missing_service() || w.unreachable_services().next().is_some())
                .cloned()
                .collect(),
            terminating_namespaces: terminating.namespace_names(),
            notes: cluster.notes,
        })
    }
}
