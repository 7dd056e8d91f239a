use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::diagnosis::Diagnoser;
use crate::clients::ClusterMutator;
use crate::eventbus::EventBus;
use crate::models::{
    DiagnosticEvent, ExecutionMode, ExecutionReport, MutationOutcome, NamespacePhase,
    RemediationStep, StepReport, StepStatus, VerificationOutcome,
};

/// Per-step yes/no decision supplied by the caller for
/// `ExecutionMode::ApplyWithConfirmation`.
pub trait ConfirmStep: Send + Sync {
    fn confirm(&self, step: &RemediationStep) -> bool;
}

impl<F> ConfirmStep for F
where
    F: Fn(&RemediationStep) -> bool + Send + Sync,
{
    fn confirm(&self, step: &RemediationStep) -> bool {
        self(step)
    }
}

/// Runs remediation steps through the mutator. A failed step never aborts
/// the rest of the plan; nothing is retried. A cluster-scoped step shared by
/// several namespace plans is decided and applied once per executor.
pub struct Executor {
    mutator: Arc<dyn ClusterMutator>,
    verification_wait: Duration,
    running: Arc<RwLock<bool>>,
    events: Option<(EventBus, Uuid)>,
    settled: Mutex<HashMap<RemediationStep, StepStatus>>,
}

impl Executor {
    pub fn new(mutator: Arc<dyn ClusterMutator>, verification_wait: Duration) -> Self {
        Self {
            mutator,
            verification_wait,
            running: Arc::new(RwLock::new(true)),
            events: None,
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Shares the stop flag with another owner, e.g. a signal handler.
    pub fn with_running_flag(mut self, running: Arc<RwLock<bool>>) -> Self {
        self.running = running;
        self
    }

    pub fn with_events(mut self, event_bus: EventBus, run_id: Uuid) -> Self {
        self.events = Some((event_bus, run_id));
        self
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Stops issuing mutating calls. Steps already applied stay applied.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Remediation stopped, remaining steps will be skipped");
    }

    pub async fn execute(
        &self,
        steps: &[RemediationStep],
        mode: ExecutionMode,
        confirm: &dyn ConfirmStep,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for step in steps {
            let status = if !mode.mutates() {
                debug!("Dry run: {}", step);
                StepStatus::Planned
            } else if !self.is_running().await {
                StepStatus::Cancelled
            } else if let Some(previous) = self.settled_status(step).await {
                debug!("{} already handled in this run: {}", step, previous);
                previous
            } else {
                let status = if mode == ExecutionMode::ApplyWithConfirmation
                    && !confirm.confirm(step)
                {
                    info!("Skipping {}: not confirmed", step);
                    StepStatus::Declined
                } else {
                    self.apply(step).await
                };
                if step.is_cluster_scoped() {
                    self.settled.lock().await.insert(step.clone(), status.clone());
                }
                status
            };

            self.publish(StepReport {
                step: step.clone(),
                status: status.clone(),
                finished_at: chrono::Utc::now(),
            });
            report.push(step.clone(), status);
        }

        report
    }

    async fn settled_status(&self, step: &RemediationStep) -> Option<StepStatus> {
        if !step.is_cluster_scoped() {
            return None;
        }
        self.settled.lock().await.get(step).cloned()
    }

    /// Executes one step. "Already gone" is success.
    pub async fn apply(&self, step: &RemediationStep) -> StepStatus {
        info!("Applying {}", step);

        let result = match step {
            RemediationStep::DeleteApiService { name } => {
                self.mutator.delete_api_service(name).await
            }
            RemediationStep::ForceDeleteResources { namespace, kind } => {
                self.mutator.force_delete_resources(namespace, kind).await
            }
            RemediationStep::DeleteWebhook { kind, name } => {
                self.mutator.delete_webhook(*kind, name).await
            }
            RemediationStep::ClearFinalizers { namespace } => {
                self.mutator.clear_finalizers(namespace).await
            }
        };

        match result {
            Ok(MutationOutcome::Applied { detail }) => StepStatus::Applied { detail },
            Ok(MutationOutcome::AlreadyAbsent) => {
                debug!("{} already in desired state", step);
                StepStatus::AlreadyAbsent
            }
            Err(e) if e.is_not_found() => StepStatus::AlreadyAbsent,
            Err(e) => {
                error!("{} failed: {}", step, e);
                StepStatus::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Waits once for the bounded verification delay, then re-reads the
    /// namespace. A namespace still terminating is diagnosed again.
    pub async fn verify(&self, namespace: &str, diagnoser: &Diagnoser) -> VerificationOutcome {
        if !self.verification_wait.is_zero() {
            debug!(
                "Waiting {}s before verifying {}",
                self.verification_wait.as_secs(),
                namespace
            );
            tokio::time::sleep(self.verification_wait).await;
        }

        let outcome = match diagnoser.rediagnose(namespace).await {
            Ok(None) => VerificationOutcome::Deleted,
            Ok(Some(diagnosis)) => match diagnosis.snapshot.phase {
                NamespacePhase::Terminating => VerificationOutcome::Incomplete {
                    remaining: diagnosis.blockers,
                },
                phase => {
                    warn!("Namespace {} is {} after remediation", namespace, phase);
                    VerificationOutcome::Reverted { phase }
                }
            },
            Err(e) => {
                warn!("Could not verify namespace {}: {}", namespace, e);
                VerificationOutcome::Unknown {
                    reason: e.to_string(),
                }
            }
        };

        info!("Namespace {}: {}", namespace, outcome);
        if let Some((bus, run_id)) = &self.events {
            bus.publish(DiagnosticEvent::namespace_verified(
                *run_id,
                namespace.to_string(),
                outcome.clone(),
            ));
        }
        outcome
    }

    fn publish(&self, report: StepReport) {
        if let Some((bus, run_id)) = &self.events {
            bus.publish(DiagnosticEvent::step_finished(*run_id, report));
        }
    }
}
