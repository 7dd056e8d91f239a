use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Blocker, NamespacePhase, ResourceKind, WebhookKind};

/// One typed, idempotent remediation action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RemediationStep {
    DeleteApiService {
        name: String,
    },
    ForceDeleteResources {
        namespace: String,
        kind: ResourceKind,
    },
    DeleteWebhook {
        kind: WebhookKind,
        name: String,
    },
    ClearFinalizers {
        namespace: String,
    },
}

impl RemediationStep {
    /// Cluster-scoped steps may be shared between namespace plans.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(
            self,
            RemediationStep::DeleteApiService { .. } | RemediationStep::DeleteWebhook { .. }
        )
    }

    pub fn action(&self) -> &'static str {
        match self {
            RemediationStep::DeleteApiService { .. } => "DeleteAPIService",
            RemediationStep::ForceDeleteResources { .. } => "ForceDeleteResources",
            RemediationStep::DeleteWebhook { .. } => "DeleteWebhook",
            RemediationStep::ClearFinalizers { .. } => "ClearFinalizers",
        }
    }

    pub fn target(&self) -> String {
        match self {
            RemediationStep::DeleteApiService { name } => name.clone(),
            RemediationStep::ForceDeleteResources { namespace, kind } => {
                format!("{}/{}", namespace, kind)
            }
            RemediationStep::DeleteWebhook { kind, name } => format!("{}/{}", kind, name),
            RemediationStep::ClearFinalizers { namespace } => namespace.clone(),
        }
    }
}

impl std::fmt::Display for RemediationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.action(), self.target())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Apply,
    ApplyWithConfirmation,
}

impl ExecutionMode {
    pub fn mutates(&self) -> bool {
        !matches!(self, ExecutionMode::DryRun)
    }
}

/// What the mutator reports for a successful write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied { detail: String },
    AlreadyAbsent,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    /// Dry run: would have been executed.
    Planned,
    Applied { detail: String },
    AlreadyAbsent,
    Declined,
    Cancelled,
    Failed { message: String },
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Applied { .. } | StepStatus::AlreadyAbsent)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Planned => write!(f, "planned"),
            StepStatus::Applied { detail } => write!(f, "applied: {}", detail),
            StepStatus::AlreadyAbsent => write!(f, "already absent"),
            StepStatus::Declined => write!(f, "declined"),
            StepStatus::Cancelled => write!(f, "cancelled"),
            StepStatus::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepReport {
    pub step: RemediationStep,
    pub status: StepStatus,
    pub finished_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepReport>,
}

impl ExecutionReport {
    pub fn push(&mut self, step: RemediationStep, status: StepStatus) {
        self.steps.push(StepReport {
            step,
            status,
            finished_at: Utc::now(),
        });
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// True when at least one step changed cluster state.
    pub fn any_applied(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Applied { .. }))
    }
}

/// Namespace state after the post-remediation wait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Deleted,
    /// The namespace is no longer terminating; unexpected after a fix.
    Reverted { phase: NamespacePhase },
    Incomplete { remaining: Vec<Blocker> },
    Unknown { reason: String },
}

impl VerificationOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, VerificationOutcome::Deleted)
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Deleted => write!(f, "namespace deleted"),
            VerificationOutcome::Reverted { phase } => {
                write!(f, "namespace unexpectedly back in phase {}", phase)
            }
            VerificationOutcome::Incomplete { remaining } => write!(
                f,
                "fix incomplete, {} blocker(s) remain",
                remaining.len()
            ),
            VerificationOutcome::Unknown { reason } => {
                write!(f, "could not verify: {}", reason)
            }
        }
    }
}
