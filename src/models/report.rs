use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ApiServiceHealth, Blocker, ExecutionMode, ExecutionReport, NamespaceSnapshot,
    RemediationStep, ResourceInventory, VerificationOutcome, WebhookRef,
};

/// Cluster-wide state shared by every namespace of one pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterView {
    pub api_services: Vec<ApiServiceHealth>,
    pub webhooks: Vec<WebhookRef>,
    /// Reads that failed; their part of the view is empty, not healthy.
    pub notes: Vec<String>,
}

impl ClusterView {
    pub fn unavailable_api_services(&self) -> impl Iterator<Item = &ApiServiceHealth> {
        self.api_services.iter().filter(|a| !a.available)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnosis {
    pub snapshot: NamespaceSnapshot,
    pub inventory: ResourceInventory,
    pub blockers: Vec<Blocker>,
    pub notes: Vec<String>,
}

impl Diagnosis {
    pub fn namespace(&self) -> &str {
        &self.snapshot.name
    }

    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespacePlan {
    pub namespace: String,
    pub steps: Vec<RemediationStep>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceReport {
    pub diagnosis: Diagnosis,
    pub plan: Vec<RemediationStep>,
    pub execution: Option<ExecutionReport>,
    pub verification: Option<VerificationOutcome>,
}

impl NamespaceReport {
    pub fn namespace(&self) -> &str {
        self.diagnosis.namespace()
    }

    /// Only meaningful after a mutating pass: a diagnosis alone never counts
    /// as unresolved.
    pub fn is_unresolved(&self) -> bool {
        let failed = self
            .execution
            .as_ref()
            .map(|e| e.has_failures())
            .unwrap_or(false);
        let unverified = self
            .verification
            .as_ref()
            .map(|v| !v.is_resolved())
            .unwrap_or(false);
        failed || unverified
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub target: Option<String>,
    pub mode: Option<ExecutionMode>,
    /// Set when the named namespace does not exist.
    pub not_found: Option<String>,
    pub cluster: ClusterView,
    /// Cluster-wide steps hoisted out of the namespace plans and run once.
    pub shared_execution: Option<ExecutionReport>,
    pub namespaces: Vec<NamespaceReport>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid, target: Option<String>, mode: Option<ExecutionMode>) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            target,
            mode,
            not_found: None,
            cluster: ClusterView::default(),
            shared_execution: None,
            namespaces: Vec::new(),
            cancelled: false,
        }
    }

    pub fn has_unresolved(&self) -> bool {
        let shared_failed = self
            .shared_execution
            .as_ref()
            .map(|e| e.has_failures())
            .unwrap_or(false);
        shared_failed || self.namespaces.iter().any(|n| n.is_unresolved())
    }

    pub fn blocked_count(&self) -> usize {
        self.namespaces
            .iter()
            .filter(|n| n.diagnosis.is_blocked())
            .count()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub unavailable_api_services: Vec<ApiServiceHealth>,
    pub broken_webhooks: Vec<WebhookRef>,
    pub terminating_namespaces: Vec<String>,
    pub notes: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.unavailable_api_services.is_empty()
            && self.broken_webhooks.is_empty()
            && self.terminating_namespaces.is_empty()
    }
}
