use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NamespacePhase {
    Active,
    Terminating,
    Unknown,
}

impl std::fmt::Display for NamespacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespacePhase::Active => write!(f, "Active"),
            NamespacePhase::Terminating => write!(f, "Terminating"),
            NamespacePhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A namespace condition as reported by the namespace controller,
/// e.g. `NamespaceContentRemaining` or `NamespaceDeletionDiscoveryFailure`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceCondition {
    pub condition_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Read-only projection of a Namespace object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceSnapshot {
    pub name: String,
    pub phase: NamespacePhase,
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// `spec.finalizers`, in server order.
    pub finalizers: Vec<String>,
    /// `metadata.finalizers`, in server order.
    pub metadata_finalizers: Vec<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub conditions: Vec<NamespaceCondition>,
}

impl NamespaceSnapshot {
    /// The phase is derived from the deletion timestamp first so that
    /// `Terminating` holds exactly when a deletion timestamp is present.
    pub fn new(
        name: String,
        reported_phase: Option<&str>,
        deletion_timestamp: Option<DateTime<Utc>>,
        creation_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        let phase = match (deletion_timestamp.is_some(), reported_phase) {
            (true, _) => NamespacePhase::Terminating,
            (false, Some("Active")) => NamespacePhase::Active,
            (false, _) => NamespacePhase::Unknown,
        };

        Self {
            name,
            phase,
            deletion_timestamp,
            finalizers: Vec::new(),
            metadata_finalizers: Vec::new(),
            creation_timestamp,
            labels: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_finalizers(mut self, finalizers: Vec<String>) -> Self {
        self.finalizers = finalizers;
        self
    }

    pub fn with_metadata_finalizers(mut self, finalizers: Vec<String>) -> Self {
        self.metadata_finalizers = finalizers;
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<NamespaceCondition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn is_terminating(&self) -> bool {
        self.phase == NamespacePhase::Terminating
    }

    pub fn has_finalizers(&self) -> bool {
        !self.finalizers.is_empty() || !self.metadata_finalizers.is_empty()
    }

    /// All finalizers, spec first, for display.
    pub fn all_finalizers(&self) -> Vec<String> {
        self.finalizers
            .iter()
            .chain(self.metadata_finalizers.iter())
            .cloned()
            .collect()
    }

    /// How long the namespace has been terminating.
    pub fn terminating_for(&self) -> Option<chrono::Duration> {
        self.deletion_timestamp.map(|ts| Utc::now() - ts)
    }

    /// Conditions whose status is `True`, which for namespace conditions
    /// means something is going wrong.
    pub fn failing_conditions(&self) -> impl Iterator<Item = &NamespaceCondition> {
        self.conditions.iter().filter(|c| c.status == "True")
    }
}
