use serde::{Deserialize, Serialize};

use super::{ApiServiceHealth, ResourceInventoryEntry, WebhookRef};

/// Blocker categories in remediation order: the derived `Ord` is the
/// order in which their fixes must run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockerKind {
    ApiService,
    Resource,
    Webhook,
    Finalizer,
}

impl std::fmt::Display for BlockerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockerKind::ApiService => write!(f, "APIService"),
            BlockerKind::Resource => write!(f, "Resource"),
            BlockerKind::Webhook => write!(f, "Webhook"),
            BlockerKind::Finalizer => write!(f, "Finalizer"),
        }
    }
}

/// A condition keeping a namespace in `Terminating`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Blocker {
    Finalizer {
        namespace: String,
        finalizers: Vec<String>,
    },
    Resource {
        namespace: String,
        entries: Vec<ResourceInventoryEntry>,
    },
    ApiService {
        health: ApiServiceHealth,
    },
    Webhook {
        webhook: WebhookRef,
        detail: String,
    },
}

impl Blocker {
    pub fn kind(&self) -> BlockerKind {
        match self {
            Blocker::Finalizer { .. } => BlockerKind::Finalizer,
            Blocker::Resource { .. } => BlockerKind::Resource,
            Blocker::ApiService { .. } => BlockerKind::ApiService,
            Blocker::Webhook { .. } => BlockerKind::Webhook,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Blocker::Finalizer {
                namespace,
                finalizers,
            } => format!(
                "namespace {} still carries finalizers [{}]",
                namespace,
                finalizers.join(", ")
            ),
            Blocker::Resource { namespace, entries } => {
                let total: usize = entries.iter().map(|e| e.count).sum();
                let kinds: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{} {}", e.count, e.kind))
                    .collect();
                format!(
                    "{} resource(s) remain in namespace {}: {}",
                    total,
                    namespace,
                    kinds.join(", ")
                )
            }
            Blocker::ApiService { health } => health.describe(),
            Blocker::Webhook { webhook, detail } => {
                format!("{} {} {}", webhook.kind, webhook.name, detail)
            }
        }
    }
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind(), self.reason())
    }
}
