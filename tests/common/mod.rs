#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use nsdoctor::clients::{ClusterMutator, ClusterStateProvider};
use nsdoctor::config::AppConfig;
use kube::error::ErrorResponse;
use nsdoctor::models::{
    ApiServiceHealth, MutationOutcome, NamespacePhase, NamespaceSnapshot, ResourceCount,
    ResourceDiscovery, ResourceKind, ServiceRef, WebhookKind, WebhookRef, WebhookService,
};
use nsdoctor::{NsDoctorError, Result, Runner};

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, NamespaceSnapshot>,
    kinds: Vec<ResourceKind>,
    /// Keyed by (namespace, qualified kind name).
    resources: BTreeMap<(String, String), Vec<String>>,
    api_services: Vec<ApiServiceHealth>,
    webhooks: Vec<WebhookRef>,
    mutations: Vec<String>,
    unreachable: bool,
    finalize_removes_namespace: bool,
    finalize_reactivates_namespace: bool,
    /// Qualified kind names whose listing fails.
    unlistable: Vec<String>,
    discovery_fails: bool,
    api_services_fail: bool,
}

fn service_unavailable(what: &str) -> NsDoctorError {
    NsDoctorError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} is temporarily unavailable", what),
        reason: "ServiceUnavailable".to_string(),
        code: 503,
    }))
}

/// In-memory cluster. Mutations are idempotent and recorded in call order.
pub struct FakeCluster {
    state: Mutex<State>,
}

pub fn pods() -> ResourceKind {
    ResourceKind::core("v1", "Pod", "pods")
}

pub fn configmaps() -> ResourceKind {
    ResourceKind::core("v1", "ConfigMap", "configmaps")
}

pub fn unavailable_api_service(name: &str) -> ApiServiceHealth {
    ApiServiceHealth::unavailable(name, Some("MissingEndpoints".to_string())).with_service(
        ServiceRef {
            name: "metrics".to_string(),
            namespace: "kyverno".to_string(),
        },
        Some(true),
        Some(false),
    )
}

pub fn webhook_with_missing_service(name: &str, namespace: &str) -> WebhookRef {
    let mut webhook = WebhookRef::new(WebhookKind::Validating, name);
    webhook.services.push(WebhookService {
        name: "svc".to_string(),
        namespace: namespace.to_string(),
        exists: false,
        has_endpoints: false,
    });
    webhook
}

impl FakeCluster {
    pub fn new() -> Self {
        let state = State {
            kinds: vec![pods(), configmaps()],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_terminating(self, name: &str, finalizers: &[&str]) -> Self {
        let snapshot =
            NamespaceSnapshot::new(name.to_string(), Some("Terminating"), Some(Utc::now()), None)
                .with_finalizers(finalizers.iter().map(|f| f.to_string()).collect());
        self.state
            .lock()
            .unwrap()
            .namespaces
            .insert(name.to_string(), snapshot);
        self
    }

    pub fn with_active(self, name: &str) -> Self {
        let snapshot = NamespaceSnapshot::new(name.to_string(), Some("Active"), None, None);
        self.state
            .lock()
            .unwrap()
            .namespaces
            .insert(name.to_string(), snapshot);
        self
    }

    pub fn with_resources(self, namespace: &str, kind: &ResourceKind, names: &[&str]) -> Self {
        self.state.lock().unwrap().resources.insert(
            (namespace.to_string(), kind.qualified_name()),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn with_api_service(self, health: ApiServiceHealth) -> Self {
        self.state.lock().unwrap().api_services.push(health);
        self
    }

    pub fn with_webhook(self, webhook: WebhookRef) -> Self {
        self.state.lock().unwrap().webhooks.push(webhook);
        self
    }

    /// Every namespace read fails below the API layer.
    pub fn unreachable(self) -> Self {
        self.state.lock().unwrap().unreachable = true;
        self
    }

    /// Clearing the finalizers of an empty namespace lets it disappear, as
    /// the namespace controller would.
    pub fn namespace_removed_on_finalize(self) -> Self {
        self.state.lock().unwrap().finalize_removes_namespace = true;
        self
    }

    /// Another controller recreates the namespace as soon as its finalizers
    /// are cleared.
    pub fn namespace_reactivated_on_finalize(self) -> Self {
        self.state.lock().unwrap().finalize_reactivates_namespace = true;
        self
    }

    pub fn with_unlistable(self, kind: &ResourceKind) -> Self {
        self.state
            .lock()
            .unwrap()
            .unlistable
            .push(kind.qualified_name());
        self
    }

    pub fn with_failing_discovery(self) -> Self {
        self.state.lock().unwrap().discovery_fails = true;
        self
    }

    pub fn with_failing_api_services(self) -> Self {
        self.state.lock().unwrap().api_services_fail = true;
        self
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self, action: &str) -> usize {
        self.mutations()
            .iter()
            .filter(|m| m.starts_with(action))
            .count()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains_key(name)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state.lock().unwrap().unreachable {
            return Err(NsDoctorError::Connectivity(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    fn record(&self, mutation: String) {
        self.state.lock().unwrap().mutations.push(mutation);
    }
}

#[async_trait]
impl ClusterStateProvider for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSnapshot>> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().namespaces.values().cloned().collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceSnapshot>> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().namespaces.get(name).cloned())
    }

    async fn list_resource_kinds(&self) -> Result<ResourceDiscovery> {
        let state = self.state.lock().unwrap();
        if state.discovery_fails {
            return Err(service_unavailable("discovery"));
        }
        Ok(ResourceDiscovery {
            kinds: state.kinds.clone(),
            failed_groups: Vec::new(),
        })
    }

    async fn count_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        sample: usize,
    ) -> Result<ResourceCount> {
        let state = self.state.lock().unwrap();
        if state.unlistable.contains(&kind.qualified_name()) {
            return Err(service_unavailable(&kind.qualified_name()));
        }
        let names = state
            .resources
            .get(&(namespace.to_string(), kind.qualified_name()))
            .cloned()
            .unwrap_or_default();
        Ok(ResourceCount {
            count: names.len(),
            sample: names.into_iter().take(sample).collect(),
        })
    }

    async fn list_api_services(&self) -> Result<Vec<ApiServiceHealth>> {
        let state = self.state.lock().unwrap();
        if state.api_services_fail {
            return Err(service_unavailable("apiregistration.k8s.io"));
        }
        Ok(state.api_services.clone())
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookRef>> {
        Ok(self.state.lock().unwrap().webhooks.clone())
    }

    async fn get_service_endpoints(
        &self,
        _name: &str,
        _namespace: &str,
    ) -> Result<Option<Vec<String>>> {
        Ok(None)
    }
}

#[async_trait]
impl ClusterMutator for FakeCluster {
    async fn delete_api_service(&self, name: &str) -> Result<MutationOutcome> {
        self.record(format!("DeleteAPIService({})", name));
        let mut state = self.state.lock().unwrap();
        let before = state.api_services.len();
        state.api_services.retain(|a| a.name != name);
        Ok(if state.api_services.len() < before {
            MutationOutcome::Applied {
                detail: "deleted".to_string(),
            }
        } else {
            MutationOutcome::AlreadyAbsent
        })
    }

    async fn force_delete_resources(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> Result<MutationOutcome> {
        self.record(format!("ForceDeleteResources({}/{})", namespace, kind));
        let removed = self
            .state
            .lock()
            .unwrap()
            .resources
            .remove(&(namespace.to_string(), kind.qualified_name()));
        Ok(match removed {
            Some(names) if !names.is_empty() => MutationOutcome::Applied {
                detail: format!("deleted {} object(s)", names.len()),
            },
            _ => MutationOutcome::AlreadyAbsent,
        })
    }

    async fn delete_webhook(&self, kind: WebhookKind, name: &str) -> Result<MutationOutcome> {
        self.record(format!("DeleteWebhook({}/{})", kind, name));
        let mut state = self.state.lock().unwrap();
        let before = state.webhooks.len();
        state.webhooks.retain(|w| !(w.kind == kind && w.name == name));
        Ok(if state.webhooks.len() < before {
            MutationOutcome::Applied {
                detail: "deleted".to_string(),
            }
        } else {
            MutationOutcome::AlreadyAbsent
        })
    }

    async fn clear_finalizers(&self, namespace: &str) -> Result<MutationOutcome> {
        self.record(format!("ClearFinalizers({})", namespace));
        let mut state = self.state.lock().unwrap();
        let empty = !state
            .resources
            .iter()
            .any(|((ns, _), names)| ns == namespace && !names.is_empty());
        let remove = state.finalize_removes_namespace && empty;
        let reactivate = state.finalize_reactivates_namespace;

        let Some(snapshot) = state.namespaces.get_mut(namespace) else {
            return Ok(MutationOutcome::AlreadyAbsent);
        };
        snapshot.finalizers.clear();
        snapshot.metadata_finalizers.clear();
        if reactivate {
            snapshot.phase = NamespacePhase::Active;
            snapshot.deletion_timestamp = None;
        } else if remove {
            state.namespaces.remove(namespace);
        }
        Ok(MutationOutcome::Applied {
            detail: "finalizers cleared".to_string(),
        })
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.remediation.verification_wait_seconds = 0;
    config
}

pub fn runner(cluster: &Arc<FakeCluster>) -> Runner {
    Runner::new(cluster.clone(), cluster.clone(), test_config())
}
