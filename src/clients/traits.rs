use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ApiServiceHealth, MutationOutcome, NamespaceSnapshot, ResourceCount, ResourceDiscovery,
    ResourceKind, WebhookKind, WebhookRef,
};

/// Read access to cluster state. Every call is an idempotent read and is
/// bounded by the implementation's own timeout.
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSnapshot>>;

    /// `None` when the namespace does not exist.
    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceSnapshot>>;

    /// Namespaced kinds that can be listed and deleted. API groups whose
    /// discovery fails are reported in `failed_groups`.
    async fn list_resource_kinds(&self) -> Result<ResourceDiscovery>;

    async fn count_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        sample: usize,
    ) -> Result<ResourceCount>;

    async fn list_api_services(&self) -> Result<Vec<ApiServiceHealth>>;

    async fn list_webhooks(&self) -> Result<Vec<WebhookRef>>;

    /// `None` when there is no Endpoints object for the service.
    async fn get_service_endpoints(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Vec<String>>>;
}

/// Write access used by remediation steps. A target that is already gone
/// yields `MutationOutcome::AlreadyAbsent`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterMutator: Send + Sync {
    async fn delete_api_service(&self, name: &str) -> Result<MutationOutcome>;

    async fn force_delete_resources(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> Result<MutationOutcome>;

    async fn delete_webhook(&self, kind: WebhookKind, name: &str) -> Result<MutationOutcome>;

    /// Removes `metadata.finalizers` and finalizes `spec.finalizers` through
    /// the namespace `finalize` sub-resource.
    async fn clear_finalizers(&self, namespace: &str) -> Result<MutationOutcome>;
}
