use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::core::v1::{Endpoints, Namespace, NamespaceSpec, Service};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::convert;
use super::traits::{ClusterMutator, ClusterStateProvider};
use crate::config::KubeConfig;
use crate::error::{NsDoctorError, Result};
use crate::models::{
    ApiServiceHealth, MutationOutcome, NamespaceSnapshot, ResourceCount, ResourceDiscovery,
    ResourceKind, ServiceRef, WebhookKind, WebhookRef, WebhookService,
};

/// Kubernetes API backed provider and mutator.
pub struct KubeCluster {
    client: Client,
    timeout: Duration,
}

impl KubeCluster {
    pub async fn connect(config: &KubeConfig) -> Result<Self> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };

        let mut kube_config = match &config.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    NsDoctorError::ConfigError(format!("Failed to read kubeconfig {}: {}", path, e))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| NsDoctorError::ConfigError(format!("Invalid kubeconfig: {}", e)))?
            }
            None if config.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| NsDoctorError::ConfigError(format!("Invalid kubeconfig: {}", e)))?,
            None => Config::infer().await.map_err(|e| {
                NsDoctorError::ConfigError(format!("Failed to infer cluster config: {}", e))
            })?,
        };

        kube_config.connect_timeout = Some(Duration::from_secs(config.connect_timeout_seconds));
        kube_config.read_timeout = Some(Duration::from_secs(config.request_timeout_seconds));

        info!("Connecting to cluster at {}", kube_config.cluster_url);
        let client = Client::try_from(kube_config)?;

        Ok(Self::from_client(
            client,
            Duration::from_secs(config.request_timeout_seconds),
        ))
    }

    pub fn from_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn call<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(NsDoctorError::KubeError),
            Err(_) => Err(NsDoctorError::Timeout(format!(
                "{} did not complete within {}s",
                what,
                self.timeout.as_secs()
            ))),
        }
    }

    fn dynamic(&self, kind: &ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &convert::api_resource(kind))
    }

    /// `(exists, has_endpoints)`; `None` where the read itself failed.
    async fn service_state(&self, service: &ServiceRef) -> (Option<bool>, Option<bool>) {
        let services: Api<Service> = Api::namespaced(self.client.clone(), &service.namespace);
        let exists = match self
            .call(&format!("get service {}", service), services.get_opt(&service.name))
            .await
        {
            Ok(found) => Some(found.is_some()),
            Err(e) => {
                debug!("Could not read service {}: {}", service, e);
                None
            }
        };

        let has_endpoints = match exists {
            Some(true) => self
                .get_service_endpoints(&service.name, &service.namespace)
                .await
                .ok()
                .map(|addresses| addresses.map(|a| !a.is_empty()).unwrap_or(false)),
            Some(false) => Some(false),
            None => None,
        };

        (exists, has_endpoints)
    }

    async fn annotate_webhook(
        &self,
        mut webhook: WebhookRef,
        services: Vec<ServiceRef>,
        cache: &mut HashMap<ServiceRef, (Option<bool>, Option<bool>)>,
    ) -> WebhookRef {
        for service in services {
            let state = match cache.get(&service) {
                Some(state) => *state,
                None => {
                    let state = self.service_state(&service).await;
                    cache.insert(service.clone(), state);
                    state
                }
            };
            // an unreadable service is not reported as missing
            webhook.services.push(WebhookService {
                name: service.name,
                namespace: service.namespace,
                exists: state.0.unwrap_or(true),
                has_endpoints: state.1.unwrap_or(true),
            });
        }
        webhook
    }

    fn applied(detail: impl Into<String>) -> MutationOutcome {
        MutationOutcome::Applied {
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl ClusterStateProvider for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSnapshot>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = self
            .call("list namespaces", api.list(&ListParams::default()))
            .await?;
        debug!("Listed {} namespaces", list.items.len());
        Ok(list.items.iter().map(convert::namespace_snapshot).collect())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceSnapshot>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = self
            .call(&format!("get namespace {}", name), api.get_opt(name))
            .await?;
        Ok(ns.as_ref().map(convert::namespace_snapshot))
    }

    async fn list_resource_kinds(&self) -> Result<ResourceDiscovery> {
        let mut discovery = ResourceDiscovery::default();

        let core = self
            .call("core API discovery", self.client.list_core_api_resources("v1"))
            .await?;
        discovery
            .kinds
            .extend(convert::resource_kinds("", "v1", &core));

        let groups = self
            .call("API group discovery", self.client.list_api_groups())
            .await?;

        for group in groups.groups {
            let Some(preferred) = group
                .preferred_version
                .clone()
                .or_else(|| group.versions.first().cloned())
            else {
                continue;
            };

            match self
                .call(
                    &format!("discovery of {}", preferred.group_version),
                    self.client.list_api_group_resources(&preferred.group_version),
                )
                .await
            {
                Ok(list) => discovery.kinds.extend(convert::resource_kinds(
                    &group.name,
                    &preferred.version,
                    &list,
                )),
                Err(e) => {
                    warn!(
                        "Discovery of {} failed, its kinds will not be counted: {}",
                        preferred.group_version, e
                    );
                    discovery.failed_groups.push(preferred.group_version.clone());
                }
            }
        }

        debug!(
            "Discovered {} namespaced kinds ({} groups failed)",
            discovery.kinds.len(),
            discovery.failed_groups.len()
        );
        Ok(discovery)
    }

    async fn count_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        sample: usize,
    ) -> Result<ResourceCount> {
        let api = self.dynamic(kind, namespace);
        let list = self
            .call(
                &format!("list {} in {}", kind, namespace),
                api.list(&ListParams::default()),
            )
            .await?;

        Ok(ResourceCount {
            count: list.items.len(),
            sample: list.items.iter().take(sample).map(|o| o.name_any()).collect(),
        })
    }

    async fn list_api_services(&self) -> Result<Vec<ApiServiceHealth>> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &convert::api_service_resource());
        let list = self
            .call("list apiservices", api.list(&ListParams::default()))
            .await?;

        let mut result = Vec::with_capacity(list.items.len());
        let mut cache: HashMap<ServiceRef, (Option<bool>, Option<bool>)> = HashMap::new();

        for obj in &list.items {
            let mut health = convert::api_service_health(obj);
            if !health.available {
                if let Some(service) = health.service.clone() {
                    let state = match cache.get(&service) {
                        Some(state) => *state,
                        None => {
                            let state = self.service_state(&service).await;
                            cache.insert(service.clone(), state);
                            state
                        }
                    };
                    health = health.with_service(service, state.0, state.1);
                }
                debug!("{}", health.describe());
            }
            result.push(health);
        }

        Ok(result)
    }

    async fn list_webhooks(&self) -> Result<Vec<WebhookRef>> {
        let mut cache = HashMap::new();
        let mut result = Vec::new();

        let mutating: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
        let list = self
            .call(
                "list mutatingwebhookconfigurations",
                mutating.list(&ListParams::default()),
            )
            .await?;
        for config in &list.items {
            let (webhook, services) = convert::webhook_skeleton(
                WebhookKind::Mutating,
                config.name_any(),
                config
                    .webhooks
                    .iter()
                    .flatten()
                    .map(|w| (w.client_config.service.as_ref(), w.namespace_selector.as_ref())),
            );
            result.push(self.annotate_webhook(webhook, services, &mut cache).await);
        }

        let validating: Api<ValidatingWebhookConfiguration> = Api::all(self.client.clone());
        let list = self
            .call(
                "list validatingwebhookconfigurations",
                validating.list(&ListParams::default()),
            )
            .await?;
        for config in &list.items {
            let (webhook, services) = convert::webhook_skeleton(
                WebhookKind::Validating,
                config.name_any(),
                config
                    .webhooks
                    .iter()
                    .flatten()
                    .map(|w| (w.client_config.service.as_ref(), w.namespace_selector.as_ref())),
            );
            result.push(self.annotate_webhook(webhook, services, &mut cache).await);
        }

        Ok(result)
    }

    async fn get_service_endpoints(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Vec<String>>> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        let endpoints = self
            .call(
                &format!("get endpoints {}/{}", namespace, name),
                api.get_opt(name),
            )
            .await?;
        Ok(endpoints.as_ref().map(convert::endpoint_addresses))
    }
}

#[async_trait]
impl ClusterMutator for KubeCluster {
    async fn delete_api_service(&self, name: &str) -> Result<MutationOutcome> {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &convert::api_service_resource());

        match self
            .call(
                &format!("delete apiservice {}", name),
                api.delete(name, &DeleteParams::default()),
            )
            .await
        {
            Ok(_) => {
                info!("Deleted APIService {}", name);
                Ok(Self::applied(format!("deleted APIService {}", name)))
            }
            Err(e) if e.is_not_found() => {
                debug!("APIService {} not found, already removed", name);
                Ok(MutationOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }

    async fn force_delete_resources(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> Result<MutationOutcome> {
        let api = self.dynamic(kind, namespace);
        let list = match self
            .call(
                &format!("list {} in {}", kind, namespace),
                api.list(&ListParams::default()),
            )
            .await
        {
            Ok(list) => list,
            Err(e) if e.is_not_found() => return Ok(MutationOutcome::AlreadyAbsent),
            Err(e) => return Err(e),
        };

        if list.items.is_empty() {
            return Ok(MutationOutcome::AlreadyAbsent);
        }

        let delete_params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::background()
        };
        let strip_finalizers = json!({ "metadata": { "finalizers": null } });
        let mut removed = 0usize;
        let mut failures = Vec::new();

        for obj in &list.items {
            let name = obj.name_any();

            if !obj.finalizers().is_empty() {
                match self
                    .call(
                        &format!("strip finalizers of {} {}", kind, name),
                        api.patch(
                            &name,
                            &PatchParams::default(),
                            &Patch::Merge(&strip_finalizers),
                        ),
                    )
                    .await
                {
                    Ok(_) => debug!("Stripped finalizers of {}/{} {}", namespace, kind, name),
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => {
                        failures.push(format!("{}: {}", name, e));
                        continue;
                    }
                }
            }

            match self
                .call(
                    &format!("delete {} {}", kind, name),
                    api.delete(&name, &delete_params),
                )
                .await
            {
                Ok(_) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => failures.push(format!("{}: {}", name, e)),
            }
        }

        if !failures.is_empty() {
            return Err(NsDoctorError::Mutation {
                step: format!("ForceDeleteResources({}/{})", namespace, kind),
                message: failures.join("; "),
            });
        }

        if removed == 0 {
            return Ok(MutationOutcome::AlreadyAbsent);
        }

        info!("Force-deleted {} {} in namespace {}", removed, kind, namespace);
        Ok(Self::applied(format!("removed {} {}", removed, kind)))
    }

    async fn delete_webhook(&self, kind: WebhookKind, name: &str) -> Result<MutationOutcome> {
        let what = format!("delete {} {}", kind, name);
        let result = match kind {
            WebhookKind::Mutating => {
                let api: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
                self.call(&what, api.delete(name, &DeleteParams::default()))
                    .await
                    .map(|_| ())
            }
            WebhookKind::Validating => {
                let api: Api<ValidatingWebhookConfiguration> = Api::all(self.client.clone());
                self.call(&what, api.delete(name, &DeleteParams::default()))
                    .await
                    .map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                info!("Deleted {} {}", kind, name);
                Ok(Self::applied(format!("deleted {} {}", kind, name)))
            }
            Err(e) if e.is_not_found() => Ok(MutationOutcome::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    async fn clear_finalizers(&self, namespace: &str) -> Result<MutationOutcome> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let Some(mut ns) = self
            .call(&format!("get namespace {}", namespace), api.get_opt(namespace))
            .await?
        else {
            return Ok(MutationOutcome::AlreadyAbsent);
        };

        let mut cleared: Vec<String> = Vec::new();

        let metadata_finalizers = ns.finalizers().to_vec();
        if !metadata_finalizers.is_empty() {
            let patch = json!({ "metadata": { "finalizers": null } });
            match self
                .call(
                    &format!("strip metadata finalizers of {}", namespace),
                    api.patch(namespace, &PatchParams::default(), &Patch::Merge(&patch)),
                )
                .await
            {
                Ok(_) => cleared.extend(metadata_finalizers),
                Err(e) if e.is_not_found() => return Ok(MutationOutcome::AlreadyAbsent),
                Err(e) => return Err(e),
            }
        }

        let spec_finalizers = ns
            .spec
            .as_ref()
            .and_then(|s| s.finalizers.clone())
            .unwrap_or_default();

        if !spec_finalizers.is_empty() {
            ns.spec = Some(NamespaceSpec {
                finalizers: Some(Vec::new()),
            });
            // the metadata patch above bumped the resource version
            ns.metadata.resource_version = None;
            ns.metadata.managed_fields = None;
            let body = serde_json::to_vec(&ns)?;

            match self
                .call(
                    &format!("finalize namespace {}", namespace),
                    api.replace_subresource("finalize", namespace, &PostParams::default(), body),
                )
                .await
            {
                Ok(_) => cleared.extend(spec_finalizers),
                Err(e) if e.is_not_found() => return Ok(MutationOutcome::AlreadyAbsent),
                Err(e) => return Err(e),
            }
        }

        if cleared.is_empty() {
            return Ok(MutationOutcome::AlreadyAbsent);
        }

        info!(
            "Cleared finalizers [{}] of namespace {}",
            cleared.join(", "),
            namespace
        );
        Ok(Self::applied(format!(
            "cleared finalizers [{}]",
            cleared.join(", ")
        )))
    }
}
