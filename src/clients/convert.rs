//! Projections from Kubernetes API objects to the diagnoser's models.

use k8s_openapi::api::admissionregistration::v1::ServiceReference;
use k8s_openapi::api::core::v1::{Endpoints, Namespace};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResourceList, LabelSelector};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    ApiServiceHealth, NamespaceCondition, NamespaceSelector, NamespaceSnapshot, ResourceKind,
    ServiceRef, WebhookKind, WebhookRef,
};

pub fn api_service_resource() -> ApiResource {
    ApiResource {
        group: "apiregistration.k8s.io".to_string(),
        version: "v1".to_string(),
        api_version: "apiregistration.k8s.io/v1".to_string(),
        kind: "APIService".to_string(),
        plural: "apiservices".to_string(),
    }
}

pub fn api_resource(kind: &ResourceKind) -> ApiResource {
    ApiResource {
        group: kind.group.clone(),
        version: kind.version.clone(),
        api_version: kind.api_version(),
        kind: kind.kind.clone(),
        plural: kind.plural.clone(),
    }
}

pub fn namespace_snapshot(ns: &Namespace) -> NamespaceSnapshot {
    let status = ns.status.as_ref();
    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| NamespaceCondition {
                    condition_type: c.type_.clone(),
                    status: c.status.clone(),
                    reason: c.reason.clone(),
                    message: c.message.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    NamespaceSnapshot::new(
        ns.name_any(),
        status.and_then(|s| s.phase.as_deref()),
        ns.metadata.deletion_timestamp.as_ref().map(|t| t.0),
        ns.metadata.creation_timestamp.as_ref().map(|t| t.0),
    )
    .with_finalizers(
        ns.spec
            .as_ref()
            .and_then(|s| s.finalizers.clone())
            .unwrap_or_default(),
    )
    .with_metadata_finalizers(ns.metadata.finalizers.clone().unwrap_or_default())
    .with_labels(ns.metadata.labels.clone().unwrap_or_default())
    .with_conditions(conditions)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiServiceSpecData {
    service: Option<ServiceData>,
}

/// Both fields are optional in the APIService schema.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceData {
    name: Option<String>,
    namespace: Option<String>,
}

impl ServiceData {
    fn into_ref(self) -> Option<ServiceRef> {
        match (self.name, self.namespace) {
            (Some(name), Some(namespace)) if !name.is_empty() && !namespace.is_empty() => {
                Some(ServiceRef { name, namespace })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiServiceStatusData {
    conditions: Vec<ConditionData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionData {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
    reason: Option<String>,
    message: Option<String>,
}

fn parse_field<T: DeserializeOwned + Default>(
    obj: &DynamicObject,
    field: &str,
) -> serde_json::Result<T> {
    match obj.data.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone()),
    }
}

/// Availability comes from the `Available` condition; an APIService with no
/// such condition is treated as unavailable. A status that cannot be read
/// yields reason `Unparseable`, and a malformed service reference is dropped,
/// so one bad object never hides the others.
pub fn api_service_health(obj: &DynamicObject) -> ApiServiceHealth {
    let name = obj.name_any();

    let status: ApiServiceStatusData = match parse_field(obj, "status") {
        Ok(status) => status,
        Err(e) => {
            warn!("Could not parse status of APIService {}: {}", name, e);
            return ApiServiceHealth::unavailable(name, Some("Unparseable".to_string()))
                .with_message(Some(format!("status could not be parsed: {}", e)));
        }
    };

    let available = status
        .conditions
        .iter()
        .find(|c| c.condition_type == "Available");

    let health = match available {
        Some(c) if c.status == "True" => ApiServiceHealth::available(name),
        Some(c) => {
            ApiServiceHealth::unavailable(name, c.reason.clone()).with_message(c.message.clone())
        }
        None => ApiServiceHealth::unavailable(name, None),
    };

    let service = match parse_field::<ApiServiceSpecData>(obj, "spec") {
        Ok(spec) => spec.service.and_then(ServiceData::into_ref),
        Err(e) => {
            debug!("Ignoring malformed spec of APIService {}: {}", health.name, e);
            None
        }
    };

    match service {
        Some(service) => health.with_service(service, None, None),
        None => health,
    }
}

pub fn namespace_selector(selector: Option<&LabelSelector>) -> NamespaceSelector {
    match selector {
        Some(s) => NamespaceSelector {
            match_labels: s.match_labels.clone().unwrap_or_default(),
            has_expressions: s
                .match_expressions
                .as_ref()
                .map(|e| !e.is_empty())
                .unwrap_or(false),
        },
        None => NamespaceSelector::default(),
    }
}

/// A webhook configuration without per-service state, plus the services its
/// entries reference (deduplicated, in first-seen order).
pub fn webhook_skeleton<'a>(
    kind: WebhookKind,
    name: String,
    entries: impl Iterator<Item = (Option<&'a ServiceReference>, Option<&'a LabelSelector>)>,
) -> (WebhookRef, Vec<ServiceRef>) {
    let mut webhook = WebhookRef::new(kind, name);
    let mut services: Vec<ServiceRef> = Vec::new();

    for (service, selector) in entries {
        webhook.namespace_selectors.push(namespace_selector(selector));
        if let Some(s) = service {
            let service_ref = ServiceRef {
                name: s.name.clone(),
                namespace: s.namespace.clone(),
            };
            if !services.contains(&service_ref) {
                services.push(service_ref);
            }
        }
    }

    (webhook, services)
}

/// Namespaced, top-level kinds of one group version that support both
/// `list` and `delete`.
pub fn resource_kinds(group: &str, version: &str, list: &APIResourceList) -> Vec<ResourceKind> {
    list.resources
        .iter()
        .filter(|r| r.namespaced && !r.name.contains('/'))
        .filter(|r| r.verbs.iter().any(|v| v == "list") && r.verbs.iter().any(|v| v == "delete"))
        .map(|r| {
            ResourceKind::new(
                r.group.as_deref().unwrap_or(group),
                r.version.as_deref().unwrap_or(version),
                &r.kind,
                &r.name,
            )
        })
        .collect()
}

pub fn endpoint_addresses(endpoints: &Endpoints) -> Vec<String> {
    endpoints
        .subsets
        .iter()
        .flatten()
        .flat_map(|s| s.addresses.iter().flatten())
        .map(|a| a.ip.clone())
        .collect()
}
