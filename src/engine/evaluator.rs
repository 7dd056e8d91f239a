//! Classifies why a terminating namespace cannot finish deleting.
//!
//! Every rule is evaluated independently, so one namespace may carry
//! several blockers at once. The `kubernetes` finalizer gets no special
//! treatment: it is a symptom that is cleared last.

use crate::models::{
    Blocker, ClusterView, NamespaceSnapshot, ResourceInventory, WebhookRef,
};

pub fn evaluate(
    snapshot: &NamespaceSnapshot,
    inventory: &ResourceInventory,
    cluster: &ClusterView,
) -> Vec<Blocker> {
    if !snapshot.is_terminating() {
        return Vec::new();
    }

    let mut blockers = Vec::new();

    // Any unavailable APIService breaks discovery for every namespace
    // deletion, so it is attached regardless of namespace affinity.
    for health in cluster.unavailable_api_services() {
        blockers.push(Blocker::ApiService {
            health: health.clone(),
        });
    }

    if inventory.total() > 0 {
        blockers.push(Blocker::Resource {
            namespace: snapshot.name.clone(),
            entries: inventory.entries.clone(),
        });
    }

    blockers.extend(
        cluster
            .webhooks
            .iter()
            .filter_map(|w| webhook_blocker(w, snapshot)),
    );

    if snapshot.has_finalizers() {
        blockers.push(Blocker::Finalizer {
            namespace: snapshot.name.clone(),
            finalizers: snapshot.all_finalizers(),
        });
    }

    blockers
}

/// A webhook blocks when it calls a service that no longer exists, or when
/// it may intercept this namespace at all. Over-inclusion only costs a
/// confirmation prompt.
fn webhook_blocker(webhook: &WebhookRef, snapshot: &NamespaceSnapshot) -> Option<Blocker> {
    let missing: Vec<String> = webhook
        .missing_services()
        .map(|s| format!("{}/{}", s.namespace, s.name))
        .collect();
    if !missing.is_empty() {
        return Some(Blocker::Webhook {
            webhook: webhook.clone(),
            detail: format!("calls missing service(s) {}", missing.join(", ")),
        });
    }

    if !webhook.could_select(&snapshot.labels) {
        return None;
    }

    let unreachable: Vec<String> = webhook
        .unreachable_services()
        .map(|s| format!("{}/{}", s.namespace, s.name))
        .collect();
    let detail = if unreachable.is_empty() {
        format!("may intercept requests in namespace {}", snapshot.name)
    } else {
        format!(
            "calls service(s) {} with no endpoints and may intercept namespace {}",
            unreachable.join(", "),
            snapshot.name
        )
    };
    Some(Blocker::Webhook {
        webhook: webhook.clone(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApiServiceHealth, BlockerKind, NamespaceSelector, ResourceCount, ResourceKind,
        WebhookKind, WebhookService,
    };
    use chrono::Utc;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn terminating(name: &str, finalizers: &[&str]) -> NamespaceSnapshot {
        NamespaceSnapshot::new(name.to_string(), Some("Terminating"), Some(Utc::now()), None)
            .with_finalizers(finalizers.iter().map(|f| f.to_string()).collect())
    }

    fn inventory_with(plural: &str, count: usize) -> ResourceInventory {
        let mut inventory = ResourceInventory::new();
        inventory.record(
            ResourceKind::core("v1", "Thing", plural),
            ResourceCount {
                count,
                sample: Vec::new(),
            },
        );
        inventory
    }

    fn broken_cluster() -> ClusterView {
        ClusterView {
            api_services: vec![
                ApiServiceHealth::available("v1.apps"),
                ApiServiceHealth::unavailable(
                    "v1alpha2.wgpolicyk8s.io",
                    Some("MissingEndpoints".to_string()),
                ),
            ],
            webhooks: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn webhook(exists: bool, has_endpoints: bool, selector: Option<NamespaceSelector>) -> WebhookRef {
        let mut webhook = WebhookRef::new(WebhookKind::Validating, "kyverno-policy-validating");
        webhook.services.push(WebhookService {
            name: "kyverno-svc".to_string(),
            namespace: "kyverno".to_string(),
            exists,
            has_endpoints,
        });
        if let Some(selector) = selector {
            webhook.namespace_selectors.push(selector);
        }
        webhook
    }

    fn kinds(blockers: &[Blocker]) -> Vec<BlockerKind> {
        blockers.iter().map(|b| b.kind()).collect()
    }

    #[rstest]
    #[case(Some("Active"))]
    #[case(None)]
    fn test_non_terminating_has_no_blockers(#[case] phase: Option<&str>) {
        let snapshot = NamespaceSnapshot::new("default".to_string(), phase, None, None)
            .with_finalizers(vec!["kubernetes".to_string()]);
        let blockers = evaluate(&snapshot, &inventory_with("pods", 3), &broken_cluster());
        assert!(blockers.is_empty());
    }

    #[test]
    fn test_kubernetes_finalizer_is_reported_alongside_api_service() {
        let blockers = evaluate(
            &terminating("kyverno", &["kubernetes"]),
            &ResourceInventory::new(),
            &broken_cluster(),
        );
        assert_eq!(
            kinds(&blockers),
            vec![BlockerKind::ApiService, BlockerKind::Finalizer]
        );
    }

    #[test]
    fn test_resource_blocker_only_for_live_resources() {
        let cluster = ClusterView::default();
        let blockers = evaluate(&terminating("test1", &[]), &inventory_with("pods", 3), &cluster);
        assert_eq!(kinds(&blockers), vec![BlockerKind::Resource]);

        let blockers = evaluate(&terminating("test1", &[]), &ResourceInventory::new(), &cluster);
        assert!(blockers.is_empty());
    }

    #[test]
    fn test_metadata_finalizers_block() {
        let snapshot = terminating("app", &[])
            .with_metadata_finalizers(vec!["example.com/protect".to_string()]);
        let blockers = evaluate(&snapshot, &ResourceInventory::new(), &ClusterView::default());
        assert_eq!(kinds(&blockers), vec![BlockerKind::Finalizer]);
    }

    #[rstest]
    #[case::missing_service(webhook(false, false, None), true)]
    #[case::unreachable_matching_all(webhook(true, false, None), true)]
    #[case::healthy_matching_all(webhook(true, true, None), true)]
    #[case::healthy_other_namespaces(
        webhook(true, true, Some(NamespaceSelector {
            match_labels: BTreeMap::from([("team".to_string(), "other".to_string())]),
            has_expressions: false,
        })),
        false
    )]
    #[case::missing_service_other_namespaces(
        webhook(false, false, Some(NamespaceSelector {
            match_labels: BTreeMap::from([("team".to_string(), "other".to_string())]),
            has_expressions: false,
        })),
        true
    )]
    #[case::unreachable_other_namespaces(
        webhook(true, false, Some(NamespaceSelector {
            match_labels: BTreeMap::from([("team".to_string(), "other".to_string())]),
            has_expressions: false,
        })),
        false
    )]
    #[case::unreachable_with_expressions(
        webhook(true, false, Some(NamespaceSelector {
            match_labels: BTreeMap::new(),
            has_expressions: true,
        })),
        true
    )]
    fn test_webhook_rules(#[case] webhook: WebhookRef, #[case] blocks: bool) {
        let cluster = ClusterView {
            api_services: Vec::new(),
            webhooks: vec![webhook],
            notes: Vec::new(),
        };
        let blockers = evaluate(&terminating("app", &[]), &ResourceInventory::new(), &cluster);
        assert_eq!(blockers.len(), usize::from(blocks));
    }

    #[test]
    fn test_api_service_blocker_is_not_filtered_by_namespace() {
        let cluster = broken_cluster();
        for name in ["kyverno", "unrelated"] {
            let blockers = evaluate(&terminating(name, &[]), &ResourceInventory::new(), &cluster);
            assert_eq!(kinds(&blockers), vec![BlockerKind::ApiService]);
        }
    }
}
