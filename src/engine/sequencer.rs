use std::collections::{BTreeMap, HashSet};

use crate::models::{Blocker, BlockerKind, NamespacePlan, RemediationStep};

/// Turns blockers into remediation steps: APIServices first, then
/// resources, webhooks, and finalizers last. Within one category steps are
/// sorted by target, so the result does not depend on blocker order.
pub fn plan(blockers: &[Blocker]) -> Vec<RemediationStep> {
    let mut groups: BTreeMap<BlockerKind, Vec<RemediationStep>> = BTreeMap::new();

    for blocker in blockers {
        let steps = groups.entry(blocker.kind()).or_default();
        match blocker {
            Blocker::ApiService { health } => steps.push(RemediationStep::DeleteApiService {
                name: health.name.clone(),
            }),
            Blocker::Resource { namespace, entries } => {
                steps.extend(entries.iter().map(|e| RemediationStep::ForceDeleteResources {
                    namespace: namespace.clone(),
                    kind: e.kind.clone(),
                }))
            }
            Blocker::Webhook { webhook, .. } => steps.push(RemediationStep::DeleteWebhook {
                kind: webhook.kind,
                name: webhook.name.clone(),
            }),
            Blocker::Finalizer { namespace, .. } => {
                steps.push(RemediationStep::ClearFinalizers {
                    namespace: namespace.clone(),
                })
            }
        }
    }

    let mut seen = HashSet::new();
    groups
        .into_values()
        .flat_map(|mut steps| {
            steps.sort_by_key(|s| s.target());
            steps
        })
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedPlan {
    /// APIService deletions, each exactly once, run before any namespace plan.
    pub shared: Vec<RemediationStep>,
    pub namespaces: Vec<NamespacePlan>,
}

/// Hoists APIService deletions out of every namespace plan so each
/// APIService is deleted once overall. Remaining steps keep their order.
pub fn merge_plans(plans: &[NamespacePlan]) -> MergedPlan {
    let mut shared: Vec<RemediationStep> = Vec::new();
    let mut namespaces = Vec::with_capacity(plans.len());

    for plan in plans {
        let mut steps = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            match step {
                RemediationStep::DeleteApiService { .. } => {
                    if !shared.contains(step) {
                        shared.push(step.clone());
                    }
                }
                _ => steps.push(step.clone()),
            }
        }
        namespaces.push(NamespacePlan {
            namespace: plan.namespace.clone(),
            steps,
        });
    }

    shared.sort_by_key(|s| s.target());
    MergedPlan { shared, namespaces }
}
