use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl std::fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookKind::Mutating => write!(f, "MutatingWebhookConfiguration"),
            WebhookKind::Validating => write!(f, "ValidatingWebhookConfiguration"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookService {
    pub name: String,
    pub namespace: String,
    pub exists: bool,
    pub has_endpoints: bool,
}

/// Simplified namespace selector of one webhook entry. Expressions are not
/// evaluated, only recorded.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceSelector {
    pub match_labels: BTreeMap<String, String>,
    pub has_expressions: bool,
}

impl NamespaceSelector {
    /// Over-inclusive: anything with expressions is assumed to match.
    pub fn could_match(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.has_expressions {
            return true;
        }
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).map(|l| l == v).unwrap_or(false))
    }
}

/// A webhook configuration and the services its entries call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookRef {
    pub kind: WebhookKind,
    pub name: String,
    pub services: Vec<WebhookService>,
    pub namespace_selectors: Vec<NamespaceSelector>,
}

impl WebhookRef {
    pub fn new(kind: WebhookKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            services: Vec::new(),
            namespace_selectors: Vec::new(),
        }
    }

    pub fn missing_services(&self) -> impl Iterator<Item = &WebhookService> {
        self.services.iter().filter(|s| !s.exists)
    }

    pub fn unreachable_services(&self) -> impl Iterator<Item = &WebhookService> {
        self.services.iter().filter(|s| s.exists && !s.has_endpoints)
    }

    pub fn has_missing_service(&self) -> bool {
        self.missing_services().next().is_some()
    }

    /// A configuration without selectors applies to every namespace.
    pub fn could_select(&self, labels: &BTreeMap<String, String>) -> bool {
        self.namespace_selectors.is_empty()
            || self.namespace_selectors.iter().any(|s| s.could_match(labels))
    }
}
