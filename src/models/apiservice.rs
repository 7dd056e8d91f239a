use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRef {
    pub name: String,
    pub namespace: String,
}

impl std::fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Health of one aggregated API registration (`<version>.<group>`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiServiceHealth {
    pub name: String,
    pub available: bool,
    /// e.g. `MissingEndpoints`, `FailedDiscoveryCheck`. Always set when unavailable.
    pub reason: Option<String>,
    pub message: Option<String>,
    /// `None` for locally served groups.
    pub service: Option<ServiceRef>,
    pub service_exists: Option<bool>,
    pub has_endpoints: Option<bool>,
}

impl ApiServiceHealth {
    pub fn available(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            reason: None,
            message: None,
            service: None,
            service_exists: None,
            has_endpoints: None,
        }
    }

    pub fn unavailable(name: impl Into<String>, reason: Option<String>) -> Self {
        let reason = reason
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            name: name.into(),
            available: false,
            reason: Some(reason),
            message: None,
            service: None,
            service_exists: None,
            has_endpoints: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn with_service(
        mut self,
        service: ServiceRef,
        exists: Option<bool>,
        has_endpoints: Option<bool>,
    ) -> Self {
        self.service = Some(service);
        self.service_exists = exists;
        self.has_endpoints = has_endpoints;
        self
    }

    pub fn reason_or_unknown(&self) -> &str {
        self.reason.as_deref().unwrap_or("Unknown")
    }

    pub fn describe(&self) -> String {
        let mut text = format!("APIService {} is unavailable ({})", self.name, self.reason_or_unknown());
        if let Some(service) = &self.service {
            match (self.service_exists, self.has_endpoints) {
                (Some(false), _) => text.push_str(&format!(", backing service {} is missing", service)),
                (Some(true), Some(false)) => {
                    text.push_str(&format!(", backing service {} has no endpoints", service))
                }
                _ => {}
            }
        }
        text
    }
}
