use serde::{Deserialize, Serialize};

/// A namespaced, listable resource type discovered from the API server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind {
    /// Empty for the core group.
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceKind {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }

    pub fn core(version: &str, kind: &str, plural: &str) -> Self {
        Self::new("", version, kind, plural)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `plural` for the core group, `plural.group` otherwise.
    pub fn qualified_name(&self) -> String {
        if self.group.is_empty() {
            self.plural.clone()
        } else {
            format!("{}.{}", self.plural, self.group)
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.qualified_name() == name || (self.group.is_empty() && self.plural == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Result of resource discovery. Groups whose discovery failed are listed
/// rather than failing the whole discovery.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceDiscovery {
    pub kinds: Vec<ResourceKind>,
    pub failed_groups: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceCount {
    pub count: usize,
    pub sample: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceInventoryEntry {
    pub kind: ResourceKind,
    pub count: usize,
    pub sample: Vec<String>,
}

/// Live resources left in a namespace. Kinds absent from `entries` have
/// zero instances; `omitted` names what could not be listed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceInventory {
    pub entries: Vec<ResourceInventoryEntry>,
    pub omitted: Vec<String>,
}

impl ResourceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero counts are dropped so that presence in `entries` means "live".
    pub fn record(&mut self, kind: ResourceKind, count: ResourceCount) {
        if count.count == 0 {
            return;
        }
        self.entries.push(ResourceInventoryEntry {
            kind,
            count: count.count,
            sample: count.sample,
        });
    }

    pub fn omit(&mut self, what: impl Into<String>) {
        self.omitted.push(what.into());
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind.matches_name(name))
            .map(|e| e.count)
            .sum()
    }

    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.kind.cmp(&b.kind));
        self.omitted.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        assert_eq!(ResourceKind::core("v1", "Pod", "pods").qualified_name(), "pods");
        let kind = ResourceKind::new("kyverno.io", "v1", "Policy", "policies");
        assert_eq!(kind.qualified_name(), "policies.kyverno.io");
        assert_eq!(kind.api_version(), "kyverno.io/v1");
        assert!(kind.matches_name("policies.kyverno.io"));
        assert!(!kind.matches_name("policies"));
    }

    #[test]
    fn test_record_drops_zero_counts() {
        let mut inventory = ResourceInventory::new();
        inventory.record(ResourceKind::core("v1", "Pod", "pods"), ResourceCount::default());
        inventory.record(
            ResourceKind::core("v1", "Secret", "secrets"),
            ResourceCount {
                count: 2,
                sample: vec!["a".to_string(), "b".to_string()],
            },
        );
        assert_eq!(inventory.entries.len(), 1);
        assert_eq!(inventory.total(), 2);
        assert_eq!(inventory.count_of("pods"), 0);
        assert_eq!(inventory.count_of("secrets"), 2);
    }
}
