use tracing::{debug, info};

use crate::clients::ClusterStateProvider;
use crate::error::{NsDoctorError, Result};
use crate::models::NamespaceSnapshot;

#[derive(Clone, Debug)]
pub enum Scope {
    Namespaces(Vec<NamespaceSnapshot>),
    /// The named namespace does not exist. Reported, not an error.
    NotFound(String),
}

impl Scope {
    pub fn namespace_names(&self) -> Vec<String> {
        match self {
            Scope::Namespaces(namespaces) => namespaces.iter().map(|n| n.name.clone()).collect(),
            Scope::NotFound(_) => Vec::new(),
        }
    }
}

/// No target means every namespace currently terminating. This is the first
/// read of a pass, so transport failures here are fatal.
pub async fn resolve(provider: &dyn ClusterStateProvider, target: Option<&str>) -> Result<Scope> {
    match target {
        Some(name) => match provider.get_namespace(name).await.map_err(escalate)? {
            Some(snapshot) => {
                debug!("Namespace {} is {}", name, snapshot.phase);
                Ok(Scope::Namespaces(vec![snapshot]))
            }
            None => {
                info!("Namespace {} does not exist", name);
                Ok(Scope::NotFound(name.to_string()))
            }
        },
        None => {
            let mut terminating: Vec<NamespaceSnapshot> = provider
                .list_namespaces()
                .await
                .map_err(escalate)?
                .into_iter()
                .filter(|n| n.is_terminating())
                .collect();
            terminating.sort_by(|a, b| a.name.cmp(&b.name));
            info!("Found {} terminating namespace(s)", terminating.len());
            Ok(Scope::Namespaces(terminating))
        }
    }
}

fn escalate(error: NsDoctorError) -> NsDoctorError {
    if error.is_connectivity() {
        NsDoctorError::Connectivity(error.to_string())
    } else {
        error
    }
}
