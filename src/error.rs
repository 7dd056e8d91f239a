use thiserror::Error;

#[derive(Error, Debug)]
pub enum NsDoctorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Cannot reach the cluster: {0}")]
    Connectivity(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Step {step} failed: {message}")]
    Mutation { step: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl NsDoctorError {
    /// True when the API server answered 404 for the target.
    pub fn is_not_found(&self) -> bool {
        match self {
            NsDoctorError::KubeError(kube::Error::Api(ae)) => ae.code == 404,
            NsDoctorError::NotFound(_) => true,
            _ => false,
        }
    }

    /// True when the failure happened below the API layer: the server never
    /// produced a status response.
    pub fn is_connectivity(&self) -> bool {
        match self {
            NsDoctorError::KubeError(kube::Error::Api(_)) => false,
            NsDoctorError::KubeError(_) => true,
            NsDoctorError::Connectivity(_) | NsDoctorError::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NsDoctorError>;
