use crate::error::{NsDoctorError, Result};
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub kube: KubeConfig,

    #[serde(default)]
    pub diagnosis: DiagnosisConfig,

    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KubeConfig {
    /// Path to a single kubeconfig file. When unset, the usual `KUBECONFIG` /
    /// `~/.kube/config` / in-cluster inference applies.
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    5
}

#[derive(Clone, Debug, Deserialize)]
pub struct DiagnosisConfig {
    /// How many instance names to keep per resource kind for display.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Resource kinds never counted, in `plural` or `plural.group` form.
    #[serde(default = "default_skip_kinds")]
    pub skip_kinds: Vec<String>,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            skip_kinds: default_skip_kinds(),
        }
    }
}

fn default_sample_size() -> usize {
    5
}

fn default_skip_kinds() -> Vec<String> {
    // events.k8s.io serves the same objects as core/v1 events
    vec!["events.events.k8s.io".to_string()]
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemediationConfig {
    #[serde(default = "default_verification_wait")]
    pub verification_wait_seconds: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            verification_wait_seconds: default_verification_wait(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_verification_wait() -> u64 {
    10
}

fn default_max_concurrency() -> usize {
    4
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "warn,nsdoctor=info".to_string()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let max_concurrency =
            env_parse("NSDOCTOR_MAX_CONCURRENCY").unwrap_or_else(default_max_concurrency);
        if max_concurrency == 0 {
            return Err(NsDoctorError::ConfigError(
                "NSDOCTOR_MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            kube: KubeConfig {
                kubeconfig: std::env::var("NSDOCTOR_KUBECONFIG")
                    .ok()
                    .filter(|v| !v.is_empty()),
                context: std::env::var("NSDOCTOR_CONTEXT").ok(),
                request_timeout_seconds: env_parse("NSDOCTOR_REQUEST_TIMEOUT")
                    .unwrap_or_else(default_request_timeout),
                connect_timeout_seconds: env_parse("NSDOCTOR_CONNECT_TIMEOUT")
                    .unwrap_or_else(default_connect_timeout),
            },
            diagnosis: DiagnosisConfig {
                sample_size: env_parse("NSDOCTOR_SAMPLE_SIZE").unwrap_or_else(default_sample_size),
                skip_kinds: std::env::var("NSDOCTOR_SKIP_KINDS")
                    .map(|v| {
                        v.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_else(|_| default_skip_kinds()),
            },
            remediation: RemediationConfig {
                verification_wait_seconds: env_parse("NSDOCTOR_VERIFY_WAIT")
                    .unwrap_or_else(default_verification_wait),
                max_concurrency,
            },
            logging: LoggingConfig {
                level: std::env::var("NSDOCTOR_LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
                json_format: env_parse("NSDOCTOR_LOG_JSON").unwrap_or(false),
            },
        })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NsDoctorError::ConfigError(format!("Failed to read config file: {}", e))
        })?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| NsDoctorError::ConfigError(format!("Failed to parse config: {}", e)))?;

        if config.remediation.max_concurrency == 0 {
            return Err(NsDoctorError::ConfigError(
                "remediation.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
