// src/config.rs

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api_client::{ApiClient, ApiConfig, DEFAULT_TIMEOUT_SECS};
use crate::clock::{Clock, Latency};
use crate::error::{HrError, Result};
use crate::fixtures::Fixtures;
use crate::memory_store::MemoryBackend;
use crate::models::{AttendanceRecord, Department, Employee, TimeOffRequest};
use crate::remote_store::RemoteStore;
use crate::service::{HrService, TransitionPolicy};
use crate::store::{Backend, Stores};

pub const ENV_PREFIX: &str = "HR_";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

fn default_true() -> bool {
    true
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Runtime settings, read from `HR_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: Backend,
    /// Directory with the four fixture files. Built-in fixtures are used when unset.
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,
    #[serde(default)]
    pub mock_latency_ms: u64,
    #[serde(default = "default_true")]
    pub allow_status_reopen: bool,

    // Server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,

    // Remote records API
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub remote_project_id: Option<String>,
    #[serde(default)]
    pub remote_public_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub remote_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            fixtures_dir: None,
            mock_latency_ms: 0,
            allow_status_reopen: true,
            bind_addr: default_bind_addr(),
            cert_path: None,
            key_path: None,
            remote_url: None,
            remote_project_id: None,
            remote_public_key: None,
            remote_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<Settings>()
            .map_err(|e| HrError::Config(e.to_string()))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
            .map_err(|e| HrError::Config(e.to_string()))
    }

    pub fn policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            allow_reopen: self.allow_status_reopen,
        }
    }

    pub fn latency(&self) -> Latency {
        Latency::from_millis(self.mock_latency_ms)
    }

    /// `Some((cert, key))` when HTTPS is configured. Setting only one of the two is an error.
    pub fn tls_paths(&self) -> Result<Option<(&str, &str)>> {
        match (self.cert_path.as_deref(), self.key_path.as_deref()) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            _ => Err(HrError::Config(
                "HR_CERT_PATH and HR_KEY_PATH must be set together".to_string(),
            )),
        }
    }

    pub fn api_config(&self) -> Result<ApiConfig> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HrError::Config(format!("{}{} is required for the remote backend", ENV_PREFIX, name)))
        };
        Ok(ApiConfig {
            base_url: require(&self.remote_url, "REMOTE_URL")?,
            project_id: require(&self.remote_project_id, "REMOTE_PROJECT_ID")?,
            public_key: require(&self.remote_public_key, "REMOTE_PUBLIC_KEY")?,
            timeout_secs: self.remote_timeout_secs,
        })
    }

    pub fn load_fixtures(&self) -> Result<Fixtures> {
        match &self.fixtures_dir {
            Some(dir) => Fixtures::load_dir(dir),
            None => Fixtures::builtin(),
        }
    }

    pub fn build_stores(&self, clock: Arc<dyn Clock>) -> Result<Stores> {
        match self.backend {
            Backend::Memory => {
                let fixtures = self.load_fixtures()?;
                info!(
                    "Using in-memory backend with {}ms simulated latency",
                    self.mock_latency_ms
                );
                Ok(MemoryBackend::seeded(fixtures, clock, self.latency()).stores())
            }
            Backend::Remote => {
                let client = Arc::new(ApiClient::new(self.api_config()?)?);
                info!("Using remote backend at {}", client.base_url());
                Ok(Stores {
                    backend: Backend::Remote,
                    employees: Arc::new(RemoteStore::<Employee>::new(client.clone(), clock.clone())),
                    departments: Arc::new(RemoteStore::<Department>::new(
                        client.clone(),
                        clock.clone(),
                    )),
                    time_off: Arc::new(RemoteStore::<TimeOffRequest>::new(
                        client.clone(),
                        clock.clone(),
                    )),
                    attendance: Arc::new(RemoteStore::<AttendanceRecord>::new(client, clock)),
                })
            }
        }
    }

    pub fn build_service(&self, clock: Arc<dyn Clock>) -> Result<HrService> {
        let stores = self.build_stores(clock.clone())?;
        Ok(HrService::new(stores, clock, self.policy()))
    }
}
