use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vigil_common::protocol::{ConfigUpdate, MonitoringConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Owns the monitoring configuration and its persisted record.
///
/// Clones share the same record, so the reporter and the probe loop observe
/// dispatcher updates immediately. Mutation goes through [`update`] only;
/// `is_active` is recomputed there and nowhere else.
///
/// [`update`]: ConfigStore::update
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<MonitoringConfig>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MonitoringConfig::default())),
            path,
        }
    }

    /// Store without a persisted record. Used by tests and ad-hoc runs.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vigil").join("config.json"))
    }

    /// Restore the last persisted record. Runs once at startup; a missing
    /// or unreadable file leaves the defaults standing.
    pub async fn load(&self) {
        let Some(path) = &self.path else { return };
        match read_record(path).await {
            Ok(mut config) => {
                config.is_active = config.derive_active();
                info!("restored persisted monitoring config");
                *self.inner.write().await = config;
            }
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("ignoring persisted config: {}", e),
        }
    }

    pub async fn get(&self) -> MonitoringConfig {
        self.inner.read().await.clone()
    }

    /// Apply a partial update. Identifiers fall back to empty; an absent or
    /// empty base URL keeps the previous one. Recomputes `is_active`,
    /// persists the full record, and returns the new config. Persistence
    /// failures are logged and otherwise invisible to the caller.
    pub async fn update(&self, update: ConfigUpdate) -> MonitoringConfig {
        let mut guard = self.inner.write().await;
        let mut next = MonitoringConfig {
            base_url: update
                .base_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| guard.base_url.clone()),
            assessment_id: update.assessment_id.unwrap_or_default(),
            candidate_id: update.candidate_id.unwrap_or_default(),
            submission_id: update.submission_id.unwrap_or_default(),
            is_active: false,
        };
        next.is_active = next.derive_active();
        *guard = next.clone();
        drop(guard);

        self.persist(&next).await;
        next
    }

    async fn persist(&self, config: &MonitoringConfig) {
        let Some(path) = &self.path else { return };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("failed to create config directory: {}", e);
                return;
            }
        }
        // to_vec_pretty only fails on non-string keys, which this type
        // cannot produce.
        let bytes = match serde_json::to_vec_pretty(config) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to serialize config: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, bytes).await {
            warn!("failed to persist config: {}", e);
        }
    }
}

async fn read_record(path: &Path) -> Result<MonitoringConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
