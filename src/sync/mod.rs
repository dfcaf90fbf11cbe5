//! Remote synchronization
//!
//! Local commits are pushed per leaf by a supervised queue; remote changes
//! come back through pulls and realtime subscriptions and are applied with
//! last-modified-wins under the store's timestamp compare-and-set.

pub mod engine;
pub mod http;
pub mod locks;
pub mod queue;
pub mod remote;
pub mod resolve;

pub use engine::{Subscription, SyncEngine, SyncOutcome, SyncReport, MAX_REMOTE_CLOCK_SKEW_MS};
pub use http::HttpRemoteStore;
pub use locks::LeafLockManager;
pub use queue::{QueueStats, SyncQueue, SyncQueueConfig};
pub use remote::{MemoryRemoteStore, RecordBody, RemoteRecord, RemoteStore};
pub use resolve::{resolve_conflict, Resolution, Winner};

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Remote sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the record collection; `None` keeps records in memory
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Follow remote changes while running
    #[serde(default = "default_realtime")]
    pub realtime: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_max_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_queue_size() -> usize {
    10000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_realtime() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            workers: default_workers(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_queue_size: default_max_queue_size(),
            request_timeout_ms: default_request_timeout_ms(),
            realtime: default_realtime(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Remote store for the configured endpoint
pub fn build_remote(config: &SyncConfig) -> Result<Arc<dyn RemoteStore>, SyncError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpRemoteStore::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_millis(config.request_timeout_ms),
            Duration::from_millis(config.poll_interval_ms),
        )?)),
        None => Ok(Arc::new(MemoryRemoteStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SyncConfig = toml::from_str("enabled = true\nworkers = 4").unwrap();
        assert!(config.enabled);
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_retry_attempts, 3);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_queue_config_from_sync_config() {
        let config = SyncConfig {
            workers: 0,
            ..SyncConfig::default()
        };
        let queue = SyncQueueConfig::from(&config);
        assert_eq!(queue.workers, 1);
        assert_eq!(queue.max_queue_size, 10000);
        assert!(queue.realtime);

        let config = SyncConfig {
            realtime: false,
            ..SyncConfig::default()
        };
        assert!(!SyncQueueConfig::from(&config).realtime);
    }
}
