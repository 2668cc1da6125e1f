use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_per_subscriber_buffer() -> usize {
    256
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_runner_deadline_secs() -> u64 {
    10
}

fn default_fusion_top_k() -> usize {
    10
}

fn default_per_source_take() -> usize {
    3
}

fn default_session_reap_grace_secs() -> u64 {
    5
}

/// The six tunables from the configuration table, each independently
/// overridable by a `RECO_*` environment variable. Precedence (lowest to
/// highest): these defaults, an optional config file, environment
/// variables, explicit CLI flags — mirrored by `OrchestratorConfig::from_env`
/// and by the `engine` binary's CLI parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default = "default_per_subscriber_buffer")]
    pub per_subscriber_buffer: usize,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_interval_secs: u64,

    #[serde(default = "default_runner_deadline_secs")]
    pub runner_deadline_secs: u64,

    #[serde(default = "default_fusion_top_k")]
    pub fusion_top_k: usize,

    #[serde(default = "default_per_source_take")]
    pub per_source_take: usize,

    #[serde(default = "default_session_reap_grace_secs")]
    pub session_reap_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            per_subscriber_buffer: default_per_subscriber_buffer(),
            keep_alive_interval_secs: default_keep_alive_secs(),
            runner_deadline_secs: default_runner_deadline_secs(),
            fusion_top_k: default_fusion_top_k(),
            per_source_take: default_per_source_take(),
            session_reap_grace_secs: default_session_reap_grace_secs(),
        }
    }
}

impl OrchestratorConfig {
    /// Overlay environment variables onto a base config (usually
    /// `Self::default()`, or a config file's deserialized value).
    pub fn from_env_overlay(mut self) -> Self {
        if let Some(v) = env_usize("RECO_PER_SUBSCRIBER_BUFFER") {
            self.per_subscriber_buffer = v;
        }
        if let Some(v) = env_u64("RECO_KEEP_ALIVE_INTERVAL_SECS") {
            self.keep_alive_interval_secs = v;
        }
        if let Some(v) = env_u64("RECO_RUNNER_DEADLINE_SECS") {
            self.runner_deadline_secs = v;
        }
        if let Some(v) = env_usize("RECO_FUSION_TOP_K") {
            self.fusion_top_k = v;
        }
        if let Some(v) = env_usize("RECO_PER_SOURCE_TAKE") {
            self.per_source_take = v;
        }
        if let Some(v) = env_u64("RECO_SESSION_REAP_GRACE_SECS") {
            self.session_reap_grace_secs = v;
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().from_env_overlay()
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    pub fn runner_deadline(&self) -> Duration {
        Duration::from_secs(self.runner_deadline_secs)
    }

    pub fn session_reap_grace(&self) -> Duration {
        Duration::from_secs(self.session_reap_grace_secs)
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
