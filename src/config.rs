//! @ai:module:intent Configuration structs for providers, retries and scheduling
//! @ai:module:layer infrastructure
//! @ai:module:public_api AigenConfig, ProviderSettings, RetryConfig, SchedulingConfig
//! @ai:module:stateless true

use crate::providers::{ProviderClient, ProviderKind};
use crate::queue::{DispatchMode, SchedulerConfig, WindowPolicy};
use crate::request::{CallConfig, RequestExecutor, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// @ai:intent Main configuration file
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AigenConfig {
    /// Keyed by provider id (`openai`, `stability`, `elevenlabs`)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scheduler: SchedulingConfig,
}

/// @ai:intent Credential and endpoint for one provider
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// @ai:intent Executor retry budget and backoff shape
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// @ai:intent Scheduler dispatch and window settings
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub dispatch: DispatchMode,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requeues: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::default(),
            window_secs: default_window_secs(),
            requests_per_window: default_requests_per_window(),
            max_requeues: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_window_secs() -> u64 {
    60
}

fn default_requests_per_window() -> u32 {
    1
}

impl AigenConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @ai:intent Starter file listing every provider with env-var credentials
    /// @ai:effects pure
    pub fn starter() -> Self {
        let providers = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let settings = ProviderSettings {
                    api_key_env: Some(kind.default_api_key_env().to_string()),
                    base_url: Some(kind.default_base_url().to_string()),
                    ..Default::default()
                };
                (kind.id().to_string(), settings)
            })
            .collect();

        Self {
            providers,
            ..Default::default()
        }
    }

    /// @ai:intent Settings for a provider, falling back to built-in defaults
    /// @ai:effects pure
    pub fn provider(&self, kind: ProviderKind) -> ProviderSettings {
        self.providers
            .get(kind.id())
            .cloned()
            .unwrap_or_default()
    }

    /// @ai:intent Resolve credentials and build the capability client for a provider
    /// @ai:effects env
    pub fn client(&self, kind: ProviderKind) -> Result<ProviderClient> {
        let call = self.provider(kind).call_config(kind)?;
        let executor = RequestExecutor::new(call).with_retry_policy(self.retry.policy());
        Ok(ProviderClient::new(kind, executor).with_max_retries(self.retry.max_retries))
    }
}

impl ProviderSettings {
    /// @ai:intent Explicit key first, then the configured or conventional env var
    /// @ai:effects env
    pub fn resolve_api_key(&self, kind: ProviderKind) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }

        let var = self
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| kind.default_api_key_env());
        std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("No API key for {kind}: set api_key or {var}"))
    }

    /// @ai:intent Immutable client configuration for the executor
    /// @ai:effects env
    pub fn call_config(&self, kind: ProviderKind) -> Result<CallConfig> {
        let api_key = self.resolve_api_key(kind)?;
        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string());

        Ok(CallConfig::new(kind.id(), api_key, base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_auth(kind.auth_scheme()))
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

impl SchedulingConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            dispatch: self.dispatch,
            window: WindowPolicy {
                window: Duration::from_secs(self.window_secs),
                requests_per_window: self.requests_per_window.max(1),
            },
            max_requeues: self.max_requeues,
        }
    }
}
