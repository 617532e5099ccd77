//! Public configuration surface for [`crate::client::InvokeLensClient`].

use invokelens_transport::{TransportConfig, TransportMode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

fn default_endpoint() -> String {
    "https://api.invokelens.com".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_seconds() -> f64 {
    5.0
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_status_check_ttl() -> f64 {
    10.0
}

/// `transport_mode` as recognized in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportModeConfig {
    Http,
    Eventbridge,
}

impl Default for TransportModeConfig {
    fn default() -> Self {
        Self::Http
    }
}

/// SDK-wide configuration, constructed directly by the embedding
/// application (there is no on-disk config file — matching the original
/// SDK, which takes these as constructor arguments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint_url: String,
    #[serde(default)]
    pub transport_mode: TransportModeConfig,
    pub event_bus_name: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_seconds")]
    pub flush_interval_seconds: f64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_true")]
    pub enable_kill_switch: bool,
    #[serde(default = "default_status_check_ttl")]
    pub status_check_ttl: f64,
}

impl SdkConfig {
    /// Construct the minimal configuration: only the API key is required.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint_url: default_endpoint(),
            transport_mode: TransportModeConfig::default(),
            event_bus_name: None,
            batch_size: default_batch_size(),
            flush_interval_seconds: default_flush_interval_seconds(),
            max_queue_size: default_max_queue_size(),
            enable_kill_switch: default_true(),
            status_check_ttl: default_status_check_ttl(),
        }
    }

    pub(crate) fn status_check_ttl_duration(&self) -> Duration {
        Duration::from_secs_f64(self.status_check_ttl.max(0.0))
    }

    pub(crate) fn to_transport_config(&self) -> TransportConfig {
        TransportConfig {
            endpoint_url: self.endpoint_url.clone(),
            api_key: self.api_key.clone(),
            mode: match self.transport_mode {
                TransportModeConfig::Http => TransportMode::Http,
                TransportModeConfig::Eventbridge => TransportMode::EventBridge,
            },
            event_bus_name: self.event_bus_name.clone().unwrap_or_else(|| "invokelens-bus".to_string()),
            batch_size: self.batch_size,
            flush_interval: Duration::from_secs_f64(self.flush_interval_seconds.max(0.0)),
            max_queue_size: self.max_queue_size,
        }
    }
}

/// The event `region` field: `AWS_DEFAULT_REGION` if set, else `us-east-1`.
#[must_use]
pub fn resolve_region() -> String {
    env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_documented_defaults() {
        let config = SdkConfig::new("key");
        assert_eq!(config.endpoint_url, "https://api.invokelens.com");
        assert_eq!(config.batch_size, 10);
        assert!((config.flush_interval_seconds - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.max_queue_size, 1000);
        assert!(config.enable_kill_switch);
        assert!((config.status_check_ttl - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn transport_config_falls_back_to_default_bus_name() {
        let config = SdkConfig::new("key");
        let transport_config = config.to_transport_config();
        assert_eq!(transport_config.event_bus_name, "invokelens-bus");
    }
}
