use serde::{Deserialize, Serialize};

use crate::constants::{BROKER_PATH_SUFFIX, DEFAULT_AUTO_ARRIVAL_SECONDS};

/// Configuration for one tracking session. A single base URL drives both the
/// REST endpoints and the broker endpoint; the broker address can also be
/// overridden explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// REST base URL, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    /// Explicit broker endpoint; when set, derivation from `base_url` is
    /// skipped.
    pub broker_override: Option<String>,
    /// Kill switch: when false the broker never connects and any existing
    /// connection is torn down.
    pub enabled: bool,
    /// Drive the motion simulator when no live position is available.
    pub simulate: bool,
    /// Simulated flight duration from start to destination.
    pub auto_arrival_seconds: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            broker_override: None,
            enabled: true,
            simulate: false,
            auto_arrival_seconds: DEFAULT_AUTO_ARRIVAL_SECONDS,
        }
    }
}

impl TrackingConfig {
    /// Derive the broker endpoint from the REST base URL: trailing slashes
    /// and a trailing `/api` segment are stripped, then the broker path
    /// suffix is appended.
    pub fn broker_endpoint(&self) -> String {
        if let Some(url) = &self.broker_override {
            return url.clone();
        }
        let trimmed = self.base_url.trim_end_matches('/');
        let root = trimmed.strip_suffix("/api").unwrap_or(trimmed);
        format!("{}{}", root, BROKER_PATH_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_endpoint_strips_api_suffix() {
        let config = TrackingConfig {
            base_url: "http://localhost:8080/api".to_string(),
            ..TrackingConfig::default()
        };
        assert_eq!(config.broker_endpoint(), "http://localhost:8080/api/ws");
    }

    #[test]
    fn broker_endpoint_strips_trailing_slashes() {
        let config = TrackingConfig {
            base_url: "http://localhost:8080/api///".to_string(),
            ..TrackingConfig::default()
        };
        assert_eq!(config.broker_endpoint(), "http://localhost:8080/api/ws");
    }

    #[test]
    fn broker_endpoint_without_api_segment() {
        let config = TrackingConfig {
            base_url: "http://tracking.internal:9000".to_string(),
            ..TrackingConfig::default()
        };
        assert_eq!(config.broker_endpoint(), "http://tracking.internal:9000/api/ws");
    }

    #[test]
    fn override_wins_over_derivation() {
        let config = TrackingConfig {
            base_url: "http://localhost:8080/api".to_string(),
            broker_override: Some("tcp://broker:61613".to_string()),
            ..TrackingConfig::default()
        };
        assert_eq!(config.broker_endpoint(), "tcp://broker:61613");
    }
}
