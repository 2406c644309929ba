//! Middleware configuration.
//!
//! [`ReporterConfig`] is the serializable part that a host loads from its
//! configuration file. [`Options`] adds the status classifier, which can only
//! be supplied in code, and is what the layer is built from.

use std::time::Duration;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::classify::StatusClassifier;

/// Default upper bound on how long a request waits for delivery confirmation.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default upper bound on the body bytes buffered for inspection.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Configuration error for reporter settings
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid problem reporter config at '{key}': {source}")]
    Invalid {
        key: String,
        #[source]
        source: Box<figment::Error>,
    },
}

/// Serializable reporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    /// Block the request until the event is confirmed delivered.
    #[serde(default)]
    pub wait_for_delivery: bool,

    /// Maximum time to wait for delivery confirmation (e.g. `"2s"`, `"500ms"`).
    /// Only relevant when `wait_for_delivery` is set. Zero means the default.
    #[serde(default = "default_flush_timeout", with = "humantime_serde")]
    pub flush_timeout: Duration,

    /// Bodies larger than this are passed through without being inspected.
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            wait_for_delivery: false,
            flush_timeout: default_flush_timeout(),
            max_capture_bytes: default_max_capture_bytes(),
        }
    }
}

fn default_flush_timeout() -> Duration {
    DEFAULT_FLUSH_TIMEOUT
}

fn default_max_capture_bytes() -> usize {
    DEFAULT_MAX_CAPTURE_BYTES
}

impl ReporterConfig {
    /// Lenient loader: a missing `key` yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the section exists but cannot be deserialized.
    pub fn from_figment(figment: &Figment, key: &str) -> Result<Self, ConfigError> {
        if !figment.contains(key) {
            return Ok(Self::default());
        }

        figment
            .extract_inner(key)
            .map_err(|source| ConfigError::Invalid {
                key: key.to_owned(),
                source: Box::new(source),
            })
    }
}

/// Immutable middleware options.
///
/// Built once and shared by every request handled by the layer.
#[derive(Debug, Clone)]
#[must_use]
pub struct Options {
    pub wait_for_delivery: bool,
    pub flush_timeout: Duration,
    pub max_capture_bytes: usize,
    /// Decides which status codes are worth reporting.
    pub is_reportable: StatusClassifier,
}

impl From<ReporterConfig> for Options {
    fn from(config: ReporterConfig) -> Self {
        Self {
            wait_for_delivery: config.wait_for_delivery,
            flush_timeout: config.flush_timeout,
            max_capture_bytes: config.max_capture_bytes,
            is_reportable: StatusClassifier::default(),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        ReporterConfig::default().into()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_for_delivery(mut self, wait: bool) -> Self {
        self.wait_for_delivery = wait;
        self
    }

    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn max_capture_bytes(mut self, limit: usize) -> Self {
        self.max_capture_bytes = limit;
        self
    }

    /// Replace the status classifier. The default one is not consulted afterwards.
    pub fn report_status_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.is_reportable = StatusClassifier::new(predicate);
        self
    }

    /// Replace a zero flush timeout with the default one.
    pub(crate) fn normalized(mut self) -> Self {
        if self.flush_timeout.is_zero() {
            self.flush_timeout = DEFAULT_FLUSH_TIMEOUT;
        }
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::{Format, Serialized, Yaml};
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = ReporterConfig::default();
        assert!(!config.wait_for_delivery);
        assert_eq!(config.flush_timeout, Duration::from_secs(2));
        assert_eq!(config.max_capture_bytes, 1_048_576);

        let options = Options::new();
        assert!(!options.wait_for_delivery);
        assert_eq!(options.flush_timeout, Duration::from_secs(2));
        assert!(options.is_reportable.is_reportable(500));
        assert!(!options.is_reportable.is_reportable(400));
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let options = Options::new().flush_timeout(Duration::ZERO).normalized();
        assert_eq!(options.flush_timeout, DEFAULT_FLUSH_TIMEOUT);

        let options = Options::new()
            .flush_timeout(Duration::from_millis(250))
            .normalized();
        assert_eq!(options.flush_timeout, Duration::from_millis(250));
    }

    #[test]
    fn classifier_is_replaced_wholesale() {
        let options = Options::new().report_status_when(|s| (400..500).contains(&s));
        assert!(options.is_reportable.is_reportable(404));
        assert!(!options.is_reportable.is_reportable(500));
    }

    #[test]
    fn parses_humantime_durations() {
        let config: ReporterConfig = serde_json::from_value(json!({
            "wait_for_delivery": true,
            "flush_timeout": "500ms"
        }))
        .unwrap();
        assert!(config.wait_for_delivery);
        assert_eq!(config.flush_timeout, Duration::from_millis(500));
        assert_eq!(config.max_capture_bytes, DEFAULT_MAX_CAPTURE_BYTES);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = serde_json::from_value::<ReporterConfig>(json!({ "flush": "1s" }));
        assert!(result.is_err());
    }

    #[test]
    fn figment_missing_section_uses_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({ "other": { "x": 1 } })));
        let config = ReporterConfig::from_figment(&figment, "problem_reporter").unwrap();
        assert_eq!(config, ReporterConfig::default());
    }

    #[test]
    fn figment_section_is_extracted() {
        let figment = Figment::new().merge(Yaml::string(
            "problem_reporter:\n  wait_for_delivery: true\n  flush_timeout: 3s\n  \
             max_capture_bytes: 1024\n",
        ));
        let config = ReporterConfig::from_figment(&figment, "problem_reporter").unwrap();
        assert_eq!(
            config,
            ReporterConfig {
                wait_for_delivery: true,
                flush_timeout: Duration::from_secs(3),
                max_capture_bytes: 1024,
            }
        );
    }

    #[test]
    fn figment_invalid_section_is_an_error() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "problem_reporter": { "flush_timeout": "soon" }
        })));
        let err = ReporterConfig::from_figment(&figment, "problem_reporter").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "problem_reporter"));
    }
}
