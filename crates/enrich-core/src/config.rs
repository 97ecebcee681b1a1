//! Environment-driven configuration, in the manner of the teacher's
//! `abp-config::BackplaneConfig` but without a file-loading surface:
//! this pipeline has only environment-tunable knobs.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while loading [`PipelineConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// The environment variable name.
        var: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// Pipeline-tunable knobs, loaded once at process startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Base unit for the orchestrator's soft-barrier dispatch delays
    /// (`spec.md` §4.4): classify and summarize wait `1x`, docqa-select
    /// `3x`, normalize `4x`, and ticket creation `5x` this delay after
    /// ingestion, giving straggling sibling tasks a chance to land
    /// first.
    pub settle_delay: Duration,
    /// Maximum attempts (including the first) for a transient stage failure.
    pub retry_max_attempts: u32,
    /// Base delay for the retry backoff policy.
    pub retry_base_delay: Duration,
    /// Root directory for the file-backed event log.
    pub event_log_root: PathBuf,
    /// When `true`, the help-desk collaborator runs in sandbox mode:
    /// tickets are accepted locally and never sent to a real help desk.
    pub helpdesk_sandbox: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            event_log_root: PathBuf::from("./data/events"),
            helpdesk_sandbox: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables, falling back to
    /// [`PipelineConfig::default`] for anything unset.
    ///
    /// Recognized variables: `ENRICH_SETTLE_DELAY_SECS`,
    /// `ENRICH_RETRY_MAX_ATTEMPTS`, `ENRICH_RETRY_BASE_DELAY_SECS`,
    /// `ENRICH_EVENT_LOG_ROOT`, `ENRICH_HELPDESK_SANDBOX`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let settle_delay = match std::env::var("ENRICH_SETTLE_DELAY_SECS") {
            Ok(raw) => Duration::from_secs_f64(parse_f64("ENRICH_SETTLE_DELAY_SECS", &raw)?),
            Err(_) => defaults.settle_delay,
        };

        let retry_max_attempts = match std::env::var("ENRICH_RETRY_MAX_ATTEMPTS") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "ENRICH_RETRY_MAX_ATTEMPTS",
                    value: raw,
                })?,
            Err(_) => defaults.retry_max_attempts,
        };

        let retry_base_delay = match std::env::var("ENRICH_RETRY_BASE_DELAY_SECS") {
            Ok(raw) => Duration::from_secs_f64(parse_f64("ENRICH_RETRY_BASE_DELAY_SECS", &raw)?),
            Err(_) => defaults.retry_base_delay,
        };

        let event_log_root = match std::env::var("ENRICH_EVENT_LOG_ROOT") {
            Ok(raw) => PathBuf::from(raw),
            Err(_) => defaults.event_log_root,
        };

        let helpdesk_sandbox = match std::env::var("ENRICH_HELPDESK_SANDBOX") {
            Ok(raw) => parse_bool("ENRICH_HELPDESK_SANDBOX", &raw)?,
            Err(_) => defaults.helpdesk_sandbox,
        };

        Ok(Self {
            settle_delay,
            retry_max_attempts,
            retry_base_delay,
            event_log_root,
            helpdesk_sandbox,
        })
    }
}

fn parse_f64(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.retry_max_attempts, 3);
        assert!(cfg.helpdesk_sandbox);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "nope").is_err());
    }
}
