//! Engine configuration loaded from environment variables.
//!
//! | Env Var                        | Default |
//! |--------------------------------|---------|
//! | `VALIDATION_BATCH_SIZE`        | `1000`  |
//! | `VALIDATION_MAX_PREVIEW_ROWS`  | `100`   |
//! | `VALIDATION_STOP_THRESHOLD`    | `50`    |
//! | `VALIDATION_MAX_STORED_ISSUES` | unset   |
//! | `VALIDATION_REALTIME_UPDATES`  | `true`  |
//! | `PROGRESS_SINK_URL`            | unset   |
//! | `PORT`                         | `3000`  |

use std::env;

use crate::error::ConfigError;
use crate::models::OptionDefaults;

/// Runtime configuration for the engine and server.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub defaults: OptionDefaults,
    /// Base URL of the job-progress service; no sink when unset.
    pub progress_sink_url: Option<String>,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: OptionDefaults::default(),
            progress_sink_url: None,
            port: 3000,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = OptionDefaults::default();

        let batch_size = parse_or(
            &lookup,
            "VALIDATION_BATCH_SIZE",
            "a positive integer",
            base.batch_size,
        )?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                var: "VALIDATION_BATCH_SIZE",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        let defaults = OptionDefaults {
            batch_size,
            max_preview_rows: parse_or(
                &lookup,
                "VALIDATION_MAX_PREVIEW_ROWS",
                "a non-negative integer",
                base.max_preview_rows,
            )?,
            real_time_updates: parse_or(
                &lookup,
                "VALIDATION_REALTIME_UPDATES",
                "true or false",
                base.real_time_updates,
            )?,
            stop_on_error_threshold: parse_or(
                &lookup,
                "VALIDATION_STOP_THRESHOLD",
                "a percentage",
                base.stop_on_error_threshold,
            )?,
            max_stored_issues: match lookup("VALIDATION_MAX_STORED_ISSUES") {
                Some(raw) => Some(parse_value(
                    "VALIDATION_MAX_STORED_ISSUES",
                    "a positive integer",
                    &raw,
                )?),
                None => None,
            },
        };

        let progress_sink_url = lookup("PROGRESS_SINK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let port = parse_or(&lookup, "PORT", "a valid port", 3000u16)?;

        Ok(Self {
            defaults,
            progress_sink_url,
            port,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(raw) => parse_value(var, expected, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
    raw: &str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        expected,
        value: raw.to_string(),
    })
}
