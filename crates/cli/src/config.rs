//! Service configuration for `trace serve`.
//!
//! Settings come from four layers, highest precedence first: command-line
//! flags, `TRACE_*` environment variables, an optional TOML file, and the
//! built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default listening port.
pub(crate) const DEFAULT_PORT: u16 = 8000;

/// Default per-request timeout in seconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

/// Settings for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ServeConfig {
    #[serde(default = "default_port")]
    pub(crate) port: u16,

    /// Seconds before an in-flight request is answered with 408.
    #[serde(default = "default_request_timeout")]
    pub(crate) request_timeout_secs: u64,

    /// Requests allowed per IP per minute.
    #[serde(default = "default_rate_limit")]
    pub(crate) rate_limit_per_minute: u64,

    /// Reject breaches that no SLA rule classifies instead of flagging them.
    #[serde(default)]
    pub(crate) strict_breach_classification: bool,

    /// SLA rule table to load instead of the builtin one.
    #[serde(default)]
    pub(crate) rules_path: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_rate_limit() -> u64 {
    DEFAULT_RATE_LIMIT
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
            strict_breach_classification: false,
            rules_path: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("error reading config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid service configuration: {field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Values given on the command line; `None` / `false` leave lower layers alone.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServeOverrides {
    pub(crate) port: Option<u16>,
    pub(crate) rules_path: Option<PathBuf>,
    pub(crate) strict: bool,
}

impl ServeConfig {
    pub(crate) fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TRACE_*` variables. Unparseable values are logged and ignored.
    pub(crate) fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_env(&lookup, "TRACE_PORT") {
            self.port = port;
        }
        if let Some(limit) = parse_env(&lookup, "TRACE_RATE_LIMIT") {
            self.rate_limit_per_minute = limit;
        }
        if let Some(secs) = parse_env(&lookup, "TRACE_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs;
        }
        if let Some(path) = lookup("TRACE_SLA_RULES").filter(|v| !v.is_empty()) {
            self.rules_path = Some(PathBuf::from(path));
        }
    }

    pub(crate) fn apply_overrides(&mut self, overrides: ServeOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = overrides.rules_path {
            self.rules_path = Some(path);
        }
        if overrides.strict {
            self.strict_breach_classification = true;
        }
    }

    /// Reject settings the service cannot run with.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_per_minute == 0 {
            return Err(ConfigError::Zero {
                field: "rate_limit_per_minute",
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "request_timeout_secs",
            });
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

/// Resolve the effective configuration from every layer.
pub(crate) fn resolve(
    config_path: Option<&Path>,
    overrides: ServeOverrides,
) -> Result<ServeConfig, ConfigError> {
    let mut config = match config_path {
        Some(path) => ServeConfig::from_path(path)?,
        None => ServeConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServeConfig::default());
        assert_eq!(config.port, 8000);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.rate_limit_per_minute, 60);
    }

    #[test]
    fn file_values_override_defaults() {
        let config: ServeConfig = toml::from_str(
            r#"
            port = 9100
            rate_limit_per_minute = 5
            strict_breach_classification = true
            rules_path = "rules/audit.toml"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.rate_limit_per_minute, 5);
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.strict_breach_classification);
        assert_eq!(config.rules_path, Some(PathBuf::from("rules/audit.toml")));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = ServeConfig {
            port: 9100,
            ..ServeConfig::default()
        };
        config.apply_env(env(&[
            ("TRACE_PORT", "9200"),
            ("TRACE_RATE_LIMIT", "7"),
            ("TRACE_REQUEST_TIMEOUT_SECS", "3"),
            ("TRACE_SLA_RULES", "/etc/trace/rules.toml"),
        ]));
        assert_eq!(config.port, 9200);
        assert_eq!(config.rate_limit_per_minute, 7);
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(
            config.rules_path,
            Some(PathBuf::from("/etc/trace/rules.toml"))
        );
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let mut config = ServeConfig::default();
        config.apply_env(env(&[("TRACE_PORT", "not-a-port"), ("TRACE_SLA_RULES", "")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.rules_path, None);
    }

    #[test]
    fn cli_overrides_env() {
        let mut config = ServeConfig::default();
        config.apply_env(env(&[("TRACE_PORT", "9200")]));
        config.apply_overrides(ServeOverrides {
            port: Some(9300),
            rules_path: None,
            strict: true,
        });
        assert_eq!(config.port, 9300);
        assert!(config.strict_breach_classification);
    }

    #[test]
    fn unset_overrides_leave_lower_layers() {
        let mut config = ServeConfig {
            strict_breach_classification: true,
            ..ServeConfig::default()
        };
        config.apply_overrides(ServeOverrides::default());
        assert!(config.strict_breach_classification);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(ServeConfig::default().validate().is_ok());

        let no_requests = ServeConfig {
            rate_limit_per_minute: 0,
            ..ServeConfig::default()
        };
        assert!(matches!(
            no_requests.validate(),
            Err(ConfigError::Zero {
                field: "rate_limit_per_minute"
            })
        ));

        let no_budget = ServeConfig {
            request_timeout_secs: 0,
            ..ServeConfig::default()
        };
        let err = no_budget.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid service configuration: request_timeout_secs must be greater than zero"
        );
    }

    #[test]
    fn resolve_rejects_zero_rate_limit_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serve.toml");
        std::fs::write(&path, "rate_limit_per_minute = 0").unwrap();
        let overrides = ServeOverrides {
            port: Some(9400),
            ..ServeOverrides::default()
        };
        if std::env::var("TRACE_RATE_LIMIT").is_err() {
            assert!(matches!(
                resolve(Some(&path), overrides),
                Err(ConfigError::Zero { .. })
            ));
        }
    }

    #[test]
    fn from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serve.toml");
        std::fs::write(&path, "port = \"eighty\"").unwrap();
        assert!(matches!(
            ServeConfig::from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            ServeConfig::from_path(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
