//! Service configuration read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `PATIENT_SERVICE_ADDR` | `0.0.0.0:4003` |
//! | `PATIENT_SERVICE_DB` | `patient-service.db` |
//! | `CLINIC_DIRECTORY_URL` | unset, fees default to 0 |
//! | `NOTIFICATION_SERVICE_URL` | unset, notifications dropped |
//! | `UPSTREAM_TIMEOUT_SECS` | `3` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ADDR: &str = "0.0.0.0:4003";
pub const DEFAULT_DB_PATH: &str = "patient-service.db";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub clinic_directory_url: Option<String>,
    pub notification_url: Option<String>,
    pub upstream_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let addr = var("PATIENT_SERVICE_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "PATIENT_SERVICE_ADDR",
                message: e.to_string(),
            })?;

        let db_path = PathBuf::from(
            var("PATIENT_SERVICE_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        );

        let clinic_directory_url = var("CLINIC_DIRECTORY_URL")
            .map(|url| base_url("CLINIC_DIRECTORY_URL", url))
            .transpose()?;
        let notification_url = var("NOTIFICATION_SERVICE_URL")
            .map(|url| base_url("NOTIFICATION_SERVICE_URL", url))
            .transpose()?;

        let timeout_secs = match var("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "UPSTREAM_TIMEOUT_SECS",
                message: e.to_string(),
            })?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "UPSTREAM_TIMEOUT_SECS",
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            addr,
            db_path,
            clinic_directory_url,
            notification_url,
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn base_url(var: &'static str, url: String) -> Result<String, ConfigError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            var,
            message: format!("expected an http(s) URL, got {url}"),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr.port(), 4003);
        assert_eq!(config.db_path, PathBuf::from("patient-service.db"));
        assert!(config.clinic_directory_url.is_none());
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = config(&[("CLINIC_DIRECTORY_URL", "http://clinics:4001/")]).unwrap();
        assert_eq!(config.clinic_directory_url.as_deref(), Some("http://clinics:4001"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[("PATIENT_SERVICE_ADDR", "nowhere")]).is_err());
        assert!(config(&[("UPSTREAM_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("UPSTREAM_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("NOTIFICATION_SERVICE_URL", "notify:4005")]).is_err());
    }

    #[test]
    fn test_blank_counts_as_unset() {
        let config = config(&[("NOTIFICATION_SERVICE_URL", "  ")]).unwrap();
        assert!(config.notification_url.is_none());
    }
}
