use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::DEFAULT_BOOKING_TIMEOUT;
use crate::session::{SessionConfig, SignUpPolicy};

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

/// Server settings, read from `HRD_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub admin_password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub booking_timeout: Duration,
    pub session: SessionConfig,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let session_ttl: Option<u64> = parsed(&lookup, "HRD_SESSION_TTL_SECS")?;
        let booking_timeout_ms: Option<u64> = parsed(&lookup, "HRD_BOOKING_TIMEOUT_MS")?;
        let max_connections: usize = parsed(&lookup, "HRD_MAX_CONNECTIONS")?.unwrap_or(256);
        if max_connections == 0 {
            return Err(ConfigError {
                var: "HRD_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            bind: lookup("HRD_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "HRD_PORT")?.unwrap_or(7420),
            data_dir: lookup("HRD_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            admin_password: lookup("HRD_ADMIN_PASSWORD").unwrap_or_else(|| "hrd".into()),
            max_connections,
            compact_threshold: parsed(&lookup, "HRD_COMPACT_THRESHOLD")?.unwrap_or(1000),
            booking_timeout: booking_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BOOKING_TIMEOUT),
            session: SessionConfig {
                ttl: session_ttl.filter(|&s| s > 0).map(Duration::from_secs),
                sign_up_existing: parsed::<SignUpPolicy>(&lookup, "HRD_SIGNUP_EXISTING")?
                    .unwrap_or_default(),
            },
            metrics_port: parsed(&lookup, "HRD_METRICS_PORT")?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("hrd.wal")
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else { return Ok(None) };
    raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError {
        var,
        reason: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.addr(), "0.0.0.0:7420");
        assert_eq!(c.wal_path(), PathBuf::from("./data/hrd.wal"));
        assert_eq!(c.max_connections, 256);
        assert_eq!(c.compact_threshold, 1000);
        assert_eq!(c.booking_timeout, DEFAULT_BOOKING_TIMEOUT);
        assert_eq!(c.session.ttl, None);
        assert_eq!(c.session.sign_up_existing, SignUpPolicy::SignIn);
        assert_eq!(c.metrics_port, None);
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("HRD_PORT", "9000"),
            ("HRD_SESSION_TTL_SECS", "3600"),
            ("HRD_SIGNUP_EXISTING", "reject"),
            ("HRD_BOOKING_TIMEOUT_MS", "250"),
            ("HRD_METRICS_PORT", "9100"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.session.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(c.session.sign_up_existing, SignUpPolicy::Reject);
        assert_eq!(c.booking_timeout, Duration::from_millis(250));
        assert_eq!(c.metrics_port, Some(9100));
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let c = config(&[("HRD_SESSION_TTL_SECS", "0")]).unwrap();
        assert_eq!(c.session.ttl, None);
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = config(&[("HRD_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.var, "HRD_PORT");
        assert!(config(&[("HRD_SIGNUP_EXISTING", "maybe")]).is_err());
        assert!(config(&[("HRD_MAX_CONNECTIONS", "0")]).is_err());
    }
}
