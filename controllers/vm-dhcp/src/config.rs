//! Controller configuration
//!
//! Loaded from environment variables:
//!
//! | Variable            | Default        | Meaning                                    |
//! |---------------------|----------------|--------------------------------------------|
//! | `WATCH_NAMESPACE`   | all namespaces | Namespace of VMs and network configs       |
//! | `WEBHOOK_ADDR`      | `0.0.0.0:8443` | Listen address of admission/health server  |
//! | `WEBHOOK_DISABLED`  | `false`        | Skip the admission/health server           |
//! | `REQUEUE_DELAY_MS`  | `500`          | Delay before an explicitly enqueued pass   |
//! | `BACKOFF_MIN_SECS`  | `5`            | First retry delay after a failed pass      |
//! | `BACKOFF_MAX_SECS`  | `300`          | Retry delay cap                            |

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// `None` watches all namespaces
    pub namespace: Option<String>,
    /// `None` disables the webhook server
    pub webhook_addr: Option<SocketAddr>,
    pub requeue_delay: Duration,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let webhook_disabled: bool = parse_or("WEBHOOK_DISABLED", lookup("WEBHOOK_DISABLED"), false)?;
        let webhook_addr = if webhook_disabled {
            None
        } else {
            Some(parse_or(
                "WEBHOOK_ADDR",
                lookup("WEBHOOK_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 8443)),
            )?)
        };

        let requeue_delay_ms: u64 = parse_or("REQUEUE_DELAY_MS", lookup("REQUEUE_DELAY_MS"), 500)?;
        let backoff_min_secs: u64 = parse_or("BACKOFF_MIN_SECS", lookup("BACKOFF_MIN_SECS"), 5)?;
        let backoff_max_secs: u64 = parse_or("BACKOFF_MAX_SECS", lookup("BACKOFF_MAX_SECS"), 300)?;

        if backoff_min_secs == 0 || backoff_min_secs > backoff_max_secs {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({backoff_min_secs}) must be non-zero and not exceed BACKOFF_MAX_SECS ({backoff_max_secs})"
            )));
        }

        Ok(Self {
            namespace,
            webhook_addr,
            requeue_delay: Duration::from_millis(requeue_delay_ms),
            backoff_min_secs,
            backoff_max_secs,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{key}={raw:?} is invalid: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.webhook_addr, Some("0.0.0.0:8443".parse().unwrap()));
        assert_eq!(config.requeue_delay, Duration::from_millis(500));
        assert_eq!(config.backoff_min_secs, 5);
        assert_eq!(config.backoff_max_secs, 300);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WATCH_NAMESPACE", "vms"),
            ("WEBHOOK_ADDR", "127.0.0.1:9443"),
            ("REQUEUE_DELAY_MS", "50"),
            ("BACKOFF_MIN_SECS", "1"),
            ("BACKOFF_MAX_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("vms"));
        assert_eq!(config.webhook_addr, Some("127.0.0.1:9443".parse().unwrap()));
        assert_eq!(config.requeue_delay, Duration::from_millis(50));
        assert_eq!(config.backoff_max_secs, 10);
    }

    #[test]
    fn test_empty_namespace_means_all() {
        assert_eq!(config_from(&[("WATCH_NAMESPACE", "")]).unwrap().namespace, None);
    }

    #[test]
    fn test_webhook_disabled() {
        let config = config_from(&[("WEBHOOK_DISABLED", "true"), ("WEBHOOK_ADDR", "garbage")]).unwrap();
        assert_eq!(config.webhook_addr, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("WEBHOOK_ADDR", "not-an-addr")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("REQUEUE_DELAY_MS", "-1")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("BACKOFF_MIN_SECS", "20"), ("BACKOFF_MAX_SECS", "10")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
