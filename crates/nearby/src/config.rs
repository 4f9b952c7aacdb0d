use crate::provider::{ConnectOptions, NearbyPermissions};
use serde::Deserialize;
use std::env;

/// Default number of notifications buffered per listener
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(anyhow::anyhow!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NearbyConfig {
    /// API key used when the client does not pass one to initialize
    pub api_key: Option<String>,
    pub notification_capacity: usize,
    pub permissions: NearbyPermissions,
    pub log_format: LogFormat,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            permissions: NearbyPermissions::Default,
            log_format: LogFormat::Json,
        }
    }
}

impl NearbyConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup, `NEARBY_*` keys
    pub fn from_source<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let notification_capacity: usize = get("NEARBY_NOTIFICATION_CAPACITY")
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_CAPACITY.to_string())
            .parse()?;
        if notification_capacity == 0 {
            anyhow::bail!("NEARBY_NOTIFICATION_CAPACITY must be at least 1");
        }

        let permissions = match get("NEARBY_PERMISSIONS") {
            Some(value) => {
                let code: i32 = value.trim().parse()?;
                NearbyPermissions::from_code(code)
                    .ok_or_else(|| anyhow::anyhow!("unknown NEARBY_PERMISSIONS value {}", code))?
            }
            None => NearbyPermissions::Default,
        };

        Ok(NearbyConfig {
            api_key: get("NEARBY_API_KEY").filter(|key| !key.is_empty()),
            notification_capacity,
            permissions,
            log_format: get("NEARBY_LOG_FORMAT")
                .unwrap_or_else(|| "json".to_string())
                .parse()?,
        })
    }

    /// Provider connect options, preferring the key passed by the client
    pub fn connect_options(&self, api_key: Option<String>) -> ConnectOptions {
        ConnectOptions {
            api_key: api_key.or_else(|| self.api_key.clone()),
            permissions: self.permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = NearbyConfig::from_source(source(&[])).unwrap();
        assert_eq!(config, NearbyConfig::default());
    }

    #[test]
    fn test_reads_nearby_keys() {
        let config = NearbyConfig::from_source(source(&[
            ("NEARBY_API_KEY", "key-123"),
            ("NEARBY_NOTIFICATION_CAPACITY", "8"),
            ("NEARBY_PERMISSIONS", "6"),
            ("NEARBY_LOG_FORMAT", "Pretty"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert_eq!(config.notification_capacity, 8);
        assert_eq!(config.permissions, NearbyPermissions::Bluetooth);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(NearbyConfig::from_source(source(&[("NEARBY_NOTIFICATION_CAPACITY", "0")])).is_err());
        assert!(NearbyConfig::from_source(source(&[("NEARBY_PERMISSIONS", "3")])).is_err());
        assert!(NearbyConfig::from_source(source(&[("NEARBY_LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_client_key_wins() {
        let config = NearbyConfig {
            api_key: Some("from-env".to_string()),
            ..Default::default()
        };

        assert_eq!(
            config.connect_options(Some("from-client".to_string())).api_key.as_deref(),
            Some("from-client")
        );
        assert_eq!(config.connect_options(None).api_key.as_deref(), Some("from-env"));
    }
}
