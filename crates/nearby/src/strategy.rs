// Discovery strategy translation
// Maps the client's strategy options onto provider strategy values

use crate::{NearbyError, Result};
use serde::{Deserialize, Serialize};

/// The default time to live in seconds.
pub const TTL_SECONDS_DEFAULT: u32 = 300;

/// The maximum time to live in seconds, if not `TTL_SECONDS_INFINITE`.
pub const TTL_SECONDS_MAX: u32 = 86_400;

/// An infinite time to live. Only supported for subscriptions.
pub const TTL_SECONDS_INFINITE: u32 = i32::MAX as u32;

/// How devices detect each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// Broadcast a pairing code for others to scan
    Broadcast,
    /// Scan for other devices' pairing codes
    Scan,
    /// Broadcast and scan
    Default,
}

impl DiscoveryMode {
    pub fn code(&self) -> i64 {
        match self {
            DiscoveryMode::Broadcast => 1,
            DiscoveryMode::Scan => 2,
            DiscoveryMode::Default => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DiscoveryMode::Broadcast),
            2 => Some(DiscoveryMode::Scan),
            3 => Some(DiscoveryMode::Default),
            _ => None,
        }
    }
}

/// Maximum distance at which a message is exchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceType {
    /// Any distance
    Default,
    /// Within earshot only
    Earshot,
}

impl DistanceType {
    pub fn code(&self) -> i64 {
        match self {
            DistanceType::Default => 0,
            DistanceType::Earshot => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DistanceType::Default),
            1 => Some(DistanceType::Earshot),
            _ => None,
        }
    }
}

/// Provider discovery strategy for a publish or subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryStrategy {
    Default,
    BleOnly,
    Custom {
        discovery_mode: DiscoveryMode,
        distance_type: DistanceType,
        ttl_seconds: u32,
    },
}

impl Default for DiscoveryStrategy {
    fn default() -> Self {
        DiscoveryStrategy::Default
    }
}

impl DiscoveryStrategy {
    /// Time to live the provider will apply to the operation
    pub fn ttl_seconds(&self) -> u32 {
        match self {
            DiscoveryStrategy::Custom { ttl_seconds, .. } => *ttl_seconds,
            DiscoveryStrategy::Default | DiscoveryStrategy::BleOnly => TTL_SECONDS_DEFAULT,
        }
    }
}

/// Which operation a strategy is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyUsage {
    Publish,
    Subscribe,
}

/// Strategy options as supplied by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "DEFAULT", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    #[serde(rename = "BLE_ONLY", default, skip_serializing_if = "Option::is_none")]
    pub ble_only: Option<bool>,
    #[serde(rename = "discoveryMode", default, skip_serializing_if = "Option::is_none")]
    pub discovery_mode: Option<i64>,
    #[serde(rename = "distanceType", default, skip_serializing_if = "Option::is_none")]
    pub distance_type: Option<i64>,
    #[serde(rename = "ttlSeconds", default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,
}

/// Translate client strategy options into a provider strategy.
///
/// `DEFAULT` takes precedence over `BLE_ONLY`; either flag ignores the custom
/// fields. Absent custom fields fall back to the provider defaults.
pub fn build_strategy(config: Option<&StrategyConfig>, usage: StrategyUsage) -> Result<DiscoveryStrategy> {
    let config = match config {
        Some(config) => config,
        None => return Ok(DiscoveryStrategy::Default),
    };

    if config.default.unwrap_or(false) {
        return Ok(DiscoveryStrategy::Default);
    }
    if config.ble_only.unwrap_or(false) {
        return Ok(DiscoveryStrategy::BleOnly);
    }

    let discovery_mode = match config.discovery_mode {
        Some(code) => DiscoveryMode::from_code(code).ok_or_else(|| {
            NearbyError::validation("strategy.discoveryMode", format!("unknown discovery mode {}", code))
        })?,
        None => DiscoveryMode::Default,
    };

    let distance_type = match config.distance_type {
        Some(code) => DistanceType::from_code(code).ok_or_else(|| {
            NearbyError::validation("strategy.distanceType", format!("unknown distance type {}", code))
        })?,
        None => DistanceType::Default,
    };

    let ttl_seconds = match config.ttl_seconds {
        Some(ttl) => validate_ttl(ttl, usage)?,
        None => TTL_SECONDS_DEFAULT,
    };

    Ok(DiscoveryStrategy::Custom {
        discovery_mode,
        distance_type,
        ttl_seconds,
    })
}

fn validate_ttl(ttl: i64, usage: StrategyUsage) -> Result<u32> {
    if ttl == TTL_SECONDS_INFINITE as i64 {
        return match usage {
            StrategyUsage::Subscribe => Ok(TTL_SECONDS_INFINITE),
            StrategyUsage::Publish => Err(NearbyError::validation(
                "strategy.ttlSeconds",
                "an infinite time to live is only supported for subscriptions",
            )),
        };
    }

    if ttl < 1 || ttl > TTL_SECONDS_MAX as i64 {
        return Err(NearbyError::validation(
            "strategy.ttlSeconds",
            format!("{} is outside 1..={}", ttl, TTL_SECONDS_MAX),
        ));
    }

    Ok(ttl as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_config_is_default() {
        let strategy = build_strategy(None, StrategyUsage::Publish).unwrap();
        assert_eq!(strategy, DiscoveryStrategy::Default);
    }

    #[test]
    fn test_flags_ignore_custom_fields() {
        let config = StrategyConfig {
            ble_only: Some(true),
            discovery_mode: Some(99),
            ..Default::default()
        };
        assert_eq!(
            build_strategy(Some(&config), StrategyUsage::Subscribe).unwrap(),
            DiscoveryStrategy::BleOnly
        );

        let config = StrategyConfig {
            default: Some(true),
            ble_only: Some(true),
            ..Default::default()
        };
        assert_eq!(
            build_strategy(Some(&config), StrategyUsage::Subscribe).unwrap(),
            DiscoveryStrategy::Default
        );
    }

    #[test]
    fn test_custom_fields_fall_back_to_defaults() {
        let config = StrategyConfig {
            distance_type: Some(1),
            ..Default::default()
        };
        let strategy = build_strategy(Some(&config), StrategyUsage::Publish).unwrap();

        assert_eq!(
            strategy,
            DiscoveryStrategy::Custom {
                discovery_mode: DiscoveryMode::Default,
                distance_type: DistanceType::Earshot,
                ttl_seconds: TTL_SECONDS_DEFAULT,
            }
        );
    }

    #[test]
    fn test_unknown_codes_are_rejected() {
        let config = StrategyConfig {
            discovery_mode: Some(7),
            ..Default::default()
        };
        let err = build_strategy(Some(&config), StrategyUsage::Publish).unwrap_err();
        assert!(matches!(err, NearbyError::Validation { ref field, .. } if field == "strategy.discoveryMode"));
    }

    #[test]
    fn test_infinite_ttl_only_for_subscriptions() {
        let config = StrategyConfig {
            ttl_seconds: Some(TTL_SECONDS_INFINITE as i64),
            ..Default::default()
        };

        assert!(build_strategy(Some(&config), StrategyUsage::Publish).is_err());
        let strategy = build_strategy(Some(&config), StrategyUsage::Subscribe).unwrap();
        assert_eq!(strategy.ttl_seconds(), TTL_SECONDS_INFINITE);
    }

    #[test]
    fn test_ttl_bounds() {
        for ttl in [0, -5, TTL_SECONDS_MAX as i64 + 1] {
            let config = StrategyConfig {
                ttl_seconds: Some(ttl),
                ..Default::default()
            };
            assert!(build_strategy(Some(&config), StrategyUsage::Publish).is_err(), "ttl {}", ttl);
        }
    }

    #[test]
    fn test_config_deserializes_from_client_shape() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{"discoveryMode": 1, "distanceType": 0, "ttlSeconds": 120}"#,
        )
        .unwrap();

        assert_eq!(
            build_strategy(Some(&config), StrategyUsage::Publish).unwrap(),
            DiscoveryStrategy::Custom {
                discovery_mode: DiscoveryMode::Broadcast,
                distance_type: DistanceType::Default,
                ttl_seconds: 120,
            }
        );
    }
}
