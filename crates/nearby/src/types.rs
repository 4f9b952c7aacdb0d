use crate::{NearbyError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The maximum content size in number of bytes.
pub const MAX_CONTENT_SIZE_BYTES: usize = 102_400;

/// The maximum length of the message type.
pub const MAX_TYPE_LENGTH: usize = 32;

/// A namespace reserved for special messages.
pub const MESSAGE_NAMESPACE_RESERVED: &str = "__reserved_namespace";

/// Reported when the advertiser did not include its transmission power.
pub const UNKNOWN_TX_POWER: i32 = i32::MIN;

/// Identifier of one publish operation, minted before the provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishId(Uuid);

impl PublishId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PublishId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PublishId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::str::FromStr for PublishId {
    type Err = NearbyError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| NearbyError::validation("id", e.to_string()))
    }
}

impl std::fmt::Display for PublishId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message shared with nearby devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(with = "base64_content")]
    content: Vec<u8>,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    namespace: String,
}

impl Message {
    /// Create a message in the app's private namespace
    pub fn new(content: impl Into<Vec<u8>>, message_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: message_type.into(),
            namespace: String::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Empty for the private namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Check the message can be handed to the provider
    pub fn validate(&self) -> Result<()> {
        if self.content.is_empty() {
            return Err(NearbyError::InvalidMessage { field: "content" });
        }
        if self.message_type.is_empty() {
            return Err(NearbyError::InvalidMessage { field: "type" });
        }
        if self.content.len() > MAX_CONTENT_SIZE_BYTES {
            return Err(NearbyError::validation(
                "message.content",
                format!(
                    "{} bytes exceeds the maximum of {}",
                    self.content.len(),
                    MAX_CONTENT_SIZE_BYTES
                ),
            ));
        }
        if self.message_type.chars().count() > MAX_TYPE_LENGTH {
            return Err(NearbyError::validation(
                "message.type",
                format!("longer than {} characters", MAX_TYPE_LENGTH),
            ));
        }
        if self.namespace == MESSAGE_NAMESPACE_RESERVED {
            return Err(NearbyError::validation(
                "message.namespace",
                "namespace is reserved",
            ));
        }
        Ok(())
    }
}

/// Properties of the BLE signal associated with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BleSignal {
    /// Received signal strength in dBm, within [-127, 127]
    pub rssi: i32,
    /// Transmission power at 1 meter in dBm, or `UNKNOWN_TX_POWER`
    pub tx_power: i32,
}

impl BleSignal {
    pub fn has_tx_power(&self) -> bool {
        self.tx_power != UNKNOWN_TX_POWER
    }
}

/// Provider's estimate of the distance to a message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub accuracy: i32,
    pub meters: f64,
}

mod base64_content {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_validation() {
        assert!(Message::new(b"hello".to_vec(), "demo").validate().is_ok());

        let err = Message::new(Vec::new(), "demo").validate().unwrap_err();
        assert_eq!(err, NearbyError::InvalidMessage { field: "content" });

        let err = Message::new(b"hello".to_vec(), "").validate().unwrap_err();
        assert_eq!(err, NearbyError::InvalidMessage { field: "type" });
    }

    #[test]
    fn test_message_bounds() {
        let oversized = Message::new(vec![0u8; MAX_CONTENT_SIZE_BYTES + 1], "demo");
        assert!(matches!(
            oversized.validate(),
            Err(NearbyError::Validation { ref field, .. }) if field == "message.content"
        ));

        let long_type = Message::new(b"x".to_vec(), "t".repeat(MAX_TYPE_LENGTH + 1));
        assert!(matches!(
            long_type.validate(),
            Err(NearbyError::Validation { ref field, .. }) if field == "message.type"
        ));

        let reserved = Message::new(b"x".to_vec(), "demo").with_namespace(MESSAGE_NAMESPACE_RESERVED);
        assert!(reserved.validate().is_err());
    }

    #[test]
    fn test_message_json_uses_base64_content() {
        let message = Message::new(b"hello".to_vec(), "demo");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["content"], "aGVsbG8=");
        assert_eq!(json["type"], "demo");
        assert_eq!(json["namespace"], "");
    }

    #[test]
    fn test_publish_ids_are_unique() {
        let a = PublishId::new();
        let b = PublishId::new();
        assert_ne!(a, b);

        let parsed: PublishId = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
        assert!("not-a-uuid".parse::<PublishId>().is_err());
    }
}
