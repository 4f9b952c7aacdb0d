// Message filter translation
// Builds provider message filters from the client's filter options

use crate::{NearbyError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Only this many audio bytes are sent over the audio medium.
pub const AUDIO_BYTES_MAX_SIZE: usize = 10;

const EDDYSTONE_NAMESPACE_BYTES: usize = 10;
const EDDYSTONE_INSTANCE_BYTES: usize = 6;

/// Eddystone UID beacon clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EddystoneUid {
    pub namespace: [u8; EDDYSTONE_NAMESPACE_BYTES],
    pub instance: Option<[u8; EDDYSTONE_INSTANCE_BYTES]>,
}

/// iBeacon id clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IBeaconId {
    pub proximity_uuid: Uuid,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

/// Namespaced type clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedType {
    pub namespace: String,
    pub message_type: String,
}

/// Combination of independent filter clauses
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomFilter {
    pub include_all_my_types: bool,
    pub audio_bytes: Option<usize>,
    pub eddystone_uid: Option<EddystoneUid>,
    pub ibeacon_id: Option<IBeaconId>,
    pub namespaced_type: Option<NamespacedType>,
}

impl CustomFilter {
    /// Number of clauses set on this filter
    pub fn clause_count(&self) -> usize {
        [
            self.include_all_my_types,
            self.audio_bytes.is_some(),
            self.eddystone_uid.is_some(),
            self.ibeacon_id.is_some(),
            self.namespaced_type.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Provider filter selecting which messages a subscription receives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageFilter {
    IncludeAllMyTypes,
    Custom(CustomFilter),
}

impl Default for MessageFilter {
    fn default() -> Self {
        MessageFilter::IncludeAllMyTypes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBytesConfig {
    pub num_audio_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EddystoneUidConfig {
    pub hex_namespace: String,
    #[serde(default)]
    pub hex_instance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IBeaconIdConfig {
    pub proximity_uuid: String,
    #[serde(default)]
    pub major: Option<i64>,
    #[serde(default)]
    pub minor: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespacedTypeConfig {
    pub namespace: String,
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Filter options as supplied by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "INCLUDE_ALL_MY_TYPES", default, skip_serializing_if = "Option::is_none")]
    pub include_all_my_types_constant: Option<bool>,
    #[serde(rename = "includeAllMyTypes", default, skip_serializing_if = "Option::is_none")]
    pub include_all_my_types: Option<bool>,
    #[serde(rename = "includeAudioBytes", default, skip_serializing_if = "Option::is_none")]
    pub include_audio_bytes: Option<AudioBytesConfig>,
    #[serde(rename = "includeEddystoneUids", default, skip_serializing_if = "Option::is_none")]
    pub include_eddystone_uids: Option<EddystoneUidConfig>,
    #[serde(rename = "includeIBeaconIds", default, skip_serializing_if = "Option::is_none")]
    pub include_ibeacon_ids: Option<IBeaconIdConfig>,
    #[serde(rename = "includeNamespacedType", default, skip_serializing_if = "Option::is_none")]
    pub include_namespaced_type: Option<NamespacedTypeConfig>,
}

/// Translate client filter options into a provider filter.
///
/// `INCLUDE_ALL_MY_TYPES` short-circuits every other field. Otherwise each
/// present clause is validated and added to a single custom filter.
pub fn build_filter(config: Option<&FilterConfig>) -> Result<MessageFilter> {
    let config = match config {
        Some(config) => config,
        None => return Ok(MessageFilter::IncludeAllMyTypes),
    };

    if config.include_all_my_types_constant.unwrap_or(false) {
        return Ok(MessageFilter::IncludeAllMyTypes);
    }

    let mut filter = CustomFilter {
        include_all_my_types: config.include_all_my_types.unwrap_or(false),
        ..Default::default()
    };

    if let Some(audio) = &config.include_audio_bytes {
        filter.audio_bytes = Some(audio_bytes(audio.num_audio_bytes)?);
    }

    if let Some(eddystone) = &config.include_eddystone_uids {
        filter.eddystone_uid = Some(eddystone_uid(eddystone)?);
    }

    if let Some(ibeacon) = &config.include_ibeacon_ids {
        filter.ibeacon_id = Some(ibeacon_id(ibeacon)?);
    }

    if let Some(namespaced) = &config.include_namespaced_type {
        filter.namespaced_type = Some(namespaced_type(namespaced)?);
    }

    Ok(MessageFilter::Custom(filter))
}

fn audio_bytes(num_audio_bytes: i64) -> Result<usize> {
    if num_audio_bytes < 1 {
        return Err(NearbyError::validation(
            "includeAudioBytes.numAudioBytes",
            "must be at least 1",
        ));
    }
    Ok((num_audio_bytes as usize).min(AUDIO_BYTES_MAX_SIZE))
}

fn eddystone_uid(config: &EddystoneUidConfig) -> Result<EddystoneUid> {
    let namespace = decode_hex::<EDDYSTONE_NAMESPACE_BYTES>(
        "includeEddystoneUids.hexNamespace",
        &config.hex_namespace,
    )?;

    let instance = match config.hex_instance.as_deref() {
        Some(hex_instance) if !hex_instance.is_empty() => Some(decode_hex::<EDDYSTONE_INSTANCE_BYTES>(
            "includeEddystoneUids.hexInstance",
            hex_instance,
        )?),
        _ => None,
    };

    Ok(EddystoneUid { namespace, instance })
}

fn decode_hex<const N: usize>(field: &str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value).map_err(|e| NearbyError::validation(field, e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| NearbyError::validation(field, format!("expected {} bytes, got {}", N, len)))
}

fn ibeacon_id(config: &IBeaconIdConfig) -> Result<IBeaconId> {
    let proximity_uuid = Uuid::parse_str(&config.proximity_uuid)
        .map_err(|e| NearbyError::validation("includeIBeaconIds.proximityUuid", e.to_string()))?;

    Ok(IBeaconId {
        proximity_uuid,
        major: beacon_number("includeIBeaconIds.major", config.major)?,
        minor: beacon_number("includeIBeaconIds.minor", config.minor)?,
    })
}

fn beacon_number(field: &str, value: Option<i64>) -> Result<Option<u16>> {
    value
        .map(|v| {
            u16::try_from(v).map_err(|_| NearbyError::validation(field, format!("{} is outside 0..=65535", v)))
        })
        .transpose()
}

fn namespaced_type(config: &NamespacedTypeConfig) -> Result<NamespacedType> {
    if config.namespace.is_empty() {
        return Err(NearbyError::validation(
            "includeNamespacedType.namespace",
            "must not be empty",
        ));
    }
    if config.namespace.contains('*') {
        return Err(NearbyError::validation(
            "includeNamespacedType.namespace",
            "must not contain '*'",
        ));
    }
    if config.message_type.contains('*') {
        return Err(NearbyError::validation(
            "includeNamespacedType.type",
            "must not contain '*'",
        ));
    }

    Ok(NamespacedType {
        namespace: config.namespace.clone(),
        message_type: config.message_type.clone(),
    })
}
