//! Boundary to the external proximity discovery engine.
//!
//! The engine is consumed through [`NearbyProvider`]. Its asynchronous
//! callbacks (found, lost, signal and distance changes, expiries, permission
//! changes) are delivered as [`ProviderEvent`] values through the
//! [`EventSink`] handed to it by [`ProviderAdapter`].

mod adapter;
pub mod memory;

pub use adapter::ProviderAdapter;
pub use memory::{InMemoryProvider, ProviderCall};

use crate::filter::MessageFilter;
use crate::strategy::DiscoveryStrategy;
use crate::types::{BleSignal, Distance, Message, PublishId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Nearby Messages status codes a provider may attach to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderStatusCode {
    TooManyPendingIntents,
    AppNotOptedIn,
    DisallowedCallingContext,
    AppQuotaLimitReached,
    NotAuthorized,
    Forbidden,
    MissingPermissions,
    BluetoothOff,
    BleAdvertisingUnsupported,
    BleScanningUnsupported,
}

impl ProviderStatusCode {
    pub fn code(&self) -> i32 {
        match self {
            ProviderStatusCode::TooManyPendingIntents => 2801,
            ProviderStatusCode::AppNotOptedIn => 2802,
            ProviderStatusCode::DisallowedCallingContext => 2803,
            ProviderStatusCode::AppQuotaLimitReached => 2804,
            ProviderStatusCode::NotAuthorized => 2805,
            ProviderStatusCode::Forbidden => 2806,
            ProviderStatusCode::MissingPermissions => 2807,
            ProviderStatusCode::BluetoothOff => 2820,
            ProviderStatusCode::BleAdvertisingUnsupported => 2821,
            ProviderStatusCode::BleScanningUnsupported => 2822,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            2801 => Some(ProviderStatusCode::TooManyPendingIntents),
            2802 => Some(ProviderStatusCode::AppNotOptedIn),
            2803 => Some(ProviderStatusCode::DisallowedCallingContext),
            2804 => Some(ProviderStatusCode::AppQuotaLimitReached),
            2805 => Some(ProviderStatusCode::NotAuthorized),
            2806 => Some(ProviderStatusCode::Forbidden),
            2807 => Some(ProviderStatusCode::MissingPermissions),
            2820 => Some(ProviderStatusCode::BluetoothOff),
            2821 => Some(ProviderStatusCode::BleAdvertisingUnsupported),
            2822 => Some(ProviderStatusCode::BleScanningUnsupported),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProviderStatusCode::TooManyPendingIntents => "Too many pending subscriptions",
            ProviderStatusCode::AppNotOptedIn => "Nearby permission has not been granted",
            ProviderStatusCode::DisallowedCallingContext => "Operation issued from a disallowed context",
            ProviderStatusCode::AppQuotaLimitReached => "Nearby quota limit reached",
            ProviderStatusCode::NotAuthorized => "Not authorized to use Nearby",
            ProviderStatusCode::Forbidden => "Request forbidden",
            ProviderStatusCode::MissingPermissions => "Missing permissions",
            ProviderStatusCode::BluetoothOff => "Bluetooth is off",
            ProviderStatusCode::BleAdvertisingUnsupported => "BLE advertising is not supported",
            ProviderStatusCode::BleScanningUnsupported => "BLE scanning is not supported",
        }
    }

    pub fn is_permission_related(&self) -> bool {
        matches!(
            self,
            ProviderStatusCode::AppNotOptedIn
                | ProviderStatusCode::NotAuthorized
                | ProviderStatusCode::MissingPermissions
        )
    }
}

/// Scope of permissions Nearby asks for at connection time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NearbyPermissions {
    #[default]
    Default,
    None,
    Microphone,
    Ble,
    Bluetooth,
}

impl NearbyPermissions {
    pub fn code(&self) -> i32 {
        match self {
            NearbyPermissions::Default => -1,
            NearbyPermissions::None => 0,
            NearbyPermissions::Microphone => 1,
            NearbyPermissions::Ble => 2,
            NearbyPermissions::Bluetooth => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(NearbyPermissions::Default),
            0 => Some(NearbyPermissions::None),
            1 => Some(NearbyPermissions::Microphone),
            2 => Some(NearbyPermissions::Ble),
            6 => Some(NearbyPermissions::Bluetooth),
            _ => None,
        }
    }
}

/// Options the provider is connected with on initialize
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectOptions {
    pub api_key: Option<String>,
    pub permissions: NearbyPermissions,
}

/// Failure reported by the provider, message kept verbatim
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<ProviderStatusCode>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: ProviderStatusCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Provider-side handle of one publication
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublishHandle(String);

impl PublishHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublishHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation stamp of one provider subscribe call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Arguments of a provider publish call.
///
/// The id lets the provider tag the expiry callback of this publication.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub id: PublishId,
    pub message: Message,
    pub strategy: DiscoveryStrategy,
}

/// Arguments of a provider subscribe call
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub token: SubscriptionToken,
    pub strategy: DiscoveryStrategy,
    pub filter: MessageFilter,
}

/// Callback slots of the provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Found(Message),
    Lost(Message),
    BleSignalChanged(Message, BleSignal),
    DistanceChanged(Message, Distance),
    PublishExpired(PublishId),
    SubscribeExpired(SubscriptionToken),
    PermissionChanged(bool),
}

impl ProviderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderEvent::Found(_) => "found",
            ProviderEvent::Lost(_) => "lost",
            ProviderEvent::BleSignalChanged(..) => "ble_signal_changed",
            ProviderEvent::DistanceChanged(..) => "distance_changed",
            ProviderEvent::PublishExpired(_) => "publish_expired",
            ProviderEvent::SubscribeExpired(_) => "subscribe_expired",
            ProviderEvent::PermissionChanged(_) => "permission_changed",
        }
    }
}

/// Where the provider delivers its callbacks, from any thread
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<ProviderEvent>,
}

impl EventSink {
    pub(crate) fn new(sender: mpsc::UnboundedSender<ProviderEvent>) -> Self {
        Self { sender }
    }

    /// Deliver an event; returns false once the session is gone
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn found(&self, message: Message) -> bool {
        self.emit(ProviderEvent::Found(message))
    }

    pub fn lost(&self, message: Message) -> bool {
        self.emit(ProviderEvent::Lost(message))
    }

    pub fn ble_signal_changed(&self, message: Message, signal: BleSignal) -> bool {
        self.emit(ProviderEvent::BleSignalChanged(message, signal))
    }

    pub fn distance_changed(&self, message: Message, distance: Distance) -> bool {
        self.emit(ProviderEvent::DistanceChanged(message, distance))
    }

    pub fn publish_expired(&self, id: PublishId) -> bool {
        self.emit(ProviderEvent::PublishExpired(id))
    }

    pub fn subscribe_expired(&self, token: SubscriptionToken) -> bool {
        self.emit(ProviderEvent::SubscribeExpired(token))
    }

    pub fn permission_changed(&self, granted: bool) -> bool {
        self.emit(ProviderEvent::PermissionChanged(granted))
    }
}

/// The external proximity discovery and transport engine
#[async_trait]
pub trait NearbyProvider: Send + Sync {
    /// Whether the engine can run on this device
    fn is_available(&self) -> bool;

    /// Register the sink that receives every callback of this provider
    fn attach(&self, sink: EventSink);

    /// Bind the engine to the app's credentials and permission scope
    async fn connect(&self, options: &ConnectOptions) -> ProviderResult<()>;

    /// Publish a message; resolves once the provider accepted it
    async fn publish(&self, request: PublishRequest) -> ProviderResult<PublishHandle>;

    /// Cancel an existing publication
    async fn unpublish(&self, handle: &PublishHandle) -> ProviderResult<()>;

    /// Register the message listener with the given options
    async fn subscribe(&self, request: SubscribeRequest) -> ProviderResult<()>;

    /// Cancel the current subscription
    async fn unsubscribe(&self) -> ProviderResult<()>;

    /// Whether Nearby permission is currently granted for the app
    async fn permission_granted(&self) -> ProviderResult<bool>;

    /// Get the provider name
    fn provider_name(&self) -> &str {
        "nearby"
    }
}
