// Event Dispatcher - turns provider callbacks into client notifications

use crate::permissions::PermissionTracker;
use crate::provider::ProviderEvent;
use crate::session::SessionState;
use crate::types::{BleSignal, Distance, Message, PublishId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Client-facing notification, tagged by its listener name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Notification {
    #[serde(rename = "onPermissionChanged")]
    PermissionChanged { granted: bool },

    #[serde(rename = "onFound")]
    Found { message: Message },

    #[serde(rename = "onLost")]
    Lost { message: Message },

    #[serde(rename = "onBleSignalChanged")]
    BleSignalChanged {
        message: Message,
        #[serde(rename = "bleSignal")]
        ble_signal: BleSignal,
    },

    #[serde(rename = "onDistanceChanged")]
    DistanceChanged { message: Message, distance: Distance },

    #[serde(rename = "onPublishExpired")]
    PublishExpired { id: PublishId },

    #[serde(rename = "onSubscribeExpired")]
    SubscribeExpired,
}

impl Notification {
    /// Listener name the notification is delivered to
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::PermissionChanged { .. } => "onPermissionChanged",
            Notification::Found { .. } => "onFound",
            Notification::Lost { .. } => "onLost",
            Notification::BleSignalChanged { .. } => "onBleSignalChanged",
            Notification::DistanceChanged { .. } => "onDistanceChanged",
            Notification::PublishExpired { .. } => "onPublishExpired",
            Notification::SubscribeExpired => "onSubscribeExpired",
        }
    }
}

/// Routes provider events to the notification channel.
///
/// Expiries and permission changes update coordinator state before the
/// notification goes out.
#[derive(Clone)]
pub struct EventDispatcher {
    session: Arc<RwLock<SessionState>>,
    permissions: PermissionTracker,
    notifications: broadcast::Sender<Notification>,
}

impl EventDispatcher {
    pub fn new(
        session: Arc<RwLock<SessionState>>,
        permissions: PermissionTracker,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            session,
            permissions,
            notifications,
        }
    }

    /// Consume provider events until the channel closes
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<ProviderEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.dispatch(event).await;
            }
            debug!("Provider event channel closed, dispatcher stopping");
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Send without waiting; having no listeners is fine
    pub fn notify(&self, notification: Notification) {
        let name = notification.event_name();
        match self.notifications.send(notification) {
            Ok(receivers) => debug!("Delivered {} to {} listeners", name, receivers),
            Err(_) => debug!("No listeners for {}", name),
        }
    }

    pub async fn dispatch(&self, event: ProviderEvent) {
        debug!("Dispatching provider event: {}", event.kind());

        let notification = match event {
            ProviderEvent::Found(message) => Notification::Found { message },
            ProviderEvent::Lost(message) => Notification::Lost { message },
            ProviderEvent::BleSignalChanged(message, ble_signal) => {
                Notification::BleSignalChanged { message, ble_signal }
            }
            ProviderEvent::DistanceChanged(message, distance) => {
                Notification::DistanceChanged { message, distance }
            }
            ProviderEvent::PublishExpired(id) => {
                let known = self.session.write().await.registry.expire(&id);
                if !known {
                    debug!("Ignoring expiry of unknown publish {}", id);
                    return;
                }
                info!("Publish {} expired", id);
                Notification::PublishExpired { id }
            }
            ProviderEvent::SubscribeExpired(token) => {
                let mut session = self.session.write().await;
                if !session.subscription.is_current(token) || session.subscription.get().is_none() {
                    debug!("Ignoring stale subscription expiry {}", token);
                    return;
                }
                session.subscription.clear();
                drop(session);
                info!("Subscription {} expired", token);
                Notification::SubscribeExpired
            }
            ProviderEvent::PermissionChanged(granted) => {
                self.permissions.record(granted).await;
                Notification::PermissionChanged { granted }
            }
        };

        self.notify(notification);
    }
}
