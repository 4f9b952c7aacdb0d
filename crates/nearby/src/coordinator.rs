//! Session Coordinator - orchestrates publish and subscribe sessions.
//!
//! All registry and subscription mutations happen under one session lock,
//! which is released before every provider call. Provider callbacks are
//! consumed by a dispatcher task owned by the coordinator.

use crate::config::NearbyConfig;
use crate::dispatcher::{EventDispatcher, Notification};
use crate::filter::{build_filter, FilterConfig};
use crate::lifecycle::{AppState, LifecycleManager};
use crate::permissions::{PermissionStatus, PermissionTracker};
use crate::provider::{NearbyProvider, ProviderAdapter};
use crate::registry::PublishEntry;
use crate::session::{SessionState, SessionStatus};
use crate::strategy::{build_strategy, StrategyConfig, StrategyUsage};
use crate::types::{Message, PublishId};
use crate::{NearbyError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Options of the initialize command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOptions {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub permission_granted: bool,
}

pub struct SessionCoordinator {
    adapter: ProviderAdapter,
    config: NearbyConfig,
    session: Arc<RwLock<SessionState>>,
    permissions: PermissionTracker,
    lifecycle: LifecycleManager,
    dispatcher: EventDispatcher,
    dispatch_handle: JoinHandle<()>,
}

impl SessionCoordinator {
    /// Create a coordinator over `provider`.
    ///
    /// Must be called inside a tokio runtime; the event dispatcher task is
    /// spawned here and aborted when the coordinator is dropped.
    pub fn new(provider: Arc<dyn NearbyProvider>, config: NearbyConfig) -> Self {
        let (adapter, events) = ProviderAdapter::new(provider);
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));

        let session = Arc::new(RwLock::new(SessionState::new()));
        let permissions = PermissionTracker::new();
        let dispatcher = EventDispatcher::new(Arc::clone(&session), permissions.clone(), notifications);
        let dispatch_handle = dispatcher.clone().spawn(events);

        info!("Session coordinator created for provider: {}", adapter.provider_name());

        Self {
            adapter,
            config,
            session,
            permissions,
            lifecycle: LifecycleManager::new(),
            dispatcher,
            dispatch_handle,
        }
    }

    /// Listen for client notifications
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.dispatcher.subscribe()
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.read().await.initialized
    }

    pub async fn lifecycle_state(&self) -> AppState {
        self.lifecycle.get_state().await
    }

    pub async fn permission_status(&self) -> PermissionStatus {
        self.permissions.status().await
    }

    pub(crate) async fn ensure_initialized(&self) -> Result<()> {
        if self.session.read().await.initialized {
            Ok(())
        } else {
            Err(NearbyError::NotInitialized)
        }
    }

    /// Connect the provider and seed the permission state
    pub async fn initialize(&self, options: InitializeOptions) -> Result<InitializeResult> {
        info!("Initializing Nearby Messages");

        if !self.adapter.is_available() {
            return Err(NearbyError::UnsupportedEnvironment);
        }

        {
            let mut session = self.session.write().await;
            if session.initialized {
                return Err(NearbyError::AlreadyInitialized);
            }
            session.initialized = true;
        }

        let connect = self.config.connect_options(options.api_key);
        if let Err(e) = self.adapter.connect(&connect).await {
            self.session.write().await.initialized = false;
            return Err(e);
        }

        let permission_granted = match self.adapter.permission_granted().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Failed to query Nearby permission: {}", e);
                false
            }
        };
        self.permissions.record(permission_granted).await;

        info!("Nearby Messages initialized, permission granted: {}", permission_granted);
        Ok(InitializeResult { permission_granted })
    }

    /// Publish a message and return its id.
    ///
    /// The id is minted before the provider call. If the provider reports
    /// its expiry before the publish resolves, the id is returned but never
    /// enters the registry.
    pub async fn publish(&self, message: Message, strategy: Option<&StrategyConfig>) -> Result<PublishId> {
        self.ensure_initialized().await?;
        message.validate()?;
        let strategy = build_strategy(strategy, StrategyUsage::Publish)?;

        let id = PublishId::new();
        self.session.write().await.registry.begin(id);
        info!("Publishing message {} of type '{}'", id, message.message_type());

        let handle = match self.adapter.publish(id, &message, strategy).await {
            Ok(handle) => handle,
            Err(e) => {
                self.session.write().await.registry.abandon(&id);
                return Err(e);
            }
        };

        let confirmed = self.session.write().await.registry.confirm(PublishEntry {
            id,
            message,
            strategy,
            handle: handle.clone(),
        });
        if !confirmed {
            // Already reported through onPublishExpired
            if let Err(e) = self.adapter.unpublish(&handle).await {
                debug!("Unpublish of expired publish {} failed: {}", id, e);
            }
        }

        Ok(id)
    }

    /// Unpublish one message, or every message when `id` is None
    pub async fn unpublish(&self, id: Option<PublishId>) -> Result<()> {
        self.ensure_initialized().await?;

        let targets = {
            let session = self.session.read().await;
            match id {
                Some(id) => vec![session
                    .registry
                    .get(&id)
                    .cloned()
                    .ok_or(NearbyError::MessageNotFound(id))?],
                None => session.registry.all(),
            }
        };

        info!("Unpublishing {} messages", targets.len());
        for entry in targets {
            if let Err(e) = self.adapter.unpublish(&entry.handle).await {
                warn!("Provider unpublish of {} failed: {}", entry.id, e);
            }
            self.session.write().await.registry.remove(&entry.id);
        }

        Ok(())
    }

    /// Subscribe with new options, replacing any previous ones
    pub async fn subscribe(
        &self,
        strategy: Option<&StrategyConfig>,
        filter: Option<&FilterConfig>,
    ) -> Result<()> {
        self.ensure_initialized().await?;
        let strategy = build_strategy(strategy, StrategyUsage::Subscribe)?;
        let filter = build_filter(filter)?;

        let (token, pause_generation) = {
            let mut session = self.session.write().await;
            session.subscription.set(strategy, filter.clone());
            (session.subscription.next_token(), self.lifecycle.pause_generation())
        };
        info!("Subscribing with token {}", token);

        let outcome = self.adapter.subscribe(token, strategy, filter).await;

        let mut session = self.session.write().await;
        if !session.subscription.is_current(token) {
            debug!("Subscribe {} superseded before it completed", token);
            return outcome;
        }
        if outcome.is_err() {
            session.subscription.clear();
            return outcome;
        }

        let paused_meanwhile = self.lifecycle.pause_generation() != pause_generation
            && self.lifecycle.is_background().await;
        if !paused_meanwhile {
            session.subscription.mark_active(true);
            return outcome;
        }

        // Left inactive so resume re-subscribes
        self.lifecycle.note_subscribed().await;
        drop(session);
        debug!("Session paused while subscribe {} was in flight", token);
        if let Err(e) = self.adapter.unsubscribe().await {
            warn!("Provider unsubscribe failed during pause: {}", e);
        }
        outcome
    }

    /// Cancel the subscription; provider failures are only logged
    pub async fn unsubscribe(&self) -> Result<()> {
        self.ensure_initialized().await?;
        info!("Unsubscribing");

        if let Err(e) = self.adapter.unsubscribe().await {
            warn!("Provider unsubscribe failed: {}", e);
        }
        self.session.write().await.subscription.clear();

        Ok(())
    }

    /// Tear down provider operations, keeping their state for resume.
    ///
    /// A repeated pause tears down whatever was published or subscribed
    /// since the previous one.
    pub async fn pause(&self) -> Result<()> {
        self.ensure_initialized().await?;

        let (entries, subscribed) = {
            let mut session = self.session.write().await;
            let subscribed = session.subscription.is_active();
            let fresh = self.lifecycle.on_pause(session.registry.ids(), subscribed).await;
            if subscribed {
                session.subscription.mark_active(false);
            }
            let entries: Vec<PublishEntry> = fresh
                .iter()
                .filter_map(|id| session.registry.get(id).cloned())
                .collect();
            (entries, subscribed)
        };

        for entry in &entries {
            if let Err(e) = self.adapter.unpublish(&entry.handle).await {
                warn!("Provider unpublish of {} failed during pause: {}", entry.id, e);
            }
        }

        if subscribed {
            if let Err(e) = self.adapter.unsubscribe().await {
                warn!("Provider unsubscribe failed during pause: {}", e);
            }
        }

        info!("Paused {} publications, subscribed: {}", entries.len(), subscribed);
        Ok(())
    }

    /// Re-issue what the last pause tore down.
    ///
    /// Every re-issue is awaited. A failed re-publish drops the entry and
    /// emits onPublishExpired; a failed re-subscribe drops the subscription
    /// and emits onSubscribeExpired.
    pub async fn resume(&self) -> Result<()> {
        self.ensure_initialized().await?;

        let paused = match self.lifecycle.on_resume().await {
            Some(paused) => paused,
            None => return Ok(()),
        };

        for id in paused.publish_ids {
            let entry = match self.session.read().await.registry.get(&id).cloned() {
                Some(entry) => entry,
                None => {
                    debug!("Publish {} was removed while paused", id);
                    continue;
                }
            };

            match self.adapter.publish(id, &entry.message, entry.strategy).await {
                Ok(handle) => {
                    let orphan = {
                        let mut session = self.session.write().await;
                        match session.registry.get_mut(&id) {
                            Some(current) => {
                                current.handle = handle;
                                None
                            }
                            None => Some(handle),
                        }
                    };
                    if let Some(handle) = orphan {
                        debug!("Publish {} was removed during resume", id);
                        if let Err(e) = self.adapter.unpublish(&handle).await {
                            warn!("Provider unpublish of {} failed: {}", id, e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Re-publishing {} failed: {}", id, e);
                    if self.session.write().await.registry.remove(&id).is_some() {
                        self.dispatcher.notify(Notification::PublishExpired { id });
                    }
                }
            }
        }

        if paused.subscribed {
            let retained = {
                let mut session = self.session.write().await;
                match session.subscription.retained() {
                    Some(state) => Some((state, session.subscription.next_token())),
                    None => None,
                }
            };

            if let Some((state, token)) = retained {
                let outcome = self.adapter.subscribe(token, state.strategy, state.filter).await;
                let mut session = self.session.write().await;
                if session.subscription.is_current(token) {
                    match outcome {
                        Ok(()) => session.subscription.mark_active(true),
                        Err(e) => {
                            warn!("Re-subscribing failed: {}", e);
                            session.subscription.clear();
                            drop(session);
                            self.dispatcher.notify(Notification::SubscribeExpired);
                        }
                    }
                }
            }
        }

        info!("Resumed session");
        Ok(())
    }

    /// Current session snapshot; allowed before initialize
    pub async fn status(&self) -> SessionStatus {
        self.session.read().await.status()
    }

    /// Unsubscribe and unpublish everything, emitting expiry notifications
    pub async fn reset(&self) -> Result<()> {
        self.ensure_initialized().await?;

        let (entries, pending, had_subscription) = {
            let mut session = self.session.write().await;
            let entries = session.registry.clear();
            let pending = session.registry.expire_pending();
            let had_subscription = session.subscription.clear().is_some();
            (entries, pending, had_subscription)
        };
        self.lifecycle.reset().await;

        info!(
            "Resetting session: {} publications, {} pending, subscribed: {}",
            entries.len(),
            pending.len(),
            had_subscription
        );

        if had_subscription {
            if let Err(e) = self.adapter.unsubscribe().await {
                warn!("Provider unsubscribe failed during reset: {}", e);
            }
            self.dispatcher.notify(Notification::SubscribeExpired);
        }

        for entry in entries {
            if let Err(e) = self.adapter.unpublish(&entry.handle).await {
                warn!("Provider unpublish of {} failed during reset: {}", entry.id, e);
            }
            self.dispatcher.notify(Notification::PublishExpired { id: entry.id });
        }
        for id in pending {
            self.dispatcher.notify(Notification::PublishExpired { id });
        }

        Ok(())
    }

    /// Last known permission state
    pub async fn is_granted(&self) -> Result<bool> {
        self.ensure_initialized().await?;
        Ok(self.permissions.is_granted().await)
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.dispatch_handle.abort();
    }
}
