// In-process loopback provider
// Records every call, lets callers script failures and deliver callbacks

use super::{
    ConnectOptions, EventSink, NearbyProvider, ProviderError, ProviderResult,
    PublishHandle, PublishRequest, SubscribeRequest, SubscriptionToken,
};
use crate::types::{BleSignal, Distance, Message, PublishId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// One call received by an [`InMemoryProvider`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Connect(ConnectOptions),
    Publish { id: PublishId, message: Message },
    Unpublish(PublishHandle),
    Subscribe(SubscriptionToken),
    Unsubscribe,
}

#[derive(Default)]
struct MemoryState {
    sink: Option<EventSink>,
    calls: Vec<ProviderCall>,
    publications: HashMap<PublishHandle, PublishRequest>,
    subscription: Option<SubscribeRequest>,
    publish_failures: VecDeque<ProviderError>,
    subscribe_failures: VecDeque<ProviderError>,
    unpublish_failure: Option<ProviderError>,
    unsubscribe_failure: Option<ProviderError>,
    connect_failure: Option<ProviderError>,
}

/// Provider that keeps publications and the subscription in memory
pub struct InMemoryProvider {
    available: bool,
    permission: Mutex<bool>,
    state: Mutex<MemoryState>,
    next_handle: AtomicU64,
    publish_gate: watch::Sender<bool>,
    subscribe_gate: watch::Sender<bool>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        let (publish_gate, _) = watch::channel(true);
        let (subscribe_gate, _) = watch::channel(true);
        Self {
            available: true,
            permission: Mutex::new(true),
            state: Mutex::new(MemoryState::default()),
            next_handle: AtomicU64::new(1),
            publish_gate,
            subscribe_gate,
        }
    }

    /// A provider whose engine cannot run on this device
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_sink(&self, kind: &str, deliver: impl FnOnce(&EventSink) -> bool) -> bool {
        let sink = self.state().sink.clone();
        match sink {
            Some(sink) => deliver(&sink),
            None => {
                debug!("Dropping {} event, no sink attached", kind);
                false
            }
        }
    }

    /// Fail the next publish call with this error
    pub fn fail_next_publish(&self, error: ProviderError) {
        self.state().publish_failures.push_back(error);
    }

    /// Fail the next subscribe call with this error
    pub fn fail_next_subscribe(&self, error: ProviderError) {
        self.state().subscribe_failures.push_back(error);
    }

    pub fn fail_next_unpublish(&self, error: ProviderError) {
        self.state().unpublish_failure = Some(error);
    }

    pub fn fail_next_unsubscribe(&self, error: ProviderError) {
        self.state().unsubscribe_failure = Some(error);
    }

    pub fn fail_next_connect(&self, error: ProviderError) {
        self.state().connect_failure = Some(error);
    }

    /// Hold every publish call until [`release_publishes`](Self::release_publishes)
    pub fn hold_publishes(&self) {
        self.publish_gate.send_replace(false);
    }

    pub fn release_publishes(&self) {
        self.publish_gate.send_replace(true);
    }

    /// Hold every subscribe call until [`release_subscribes`](Self::release_subscribes)
    pub fn hold_subscribes(&self) {
        self.subscribe_gate.send_replace(false);
    }

    pub fn release_subscribes(&self) {
        self.subscribe_gate.send_replace(true);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Ids of every publish call received, in order
    pub fn published_ids(&self) -> Vec<PublishId> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::Publish { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Number of publications currently live on the provider side
    pub fn active_publications(&self) -> usize {
        self.state().publications.len()
    }

    pub fn has_subscription(&self) -> bool {
        self.state().subscription.is_some()
    }

    pub fn current_subscription(&self) -> Option<SubscribeRequest> {
        self.state().subscription.clone()
    }

    pub fn deliver_found(&self, message: Message) -> bool {
        self.with_sink("found", |sink| sink.found(message))
    }

    pub fn deliver_lost(&self, message: Message) -> bool {
        self.with_sink("lost", |sink| sink.lost(message))
    }

    pub fn deliver_ble_signal(&self, message: Message, signal: BleSignal) -> bool {
        self.with_sink("ble_signal_changed", |sink| sink.ble_signal_changed(message, signal))
    }

    pub fn deliver_distance(&self, message: Message, distance: Distance) -> bool {
        self.with_sink("distance_changed", |sink| sink.distance_changed(message, distance))
    }

    /// Drop the publication for `id` and report its expiry
    pub fn expire_publication(&self, id: PublishId) -> bool {
        self.state().publications.retain(|_, request| request.id != id);
        self.with_sink("publish_expired", |sink| sink.publish_expired(id))
    }

    /// Drop the current subscription and report its expiry
    pub fn expire_subscription(&self) -> bool {
        let subscription = self.state().subscription.take();
        match subscription {
            Some(request) => self.expire_subscription_token(request.token),
            None => false,
        }
    }

    /// Report an expiry for an arbitrary subscription generation
    pub fn expire_subscription_token(&self, token: SubscriptionToken) -> bool {
        self.with_sink("subscribe_expired", |sink| sink.subscribe_expired(token))
    }

    pub fn set_permission(&self, granted: bool) -> bool {
        *self.permission.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = granted;
        self.with_sink("permission_changed", |sink| sink.permission_changed(granted))
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NearbyProvider for InMemoryProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn attach(&self, sink: EventSink) {
        self.state().sink = Some(sink);
    }

    async fn connect(&self, options: &ConnectOptions) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Connect(options.clone()));
        match state.connect_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn publish(&self, request: PublishRequest) -> ProviderResult<PublishHandle> {
        self.state().calls.push(ProviderCall::Publish {
            id: request.id,
            message: request.message.clone(),
        });

        let mut gate = self.publish_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(ProviderError::new("Provider shut down"));
        }

        let mut state = self.state();
        if let Some(error) = state.publish_failures.pop_front() {
            return Err(error);
        }

        let handle = PublishHandle::new(format!(
            "pub-{}",
            self.next_handle.fetch_add(1, Ordering::SeqCst)
        ));
        state.publications.insert(handle.clone(), request);
        Ok(handle)
    }

    async fn unpublish(&self, handle: &PublishHandle) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Unpublish(handle.clone()));
        state.publications.remove(handle);
        match state.unpublish_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn subscribe(&self, request: SubscribeRequest) -> ProviderResult<()> {
        self.state().calls.push(ProviderCall::Subscribe(request.token));

        let mut gate = self.subscribe_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(ProviderError::new("Provider shut down"));
        }

        let mut state = self.state();
        if let Some(error) = state.subscribe_failures.pop_front() {
            return Err(error);
        }
        state.subscription = Some(request);
        Ok(())
    }

    async fn unsubscribe(&self) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(ProviderCall::Unsubscribe);
        state.subscription = None;
        match state.unsubscribe_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn permission_granted(&self) -> ProviderResult<bool> {
        Ok(*self.permission.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn provider_name(&self) -> &str {
        "in-memory"
    }
}
