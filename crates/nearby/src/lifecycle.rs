// Application lifecycle management for Nearby sessions
// Tracks foreground/background transitions driven by pause and resume

use crate::types::PublishId;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Application state for lifecycle management
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Application is in the foreground and active
    Foreground,
    /// Application is in the background
    Background,
}

/// What the session held when it was paused
#[derive(Debug, Clone, PartialEq)]
pub struct PausedSession {
    pub publish_ids: Vec<PublishId>,
    pub subscribed: bool,
    pub paused_at: DateTime<Utc>,
}

/// Manages application lifecycle state
#[derive(Clone)]
pub struct LifecycleManager {
    app_state: Arc<RwLock<AppState>>,
    paused: Arc<RwLock<Option<PausedSession>>>,
    pause_generation: Arc<AtomicU64>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            app_state: Arc::new(RwLock::new(AppState::Foreground)),
            paused: Arc::new(RwLock::new(None)),
            pause_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the current application state
    pub async fn get_state(&self) -> AppState {
        *self.app_state.read().await
    }

    /// Handle the session moving to background.
    ///
    /// `live_ids` are the publications still up on the provider; a repeated
    /// pause merges them into the saved state. Returns the ids not already
    /// torn down by an earlier pause.
    pub async fn on_pause(&self, live_ids: Vec<PublishId>, subscribed: bool) -> Vec<PublishId> {
        let mut paused = self.paused.write().await;
        self.pause_generation.fetch_add(1, Ordering::SeqCst);

        if paused.is_some() {
            debug!("Already paused, merging into the saved state");
        } else {
            info!("Application moving to background");
            *self.app_state.write().await = AppState::Background;
        }
        let state = paused.get_or_insert_with(|| PausedSession {
            publish_ids: Vec::new(),
            subscribed: false,
            paused_at: Utc::now(),
        });

        let fresh: Vec<PublishId> = live_ids
            .into_iter()
            .filter(|id| !state.publish_ids.contains(id))
            .collect();
        state.publish_ids.extend(fresh.iter().copied());
        state.subscribed |= subscribed;

        debug!(
            "Saved session state: {} publications, subscribed: {}",
            state.publish_ids.len(),
            state.subscribed
        );
        fresh
    }

    /// Incremented by every pause
    pub fn pause_generation(&self) -> u64 {
        self.pause_generation.load(Ordering::SeqCst)
    }

    /// Record a subscription that came up after the pause tore things down.
    ///
    /// Returns false when not paused.
    pub async fn note_subscribed(&self) -> bool {
        match self.paused.write().await.as_mut() {
            Some(state) => {
                state.subscribed = true;
                true
            }
            None => false,
        }
    }

    /// Handle the session returning to foreground.
    ///
    /// Returns what was saved by the matching pause, if any.
    pub async fn on_resume(&self) -> Option<PausedSession> {
        let paused = self.paused.write().await.take();
        *self.app_state.write().await = AppState::Foreground;

        match &paused {
            Some(state) => {
                let background = Utc::now().signed_duration_since(state.paused_at);
                info!(
                    "Application returning to foreground after {} seconds",
                    background.num_seconds()
                );
            }
            None => debug!("Resume without a prior pause"),
        }
        paused
    }

    /// Time spent in background so far
    pub async fn paused_for(&self) -> Option<Duration> {
        self.paused
            .read()
            .await
            .as_ref()
            .map(|state| Utc::now().signed_duration_since(state.paused_at))
    }

    /// Check if app is in background
    pub async fn is_background(&self) -> bool {
        *self.app_state.read().await == AppState::Background
    }

    /// Drop any saved pause state and return to foreground
    pub async fn reset(&self) {
        *self.app_state.write().await = AppState::Foreground;
        *self.paused.write().await = None;
        debug!("Cleared lifecycle state");
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
