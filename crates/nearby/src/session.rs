// Session state - the single consistency boundary of the coordinator

use crate::registry::PublishRegistry;
use crate::subscription::SubscriptionController;
use crate::types::PublishId;
use serde::{Deserialize, Serialize};

/// Everything the coordinator mutates under its session lock
#[derive(Debug, Default)]
pub struct SessionState {
    pub initialized: bool,
    pub registry: PublishRegistry,
    pub subscription: SubscriptionController,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            is_publishing: !self.registry.is_empty(),
            is_subscribing: self.subscription.is_active(),
            ids: self.registry.ids(),
        }
    }
}

/// Snapshot returned by the status command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_publishing: bool,
    pub is_subscribing: bool,
    pub ids: Vec<PublishId>,
}
