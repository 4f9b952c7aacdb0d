// Permission tracking for Nearby
// Keeps the last permission state reported by the provider

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Last known Nearby permission state of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// The user allowed the app to use Nearby
    Granted,
    /// The user denied or revoked Nearby for the app
    Denied,
    /// No report has been received yet
    Unknown,
}

impl PermissionStatus {
    pub fn from_granted(granted: bool) -> Self {
        if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

/// Tracks permission reports from initialize and provider callbacks
#[derive(Clone)]
pub struct PermissionTracker {
    status: Arc<RwLock<PermissionStatus>>,
}

impl PermissionTracker {
    pub fn new() -> Self {
        Self {
            status: Arc::new(RwLock::new(PermissionStatus::Unknown)),
        }
    }

    /// Record a permission report; returns true if the state changed
    pub async fn record(&self, granted: bool) -> bool {
        let next = PermissionStatus::from_granted(granted);
        let mut status = self.status.write().await;
        if *status == next {
            debug!("Permission state unchanged: {:?}", next);
            return false;
        }

        if next == PermissionStatus::Denied && *status == PermissionStatus::Granted {
            warn!("Nearby permission was revoked");
        } else {
            info!("Nearby permission state: {:?}", next);
        }
        *status = next;
        true
    }

    pub async fn status(&self) -> PermissionStatus {
        *self.status.read().await
    }

    /// Unknown counts as not granted
    pub async fn is_granted(&self) -> bool {
        *self.status.read().await == PermissionStatus::Granted
    }

    /// Forget any report
    pub async fn reset(&self) {
        *self.status.write().await = PermissionStatus::Unknown;
    }
}

impl Default for PermissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracker_starts_unknown() {
        let tracker = PermissionTracker::new();
        assert_eq!(tracker.status().await, PermissionStatus::Unknown);
        assert!(!tracker.is_granted().await);
    }

    #[tokio::test]
    async fn test_record_reports_changes() {
        let tracker = PermissionTracker::new();

        assert!(tracker.record(true).await);
        assert!(!tracker.record(true).await);
        assert!(tracker.is_granted().await);

        assert!(tracker.record(false).await);
        assert_eq!(tracker.status().await, PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_reset() {
        let tracker = PermissionTracker::new();
        tracker.record(true).await;
        tracker.reset().await;
        assert_eq!(tracker.status().await, PermissionStatus::Unknown);
    }
}
