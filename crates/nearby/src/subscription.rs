// Subscription Controller - state of the single message subscription

use crate::filter::MessageFilter;
use crate::provider::SubscriptionToken;
use crate::strategy::DiscoveryStrategy;

/// Options and activity of the current subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub active: bool,
    pub strategy: DiscoveryStrategy,
    pub filter: MessageFilter,
}

/// Holds at most one subscription and the token of the latest subscribe
#[derive(Debug, Default)]
pub struct SubscriptionController {
    state: Option<SubscriptionState>,
    generation: u64,
}

impl SubscriptionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store new options, inactive until the provider confirms.
    ///
    /// Replaces any previous options without tearing down the old provider
    /// subscription.
    pub fn set(&mut self, strategy: DiscoveryStrategy, filter: MessageFilter) {
        self.state = Some(SubscriptionState {
            active: false,
            strategy,
            filter,
        });
    }

    pub fn get(&self) -> Option<SubscriptionState> {
        self.state.clone()
    }

    /// No-op when nothing is stored
    pub fn mark_active(&mut self, active: bool) {
        if let Some(state) = self.state.as_mut() {
            state.active = active;
        }
    }

    pub fn clear(&mut self) -> Option<SubscriptionState> {
        self.state.take()
    }

    pub fn is_active(&self) -> bool {
        self.state.as_ref().map(|state| state.active).unwrap_or(false)
    }

    /// Options kept across a pause, waiting to be re-subscribed
    pub fn retained(&self) -> Option<SubscriptionState> {
        self.state.as_ref().filter(|state| !state.active).cloned()
    }

    /// Stamp a new provider subscribe call
    pub fn next_token(&mut self) -> SubscriptionToken {
        self.generation += 1;
        SubscriptionToken::new(self.generation)
    }

    pub fn current_token(&self) -> Option<SubscriptionToken> {
        if self.generation == 0 {
            None
        } else {
            Some(SubscriptionToken::new(self.generation))
        }
    }

    pub fn is_current(&self, token: SubscriptionToken) -> bool {
        token.generation() == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_activate() {
        let mut controller = SubscriptionController::new();
        assert!(controller.get().is_none());
        assert!(!controller.is_active());

        controller.set(DiscoveryStrategy::BleOnly, MessageFilter::IncludeAllMyTypes);
        assert!(!controller.is_active());
        assert!(controller.retained().is_some());

        controller.mark_active(true);
        assert!(controller.is_active());
        assert!(controller.retained().is_none());
        assert_eq!(controller.get().unwrap().strategy, DiscoveryStrategy::BleOnly);
    }

    #[test]
    fn test_mark_active_without_state_is_noop() {
        let mut controller = SubscriptionController::new();
        controller.mark_active(true);
        assert!(!controller.is_active());
        assert!(controller.get().is_none());
    }

    #[test]
    fn test_tokens_identify_latest_subscribe() {
        let mut controller = SubscriptionController::new();
        assert_eq!(controller.current_token(), None);

        let first = controller.next_token();
        let second = controller.next_token();

        assert!(first < second);
        assert!(!controller.is_current(first));
        assert!(controller.is_current(second));
        assert_eq!(controller.current_token(), Some(second));
    }

    #[test]
    fn test_clear() {
        let mut controller = SubscriptionController::new();
        controller.set(DiscoveryStrategy::Default, MessageFilter::IncludeAllMyTypes);
        controller.mark_active(true);

        assert!(controller.clear().is_some());
        assert!(!controller.is_active());
        assert!(controller.retained().is_none());
    }
}
