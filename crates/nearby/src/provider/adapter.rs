use super::{
    ConnectOptions, EventSink, NearbyProvider, ProviderError, ProviderEvent, PublishHandle, PublishRequest,
    SubscribeRequest, SubscriptionToken,
};
use crate::filter::MessageFilter;
use crate::strategy::DiscoveryStrategy;
use crate::types::{Message, PublishId};
use crate::{NearbyError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

impl From<ProviderError> for NearbyError {
    fn from(err: ProviderError) -> Self {
        NearbyError::Provider {
            code: err.code,
            message: err.message,
        }
    }
}

/// Uniform async-result wrapper around a [`NearbyProvider`]
#[derive(Clone)]
pub struct ProviderAdapter {
    provider: Arc<dyn NearbyProvider>,
}

impl ProviderAdapter {
    /// Wrap a provider and attach a fresh event channel to it
    pub fn new(provider: Arc<dyn NearbyProvider>) -> (Self, mpsc::UnboundedReceiver<ProviderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        provider.attach(EventSink::new(tx));
        debug!("Attached event sink to provider: {}", provider.provider_name());
        (Self { provider }, rx)
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub async fn connect(&self, options: &ConnectOptions) -> Result<()> {
        Ok(self.provider.connect(options).await?)
    }

    pub async fn publish(
        &self,
        id: PublishId,
        message: &Message,
        strategy: DiscoveryStrategy,
    ) -> Result<PublishHandle> {
        let request = PublishRequest {
            id,
            message: message.clone(),
            strategy,
        };
        Ok(self.provider.publish(request).await?)
    }

    pub async fn unpublish(&self, handle: &PublishHandle) -> Result<()> {
        Ok(self.provider.unpublish(handle).await?)
    }

    pub async fn subscribe(
        &self,
        token: SubscriptionToken,
        strategy: DiscoveryStrategy,
        filter: MessageFilter,
    ) -> Result<()> {
        let request = SubscribeRequest {
            token,
            strategy,
            filter,
        };
        Ok(self.provider.subscribe(request).await?)
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        Ok(self.provider.unsubscribe().await?)
    }

    pub async fn permission_granted(&self) -> Result<bool> {
        Ok(self.provider.permission_granted().await?)
    }
}
