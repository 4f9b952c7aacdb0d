// Plugin command boundary
// JSON call surface over the session coordinator

use crate::config::NearbyConfig;
use crate::coordinator::{InitializeOptions, SessionCoordinator};
use crate::dispatcher::Notification;
use crate::error::ErrorContext;
use crate::filter::FilterConfig;
use crate::provider::NearbyProvider;
use crate::strategy::StrategyConfig;
use crate::types::{Message, PublishId};
use crate::{NearbyError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

/// Failure returned across the command boundary
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CallError {
    /// Error category, or `unimplemented` for unknown methods
    pub code: String,
    pub message: String,
}

impl From<&NearbyError> for CallError {
    /// Provider failures carry the provider's reason unchanged
    fn from(err: &NearbyError) -> Self {
        let message = match err {
            NearbyError::Provider { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            code: err.category().to_string(),
            message,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MessageArgs {
    content: Option<String>,
    #[serde(rename = "type")]
    message_type: Option<String>,
    namespace: Option<String>,
}

impl MessageArgs {
    fn into_message(self) -> Result<Message> {
        let content = match self.content {
            Some(content) if !content.is_empty() => STANDARD
                .decode(content.as_bytes())
                .map_err(|e| NearbyError::validation("message.content", format!("invalid base64: {}", e)))?,
            _ => return Err(NearbyError::InvalidMessage { field: "content" }),
        };
        let message_type = match self.message_type {
            Some(message_type) if !message_type.is_empty() => message_type,
            _ => return Err(NearbyError::InvalidMessage { field: "type" }),
        };

        let message = Message::new(content, message_type);
        Ok(match self.namespace {
            Some(namespace) => message.with_namespace(namespace),
            None => message,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct PublishOptions {
    strategy: Option<StrategyConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct PublishArgs {
    message: Option<MessageArgs>,
    options: Option<PublishOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct UnpublishArgs {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeOptions {
    strategy: Option<StrategyConfig>,
    filter: Option<FilterConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeArgs {
    options: Option<SubscribeOptions>,
}

/// Null arguments read as an empty object
fn parse_args<T: DeserializeOwned + Default>(args: Value) -> Result<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(args)?)
}

/// Method-name dispatch over a [`SessionCoordinator`]
pub struct NearbyPlugin {
    coordinator: SessionCoordinator,
}

impl NearbyPlugin {
    pub fn new(provider: Arc<dyn NearbyProvider>, config: NearbyConfig) -> Self {
        Self {
            coordinator: SessionCoordinator::new(provider, config),
        }
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.coordinator.notifications()
    }

    /// Run one client command
    pub async fn call(&self, method: &str, args: Value) -> std::result::Result<Value, CallError> {
        info!("Plugin call: {}", method);

        let outcome = match method {
            "initialize" => self.initialize(args).await,
            "reset" => self.coordinator.reset().await.map(|_| json!({})),
            "publish" => self.publish(args).await,
            "unpublish" => self.unpublish(args).await,
            "subscribe" => self.subscribe(args).await,
            "unsubscribe" => self.coordinator.unsubscribe().await.map(|_| json!({})),
            "pause" => self.coordinator.pause().await.map(|_| json!({})),
            "resume" => self.coordinator.resume().await.map(|_| json!({})),
            "status" => {
                let status = self.coordinator.status().await;
                serde_json::to_value(status).map_err(NearbyError::from)
            }
            "isGranted" => self
                .coordinator
                .is_granted()
                .await
                .map(|granted| json!({ "isGranted": granted })),
            other => {
                return Err(CallError {
                    code: "unimplemented".to_string(),
                    message: format!("Method '{}' is not implemented", other),
                })
            }
        };

        outcome.map_err(|e| {
            e.log_with_context(&ErrorContext::new().with_command(method));
            CallError::from(&e)
        })
    }

    async fn initialize(&self, args: Value) -> Result<Value> {
        let options: InitializeOptions = parse_args(args)?;
        let result = self.coordinator.initialize(options).await?;
        Ok(serde_json::to_value(result)?)
    }

    async fn publish(&self, args: Value) -> Result<Value> {
        self.coordinator.ensure_initialized().await?;
        let args: PublishArgs = parse_args(args)?;
        let message = args
            .message
            .ok_or(NearbyError::MissingArgument("message"))?
            .into_message()?;
        let strategy = args.options.and_then(|options| options.strategy);

        let id = self.coordinator.publish(message, strategy.as_ref()).await?;
        Ok(json!({ "id": id }))
    }

    async fn unpublish(&self, args: Value) -> Result<Value> {
        self.coordinator.ensure_initialized().await?;
        let args: UnpublishArgs = parse_args(args)?;
        // An empty id unpublishes everything, like a missing one
        let id = args
            .id
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<PublishId>())
            .transpose()?;

        self.coordinator.unpublish(id).await?;
        Ok(json!({}))
    }

    async fn subscribe(&self, args: Value) -> Result<Value> {
        self.coordinator.ensure_initialized().await?;
        let args: SubscribeArgs = parse_args(args)?;
        let options = args.options.unwrap_or_default();

        self.coordinator
            .subscribe(options.strategy.as_ref(), options.filter.as_ref())
            .await?;
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_args_require_content_then_type() {
        let err = MessageArgs::default().into_message().unwrap_err();
        assert_eq!(err.to_string(), "Must provide message with content");

        let err = MessageArgs {
            content: Some("aGk=".to_string()),
            ..Default::default()
        }
        .into_message()
        .unwrap_err();
        assert_eq!(err.to_string(), "Must provide message with type");
    }

    #[test]
    fn test_message_args_decode_base64() {
        let message = MessageArgs {
            content: Some("aGVsbG8=".to_string()),
            message_type: Some("demo".to_string()),
            namespace: Some("ns".to_string()),
        }
        .into_message()
        .unwrap();

        assert_eq!(message.content(), b"hello");
        assert_eq!(message.namespace(), "ns");

        let err = MessageArgs {
            content: Some("***".to_string()),
            message_type: Some("demo".to_string()),
            namespace: None,
        }
        .into_message()
        .unwrap_err();
        assert!(matches!(err, NearbyError::Validation { ref field, .. } if field == "message.content"));
    }

    #[test]
    fn test_provider_reason_is_passed_through() {
        let err = NearbyError::Provider {
            code: None,
            message: "quota exceeded".to_string(),
        };
        let call = CallError::from(&err);
        assert_eq!(call.code, "provider");
        assert_eq!(call.message, "quota exceeded");

        let call = CallError::from(&NearbyError::NotInitialized);
        assert_eq!(call.message, "Nearby Messages API not initialized");
    }

    #[test]
    fn test_null_args_are_empty() {
        let args: UnpublishArgs = parse_args(Value::Null).unwrap();
        assert!(args.id.is_none());
    }
}
