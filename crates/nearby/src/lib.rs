pub mod types;
pub mod strategy;
pub mod filter;
pub mod provider;
pub mod registry;
pub mod subscription;
pub mod session;
pub mod dispatcher;
pub mod coordinator;
pub mod plugin;
pub mod error;
pub mod permissions;
pub mod lifecycle;
pub mod config;
pub mod logging;

pub use types::*;
pub use error::{NearbyError, Result, ErrorContext, ErrorCategory};
pub use strategy::{build_strategy, DiscoveryMode, DiscoveryStrategy, DistanceType, StrategyConfig, StrategyUsage};
pub use filter::{build_filter, CustomFilter, FilterConfig, MessageFilter};
pub use provider::{
    ConnectOptions, EventSink, InMemoryProvider, NearbyPermissions, NearbyProvider, ProviderAdapter,
    ProviderCall, ProviderError, ProviderEvent, ProviderResult, ProviderStatusCode, PublishHandle,
    PublishRequest, SubscribeRequest, SubscriptionToken,
};
pub use registry::{PublishEntry, PublishRegistry};
pub use subscription::{SubscriptionController, SubscriptionState};
pub use session::{SessionState, SessionStatus};
pub use dispatcher::{EventDispatcher, Notification};
pub use coordinator::{InitializeOptions, InitializeResult, SessionCoordinator};
pub use plugin::{CallError, NearbyPlugin};
pub use permissions::{PermissionStatus, PermissionTracker};
pub use lifecycle::{AppState, LifecycleManager};
pub use config::{LogFormat, NearbyConfig};
