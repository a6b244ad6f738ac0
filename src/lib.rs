pub mod backoff;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod managers;
pub mod orchestrator;

pub use backoff::RetryPolicy;
pub use callbacks::CommandCallback;
pub use config::{CallbacksConfig, GracefulConfig, LifecycleConfig, ShutdownConfig};
pub use error::{Result, ShutdownError};
pub use heartbeat::HeartbeatTicker;
pub use managers::lifecycle::{
    LifecycleHookMessage, PeerClient, RejectReason, RouteDecision, TERMINATING_TRANSITION,
};
pub use managers::{
    LifecycleApi, LifecycleHookManager, PosixSignalManager, LIFECYCLE_HOOK_MANAGER,
    POSIX_SIGNAL_MANAGER,
};
pub use orchestrator::{
    shutdown_fn, EpisodeReport, EpisodeState, ErrorHandler, GracefulShutdown, ShutdownCallback,
    ShutdownHandle, ShutdownManager,
};

#[cfg(feature = "aws")]
pub use managers::lifecycle::AwsLifecycleApi;
