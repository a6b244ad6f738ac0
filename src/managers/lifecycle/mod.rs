//! Autoscaling lifecycle-hook trigger.
//!
//! Termination notices are read from a queue and/or received from peers over
//! HTTP, routed to the instance they target and turned into a shutdown
//! episode on that instance.

pub mod api;
#[cfg(feature = "aws")]
pub mod aws;
pub mod forward;
mod handlers;
pub mod manager;
pub mod message;
mod queue;
pub mod routing;
pub mod server;


pub use api::{LifecycleApi, QueueMessage};
#[cfg(feature = "aws")]
pub use aws::AwsLifecycleApi;
pub use forward::{HttpPeerClient, PeerClient};
pub use manager::{
    region_from_zone, InstanceIdentity, LifecycleAction, LifecycleHookManager,
    LIFECYCLE_HOOK_MANAGER,
};
pub use message::{LifecycleHookMessage, TERMINATING_TRANSITION};
pub use routing::{RejectReason, RouteDecision};
pub use server::{router, PeerServer};
