use super::manager::{LifecycleAction, LifecycleHookManager};
use super::message::LifecycleHookMessage;
use crate::backoff::retry;
use crate::error::{Result, ShutdownError};
use crate::orchestrator::ShutdownManager;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Body is not a lifecycle hook message
    Malformed,
    /// Notice belongs to a different lifecycle hook
    ForeignHook,
    /// Transition other than instance termination
    NotTerminating,
    /// Notice targets another instance and forwarding is disabled
    ForeignInstance,
    /// Instance identity has not been resolved yet
    NotStarted,
}

/// Outcome of routing one lifecycle notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Notice for this instance; a shutdown episode was requested
    Accepted,
    /// Notice for this instance after one was already accepted; nothing changes
    Duplicate,
    /// Notice for another instance; forwarding was attempted
    Forwarded,
    Rejected(RejectReason),
}

impl RouteDecision {
    /// Whether the notice was consumed and may be deleted from its source
    pub fn is_handled(&self) -> bool {
        !matches!(self, RouteDecision::Rejected(_))
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectReason::Malformed => "malformed notice",
            RejectReason::ForeignHook => "different lifecycle hook",
            RejectReason::NotTerminating => "not a termination transition",
            RejectReason::ForeignInstance => "different instance and forwarding disabled",
            RejectReason::NotStarted => "manager not started",
        };
        f.write_str(reason)
    }
}

impl LifecycleHookManager {
    /// Decide what to do with a raw notice and act on it.
    ///
    /// Accepting records the lifecycle action and asks the orchestrator to
    /// start an episode on a separate task, so the caller is never blocked by
    /// the callbacks. Only the first notice for this instance is accepted;
    /// later ones are consumed as duplicates and leave the recorded action
    /// alone. Forwarding completes (or exhausts its retries) before this
    /// returns; a failed forward is reported but still counts as handled.
    pub async fn route_message(self: &Arc<Self>, raw: &str) -> RouteDecision {
        let message = match LifecycleHookMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring lifecycle notice: {}", e);
                return RouteDecision::Rejected(RejectReason::Malformed);
            }
        };

        if message.lifecycle_hook_name != self.config.hook_name {
            debug!(
                "Ignoring notice for lifecycle hook '{}'",
                message.lifecycle_hook_name
            );
            return RouteDecision::Rejected(RejectReason::ForeignHook);
        }

        if !message.is_terminating() {
            debug!(
                "Ignoring lifecycle transition '{}'",
                message.lifecycle_transition
            );
            return RouteDecision::Rejected(RejectReason::NotTerminating);
        }

        let Some(identity) = self.identity.get() else {
            return RouteDecision::Rejected(RejectReason::NotStarted);
        };

        if message.ec2_instance_id == identity.instance_id {
            return self.accept(message);
        }

        if !self.config.forwarding_enabled() {
            debug!(
                "Ignoring notice for instance {}",
                message.ec2_instance_id
            );
            return RouteDecision::Rejected(RejectReason::ForeignInstance);
        }

        if let Err(e) = self.forward_message(&message.ec2_instance_id, raw).await {
            self.report(e);
        }
        RouteDecision::Forwarded
    }

    fn accept(self: &Arc<Self>, message: LifecycleHookMessage) -> RouteDecision {
        let Some(handle) = self.handle.get().cloned() else {
            return RouteDecision::Rejected(RejectReason::NotStarted);
        };

        {
            let mut action = self.action.lock();
            if let Some(current) = action.as_ref() {
                info!(
                    "Ignoring repeated termination notice, already handling group '{}'",
                    current.group_name
                );
                return RouteDecision::Duplicate;
            }

            info!(
                "Termination notice for this instance from group '{}'",
                message.auto_scaling_group_name
            );
            *action = Some(LifecycleAction {
                group_name: message.auto_scaling_group_name,
                action_token: message.lifecycle_action_token,
            });
        }

        let manager: Arc<dyn ShutdownManager> = Arc::clone(self) as Arc<dyn ShutdownManager>;
        tokio::spawn(async move {
            handle.start_shutdown(manager).await;
        });

        RouteDecision::Accepted
    }

    /// Deliver `raw` to the listener of `instance_id`, retrying with backoff
    pub async fn forward_message(&self, instance_id: &str, raw: &str) -> Result<()> {
        let host = self
            .api
            .get_host(instance_id)
            .await
            .map_err(|e| ShutdownError::forward(instance_id, e))?;

        info!("Forwarding lifecycle notice for {} to {}", instance_id, host);

        let peer_client = &self.peer_client;
        let host = host.as_str();
        let port = self.config.port;
        let what = format!("Forward to {}", instance_id);

        retry(
            &what,
            self.policy.forward_retries,
            self.policy.base_delay,
            move |_| peer_client.post(host, port, raw),
        )
        .await
        .map_err(|e| {
            warn!("Giving up forwarding notice for {}: {}", instance_id, e);
            ShutdownError::forward(instance_id, e)
        })
    }
}
