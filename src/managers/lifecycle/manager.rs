use super::api::LifecycleApi;
use super::forward::{HttpPeerClient, PeerClient};
use super::server::PeerServer;
use crate::backoff::RetryPolicy;
use crate::config::LifecycleConfig;
use crate::error::{Result, ShutdownError};
use crate::heartbeat::HeartbeatTicker;
use crate::orchestrator::{ShutdownCallback, ShutdownHandle, ShutdownManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const LIFECYCLE_HOOK_MANAGER: &str = "LifecycleHookManager";

const AVAILABILITY_ZONE_KEY: &str = "placement/availability-zone";
const INSTANCE_ID_KEY: &str = "instance-id";

/// The pending lifecycle action this instance must heartbeat and complete
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleAction {
    pub group_name: String,
    pub action_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceIdentity {
    pub region: String,
    pub instance_id: String,
}

/// Bridges an autoscaler termination lifecycle hook into the orchestrator.
///
/// Notices arrive from a queue and/or from peers over HTTP. A notice for this
/// instance starts a shutdown episode; a notice for another instance is
/// forwarded to that instance's listener when a peer port is configured.
/// While the episode runs the manager heartbeats the lifecycle action and
/// completes it with `CONTINUE` once every callback has returned.
pub struct LifecycleHookManager {
    pub(super) config: LifecycleConfig,
    pub(super) policy: RetryPolicy,
    pub(super) api: Arc<dyn LifecycleApi>,
    pub(super) peer_client: Arc<dyn PeerClient>,

    pub(super) handle: OnceLock<Arc<dyn ShutdownHandle>>,
    pub(super) identity: OnceLock<InstanceIdentity>,
    // Written once when a notice for this instance is accepted
    pub(super) action: Mutex<Option<LifecycleAction>>,
    pub(super) ticker: Mutex<Option<HeartbeatTicker>>,
    pub(super) server: Mutex<Option<PeerServer>>,
    pub(super) polling: CancellationToken,
}

impl LifecycleHookManager {
    pub fn new(config: LifecycleConfig, api: Arc<dyn LifecycleApi>) -> Result<Self> {
        let peer_client = Arc::new(HttpPeerClient::new()?);
        Ok(Self::with_peer_client(config, api, peer_client))
    }

    pub fn with_peer_client(
        config: LifecycleConfig,
        api: Arc<dyn LifecycleApi>,
        peer_client: Arc<dyn PeerClient>,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config);

        Self {
            config,
            policy,
            api,
            peer_client,
            handle: OnceLock::new(),
            identity: OnceLock::new(),
            action: Mutex::new(None),
            ticker: Mutex::new(None),
            server: Mutex::new(None),
            polling: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Region and instance id, once resolved by `start`
    pub fn identity(&self) -> Option<&InstanceIdentity> {
        self.identity.get()
    }

    pub fn current_action(&self) -> Option<LifecycleAction> {
        self.action.lock().clone()
    }

    /// Address the peer listener is bound to, if it is running
    pub fn listener_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.lock().as_ref().map(PeerServer::local_addr)
    }

    /// Stop polling the notice queue
    pub fn stop_polling(&self) {
        self.polling.cancel();
    }

    pub(super) fn report(&self, error: ShutdownError) {
        match self.handle.get() {
            Some(handle) => handle.report_error(error),
            None => warn!("Lifecycle hook manager error before start: {}", error),
        }
    }

    async fn resolve_identity(&self) -> Result<InstanceIdentity> {
        let region = match self.config.region.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => region.to_string(),
            None => {
                let zone = self.api.get_metadata(AVAILABILITY_ZONE_KEY).await?;
                region_from_zone(&zone)?
            }
        };

        let instance_id = match self.config.instance_id.as_deref().filter(|i| !i.is_empty()) {
            Some(instance_id) => instance_id.to_string(),
            None => self.api.get_metadata(INSTANCE_ID_KEY).await?,
        };

        Ok(InstanceIdentity {
            region,
            instance_id,
        })
    }

    fn required_action(&self) -> Result<LifecycleAction> {
        self.current_action().ok_or_else(|| {
            ShutdownError::system("No lifecycle action accepted for this instance")
        })
    }
}

/// `us-east-1a` -> `us-east-1`
pub fn region_from_zone(zone: &str) -> Result<String> {
    let zone = zone.trim();
    let mut chars = zone.chars();
    match chars.next_back() {
        Some(_) if !chars.as_str().is_empty() => Ok(chars.as_str().to_string()),
        _ => Err(ShutdownError::metadata(
            AVAILABILITY_ZONE_KEY,
            format!("invalid availability zone '{}'", zone),
        )),
    }
}

#[async_trait]
impl ShutdownManager for LifecycleHookManager {
    fn name(&self) -> &str {
        LIFECYCLE_HOOK_MANAGER
    }

    async fn start(self: Arc<Self>, handle: Arc<dyn ShutdownHandle>) -> Result<()> {
        if self.handle.set(Arc::clone(&handle)).is_err() {
            return Err(ShutdownError::system(
                "Lifecycle hook manager already started",
            ));
        }

        let identity = self.resolve_identity().await?;
        info!(
            "Lifecycle hook manager for instance {} in {}",
            identity.instance_id, identity.region
        );
        self.api.init(&identity.region, &self.config).await?;
        let _ = self.identity.set(identity);

        if self.config.forwarding_enabled() {
            let addr = format!("0.0.0.0:{}", self.config.port);
            let server = PeerServer::start(&addr, &self.policy, Arc::clone(&self)).await?;
            *self.server.lock() = Some(server);
        }

        // Closing the listener is ordinary cleanup work
        handle.add_shutdown_callback(Arc::clone(&self) as Arc<dyn ShutdownCallback>);

        if self.config.polling_enabled() {
            info!("Polling queue '{}' for lifecycle notices", self.config.queue_name);
            tokio::spawn(Arc::clone(&self).poll_queue());
        }

        Ok(())
    }

    /// Heartbeat the accepted lifecycle action every ping interval
    async fn shutdown_start(&self) -> Result<()> {
        let action = self.required_action()?;
        let api = Arc::clone(&self.api);
        let handle = self.handle.get().cloned();

        info!(
            "Heartbeating lifecycle action for group '{}' every {:?}",
            action.group_name,
            self.config.ping_interval()
        );

        let ticker = HeartbeatTicker::start(self.config.ping_interval(), move || {
            let api = Arc::clone(&api);
            let handle = handle.clone();
            let action = action.clone();
            async move {
                let result = api
                    .send_heartbeat(&action.group_name, &action.action_token)
                    .await;
                match (result, handle) {
                    (Ok(()), _) => debug!("Lifecycle heartbeat sent"),
                    (Err(e), Some(handle)) => handle.report_error(e),
                    (Err(e), None) => warn!("Lifecycle heartbeat failed: {}", e),
                }
            }
        });

        if let Some(previous) = self.ticker.lock().replace(ticker) {
            previous.stop();
        }
        Ok(())
    }

    /// Stop heartbeating, then complete the lifecycle action
    async fn shutdown_finish(&self) -> Result<()> {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.stop();
        }

        let action = self.required_action()?;
        info!(
            "Completing lifecycle action for group '{}'",
            action.group_name
        );
        self.api
            .complete_lifecycle_action(&action.group_name, &action.action_token)
            .await
    }
}

#[async_trait]
impl ShutdownCallback for LifecycleHookManager {
    async fn on_shutdown(&self, _manager: &str) -> Result<()> {
        if let Some(server) = self.server.lock().as_ref() {
            info!("Closing lifecycle peer listener on {}", server.local_addr());
            server.close();
        }
        Ok(())
    }
}
