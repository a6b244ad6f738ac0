use crate::config::LifecycleConfig;
use crate::error::Result;
use async_trait::async_trait;

/// A message received from the termination-notice queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// Cloud capabilities the lifecycle hook manager relies on
#[async_trait]
pub trait LifecycleApi: Send + Sync + 'static {
    /// Prepare clients for `region`. Resolves the notice queue when polling is enabled.
    async fn init(&self, region: &str, config: &LifecycleConfig) -> Result<()>;

    /// Instance metadata value, e.g. `instance-id` or `placement/availability-zone`
    async fn get_metadata(&self, key: &str) -> Result<String>;

    /// Long-poll for a single message. `None` when the wait expired empty.
    async fn receive_message(&self) -> Result<Option<QueueMessage>>;

    async fn delete_message(&self, message: &QueueMessage) -> Result<()>;

    /// Network address peers can reach `instance_id` on
    async fn get_host(&self, instance_id: &str) -> Result<String>;

    async fn send_heartbeat(&self, group_name: &str, action_token: &str) -> Result<()>;

    /// Complete the lifecycle action with the `CONTINUE` result
    async fn complete_lifecycle_action(&self, group_name: &str, action_token: &str) -> Result<()>;
}
