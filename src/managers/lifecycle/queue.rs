use super::api::QueueMessage;
use super::manager::LifecycleHookManager;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info};

impl LifecycleHookManager {
    /// Long-poll the notice queue until polling is stopped.
    ///
    /// Keeps running through a shutdown episode so notices for peers are
    /// still forwarded while this instance drains.
    pub(super) async fn poll_queue(self: Arc<Self>) {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.polling.cancelled() => break,
                received = self.api.receive_message() => received,
            };

            match received {
                Ok(Some(message)) => self.handle_queue_message(message).await,
                Ok(None) => {}
                Err(e) => {
                    self.report(e);
                    let pause = self.policy.delay(0);
                    tokio::select! {
                        _ = self.polling.cancelled() => break,
                        _ = sleep(pause) => {}
                    }
                }
            }
        }

        info!("Stopped polling queue '{}'", self.config.queue_name);
    }

    async fn handle_queue_message(self: &Arc<Self>, message: QueueMessage) {
        let decision = self.route_message(&message.body).await;

        if !decision.is_handled() {
            debug!("Leaving queue message for redelivery: {:?}", decision);
            return;
        }

        if let Err(e) = self.api.delete_message(&message).await {
            self.report(e);
        }
    }
}
