use super::types::ShutdownHandle;
use super::GracefulShutdown;
use crate::error::Result;
use std::sync::Arc;
use tracing::{error, info};

impl GracefulShutdown {
    /// Start every registered manager, in registration order. Stops at the
    /// first failure; managers started before it stay started.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let managers = self.managers.read().clone();
        info!("Starting {} shutdown managers", managers.len());

        let handle: Arc<dyn ShutdownHandle> = Arc::clone(self) as Arc<dyn ShutdownHandle>;

        for manager in managers {
            let name = manager.name().to_string();
            info!("Starting shutdown manager '{}'", name);

            if let Err(e) = Arc::clone(&manager).start(Arc::clone(&handle)).await {
                error!("Failed to start shutdown manager '{}': {}", name, e);
                return Err(e);
            }
        }

        self.mark_listening();
        info!("All shutdown managers started");
        Ok(())
    }
}
