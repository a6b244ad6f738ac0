use crate::config::CallbacksConfig;
use crate::error::{Result, ShutdownError};
use crate::orchestrator::ShutdownCallback;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable carrying the name of the triggering manager
pub const MANAGER_ENV: &str = "GRACEFUL_SHUTDOWN_MANAGER";

/// Runs a shell command as cleanup work. A non-zero exit is a callback failure.
pub struct CommandCallback {
    command: String,
    shell: String,
}

impl CommandCallback {
    pub fn new(command: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: shell.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// One callback per configured command
pub fn from_config(config: &CallbacksConfig) -> Vec<Arc<dyn ShutdownCallback>> {
    config
        .commands
        .iter()
        .map(|command| {
            Arc::new(CommandCallback::new(command.as_str(), config.shell.as_str()))
                as Arc<dyn ShutdownCallback>
        })
        .collect()
}

#[async_trait]
impl ShutdownCallback for CommandCallback {
    async fn on_shutdown(&self, manager: &str) -> Result<()> {
        info!("Running shutdown command: {}", self.command);

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command)
            .env(MANAGER_ENV, manager)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                ShutdownError::callback(manager, format!("'{}' failed to spawn: {}", self.command, e))
            })?;

        if !status.success() {
            return Err(ShutdownError::callback(
                manager,
                format!("'{}' exited with {}", self.command, status),
            ));
        }

        debug!("Shutdown command finished: {}", self.command);
        Ok(())
    }
}
