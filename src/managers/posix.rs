use crate::error::{Result, ShutdownError};
use crate::orchestrator::{ShutdownHandle, ShutdownManager};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

pub const POSIX_SIGNAL_MANAGER: &str = "PosixSignalManager";

/// Triggers shutdown on SIGINT (ctrl-c) and, on Unix, SIGTERM or any other
/// configured set of signals. The first signal received wins.
pub struct PosixSignalManager {
    name: String,
    #[cfg(unix)]
    signals: Vec<SignalKind>,
}

impl PosixSignalManager {
    pub fn new() -> Self {
        Self {
            name: POSIX_SIGNAL_MANAGER.to_string(),
            #[cfg(unix)]
            signals: vec![SignalKind::interrupt(), SignalKind::terminate()],
        }
    }

    /// Listen for `signals` instead of SIGINT and SIGTERM
    #[cfg(unix)]
    pub fn with_signals(signals: Vec<SignalKind>) -> Self {
        Self {
            name: POSIX_SIGNAL_MANAGER.to_string(),
            signals,
        }
    }

    #[cfg(unix)]
    pub fn signals(&self) -> &[SignalKind] {
        &self.signals
    }
}

impl Default for PosixSignalManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn signal_name(kind: SignalKind) -> String {
    if kind == SignalKind::interrupt() {
        "SIGINT".to_string()
    } else if kind == SignalKind::terminate() {
        "SIGTERM".to_string()
    } else if kind == SignalKind::hangup() {
        "SIGHUP".to_string()
    } else if kind == SignalKind::user_defined1() {
        "SIGUSR1".to_string()
    } else if kind == SignalKind::user_defined2() {
        "SIGUSR2".to_string()
    } else {
        format!("signal {}", kind.as_raw_value())
    }
}

#[async_trait]
impl ShutdownManager for PosixSignalManager {
    fn name(&self) -> &str {
        &self.name
    }

    #[cfg(unix)]
    async fn start(self: Arc<Self>, handle: Arc<dyn ShutdownHandle>) -> Result<()> {
        if self.signals.is_empty() {
            return Err(ShutdownError::system("No signals configured for the signal manager"));
        }

        // Register before returning so registration failures are fatal to startup
        let mut streams = Vec::with_capacity(self.signals.len());
        for &kind in &self.signals {
            let stream = signal(kind).map_err(|e| {
                ShutdownError::system(format!(
                    "Failed to register {} handler: {}",
                    signal_name(kind),
                    e
                ))
            })?;
            streams.push((kind, stream));
        }

        let (sender, mut received) = tokio::sync::mpsc::channel(1);
        for (kind, mut stream) in streams {
            let sender = sender.clone();
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    let _ = sender.send(kind).await;
                }
            });
        }
        drop(sender);

        tokio::spawn(async move {
            if let Some(kind) = received.recv().await {
                info!("Received {} signal", signal_name(kind));
                handle.start_shutdown(self).await;
            }
        });

        Ok(())
    }

    #[cfg(not(unix))]
    async fn start(self: Arc<Self>, handle: Arc<dyn ShutdownHandle>) -> Result<()> {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT signal");
                    handle.start_shutdown(self).await;
                }
                Err(e) => handle.report_error(ShutdownError::system(format!(
                    "Failed to listen for SIGINT: {}",
                    e
                ))),
            }
        });

        Ok(())
    }

    async fn shutdown_start(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown_finish(&self) -> Result<()> {
        Ok(())
    }
}
