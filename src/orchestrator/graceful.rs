use super::reporter::ErrorReporter;
use super::types::{EpisodeState, ErrorHandler, ShutdownCallback, ShutdownManager};
use crate::config::{ShutdownConfig, DEFAULT_PING_INTERVAL_SECONDS};
use parking_lot::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Owns the shutdown callbacks and the trigger managers and drives shutdown
/// episodes. Share it behind an `Arc`; managers receive it as a
/// [`ShutdownHandle`](super::ShutdownHandle).
pub struct GracefulShutdown {
    pub(super) callbacks: RwLock<Vec<Arc<dyn ShutdownCallback>>>,
    pub(super) managers: RwLock<Vec<Arc<dyn ShutdownManager>>>,
    pub(super) reporter: ErrorReporter,
    pub(super) ping_interval: Duration,

    // Lifecycle management
    pub(super) episode_started: AtomicBool,
    pub(super) state_sender: watch::Sender<EpisodeState>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::with_config(&ShutdownConfig::default())
    }

    pub fn with_config(config: &ShutdownConfig) -> Self {
        Self::with_ping_interval(config.ping_interval())
    }

    /// A zero interval selects the default
    pub fn with_ping_interval(ping_interval: Duration) -> Self {
        let (state_sender, _) = watch::channel(EpisodeState::Idle);
        let ping_interval = if ping_interval.is_zero() {
            Duration::from_secs(DEFAULT_PING_INTERVAL_SECONDS)
        } else {
            ping_interval
        };

        Self {
            callbacks: RwLock::new(Vec::with_capacity(10)),
            managers: RwLock::new(Vec::with_capacity(3)),
            reporter: ErrorReporter::default(),
            ping_interval,
            episode_started: AtomicBool::new(false),
            state_sender,
        }
    }

    /// Add a trigger source. Managers are started in registration order.
    pub fn register_manager(&self, manager: Arc<dyn ShutdownManager>) {
        debug!("Registering shutdown manager '{}'", manager.name());
        self.managers.write().push(manager);
    }

    /// Add cleanup work. Callbacks run concurrently, so order is irrelevant.
    pub fn register_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        self.callbacks.write().push(callback);
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.reporter.set_handler(handler);
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn manager_count(&self) -> usize {
        self.managers.read().len()
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
