use super::types::{
    EpisodeReport, EpisodeState, ShutdownCallback, ShutdownHandle, ShutdownManager,
};
use super::GracefulShutdown;
use crate::error::{Result, ShutdownError};
use crate::heartbeat::HeartbeatTicker;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl GracefulShutdown {
    /// Run one shutdown episode for `manager`: `shutdown_start`, ping the
    /// manager while every callback runs on its own task, wait for all of
    /// them, stop pinging, then `shutdown_finish`.
    ///
    /// Only the first trigger starts an episode. Later triggers are ignored.
    pub async fn run_episode(&self, manager: Arc<dyn ShutdownManager>) {
        let name = manager.name().to_string();

        if self
            .episode_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                "Shutdown already in progress, ignoring trigger from '{}'",
                name
            );
            return;
        }

        let callbacks = self.callbacks.read().clone();
        let mut report = EpisodeReport {
            id: Uuid::new_v4(),
            manager: name.clone(),
            started_at: Utc::now(),
            finished_at: None,
            callbacks: callbacks.len(),
            failed_callbacks: 0,
        };
        info!(
            "Shutdown episode {} started by '{}' with {} callbacks",
            report.id,
            name,
            callbacks.len()
        );
        self.set_state(EpisodeState::ShuttingDown(report.clone()));

        self.reporter.report_result(manager.shutdown_start().await);

        let ticker = {
            let manager = Arc::clone(&manager);
            let reporter = self.reporter.clone();
            HeartbeatTicker::start(self.ping_interval, move || {
                let manager = Arc::clone(&manager);
                let reporter = reporter.clone();
                async move {
                    reporter.report_result(manager.ping().await);
                }
            })
        };

        report.failed_callbacks = self.run_callbacks(&name, callbacks).await;

        ticker.stop();
        debug!("All shutdown callbacks returned, heartbeat stopped");

        self.reporter.report_result(manager.shutdown_finish().await);

        report.finished_at = Some(Utc::now());
        info!(
            "Shutdown episode {} finished ({} of {} callbacks failed)",
            report.id, report.failed_callbacks, report.callbacks
        );
        self.set_state(EpisodeState::Finished(report));
    }

    /// Launch every callback on its own task and wait for all of them.
    /// Returns the number that failed or panicked.
    async fn run_callbacks(&self, manager: &str, callbacks: Vec<Arc<dyn ShutdownCallback>>) -> usize {
        let mut tasks = JoinSet::new();
        for callback in callbacks {
            let manager = manager.to_string();
            tasks.spawn(async move { callback.on_shutdown(&manager).await });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Shutdown callback task aborted: {}", e);
                    Err(ShutdownError::from(e))
                }
            };

            if outcome.is_err() {
                failed += 1;
            }
            self.reporter.report_result(outcome);
        }
        failed
    }
}

#[async_trait]
impl ShutdownHandle for GracefulShutdown {
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>) {
        self.run_episode(manager).await;
    }

    fn report_error(&self, error: ShutdownError) {
        self.reporter.report(error);
    }

    fn add_shutdown_callback(&self, callback: Arc<dyn ShutdownCallback>) {
        self.register_callback(callback);
    }
}

impl GracefulShutdown {
    /// Report an operational error to the configured handler, if any
    pub fn report_error(&self, error: ShutdownError) {
        self.reporter.report(error);
    }

    /// Report the error of a failed result; `Ok` is ignored
    pub fn report_result(&self, result: Result<()>) {
        self.reporter.report_result(result);
    }
}
