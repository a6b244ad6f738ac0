use crate::config::DEFAULT_PING_INTERVAL_SECONDS;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Periodic liveness worker. Invokes its action immediately, then once per
/// period, until stopped. Invocations run sequentially on a single task.
/// A zero period falls back to the default ping interval.
pub struct HeartbeatTicker {
    period: Duration,
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<u64>>,
}

impl HeartbeatTicker {
    pub fn start<F, Fut>(period: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = if period.is_zero() {
            warn!("Zero heartbeat period, using the default");
            Duration::from_secs(DEFAULT_PING_INTERVAL_SECONDS)
        } else {
            period
        };
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut beats = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    // First tick completes immediately
                    _ = ticker.tick() => {}
                }

                beats += 1;
                trace!("Heartbeat {}", beats);
                action().await;
            }

            debug!("Heartbeat ticker stopped after {} beats", beats);
            beats
        });

        Self {
            period,
            cancellation_token,
            handle: Some(handle),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Request that no further beats start. A beat already running finishes.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Stop and wait for the worker to exit, returning the number of beats sent
    pub async fn stop_and_wait(mut self) -> u64 {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for HeartbeatTicker {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
