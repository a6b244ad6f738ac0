use crate::error::{Result, ShutdownError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Cleanup work run when a shutdown episode starts. Receives the name of the
/// manager that triggered the episode.
#[async_trait]
pub trait ShutdownCallback: Send + Sync {
    async fn on_shutdown(&self, manager: &str) -> Result<()>;
}

/// A trigger source. Started once by the orchestrator; calls
/// [`ShutdownHandle::start_shutdown`] when it detects a termination request.
///
/// During an episode the orchestrator calls `shutdown_start`, then `ping`
/// periodically while callbacks run, then `shutdown_finish` once every
/// callback has returned.
#[async_trait]
pub trait ShutdownManager: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn start(self: Arc<Self>, handle: Arc<dyn ShutdownHandle>) -> Result<()>;

    async fn shutdown_start(&self) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown_finish(&self) -> Result<()>;
}

/// Interface handed to managers by the orchestrator
#[async_trait]
pub trait ShutdownHandle: Send + Sync {
    async fn start_shutdown(&self, manager: Arc<dyn ShutdownManager>);

    fn report_error(&self, error: ShutdownError);

    fn report_result(&self, result: Result<()>) {
        if let Err(e) = result {
            self.report_error(e);
        }
    }

    fn add_shutdown_callback(&self, callback: Arc<dyn ShutdownCallback>);
}

/// Receives errors from callbacks and managers
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, error: &ShutdownError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&ShutdownError) + Send + Sync,
{
    fn on_error(&self, error: &ShutdownError) {
        self(error)
    }
}

/// Adapts an async closure into a [`ShutdownCallback`]
pub struct ShutdownFn<F>(F);

pub fn shutdown_fn<F, Fut>(f: F) -> Arc<dyn ShutdownCallback>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(ShutdownFn(f))
}

#[async_trait]
impl<F, Fut> ShutdownCallback for ShutdownFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_shutdown(&self, manager: &str) -> Result<()> {
        (self.0)(manager.to_string()).await
    }
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeState {
    Idle,
    Listening,
    ShuttingDown(EpisodeReport),
    Finished(EpisodeReport),
}

impl EpisodeState {
    pub fn is_finished(&self) -> bool {
        matches!(self, EpisodeState::Finished(_))
    }
}

/// Identity and timing of one shutdown episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub id: Uuid,
    pub manager: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub callbacks: usize,
    pub failed_callbacks: usize,
}
