use super::types::{EpisodeReport, EpisodeState};
use super::GracefulShutdown;
use crate::error::{Result, ShutdownError};
use tokio::sync::watch;
use tracing::debug;

impl GracefulShutdown {
    pub(super) fn set_state(&self, state: EpisodeState) {
        debug!("Shutdown state changed to: {:?}", state);
        self.state_sender.send_replace(state);
    }

    /// Move from `Idle` to `Listening`; leaves an episode already under way alone
    pub(super) fn mark_listening(&self) {
        self.state_sender.send_if_modified(|state| {
            if *state == EpisodeState::Idle {
                *state = EpisodeState::Listening;
                true
            } else {
                false
            }
        });
    }

    /// Current lifecycle state
    pub fn state(&self) -> EpisodeState {
        self.state_sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EpisodeState> {
        self.state_sender.subscribe()
    }

    /// Wait until a shutdown episode has run to completion
    pub async fn wait_for_finish(&self) -> Result<EpisodeReport> {
        let mut receiver = self.state_sender.subscribe();
        let state = receiver
            .wait_for(EpisodeState::is_finished)
            .await
            .map_err(|_| ShutdownError::system("Shutdown state channel closed unexpectedly"))?;

        match &*state {
            EpisodeState::Finished(report) => Ok(report.clone()),
            other => Err(ShutdownError::system(format!(
                "Unexpected shutdown state: {:?}",
                other
            ))),
        }
    }
}
