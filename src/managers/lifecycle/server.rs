use super::handlers::notice_handler;
use super::manager::LifecycleHookManager;
use crate::backoff::{retry, RetryPolicy};
use crate::error::{Result, ShutdownError};
use axum::{routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// HTTP listener that accepts lifecycle notices from peers
pub struct PeerServer {
    local_addr: SocketAddr,
    cancellation_token: CancellationToken,
}

pub fn router(manager: Arc<LifecycleHookManager>) -> Router {
    Router::new()
        .route("/", post(notice_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Bind `addr`, retrying with backoff up to `policy.serve_retries` more times
pub async fn bind_with_retry(addr: &str, policy: &RetryPolicy) -> Result<TcpListener> {
    retry(
        "Peer listener bind",
        policy.serve_retries,
        policy.base_delay,
        |_| async move {
            TcpListener::bind(addr)
                .await
                .map_err(|e| ShutdownError::Bind {
                    address: addr.to_string(),
                    source: e,
                })
        },
    )
    .await
}

impl PeerServer {
    /// Bind the listener and serve it on a background task
    pub async fn start(
        addr: &str,
        policy: &RetryPolicy,
        manager: Arc<LifecycleHookManager>,
    ) -> Result<Self> {
        let listener = bind_with_retry(addr, policy).await?;
        let local_addr = listener.local_addr()?;
        info!("Lifecycle peer listener on {}", local_addr);

        let cancellation_token = CancellationToken::new();
        let shutdown = cancellation_token.clone();
        let app = router(manager);

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;

            match served {
                Ok(()) => info!("Lifecycle peer listener on {} closed", local_addr),
                Err(e) => error!("Lifecycle peer listener on {} failed: {}", local_addr, e),
            }
        });

        Ok(Self {
            local_addr,
            cancellation_token,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting notices. Idempotent.
    pub fn close(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
