use super::manager::LifecycleHookManager;
use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Receives a forwarded (or directly posted) lifecycle notice
pub async fn notice_handler(
    State(manager): State<Arc<LifecycleHookManager>>,
    body: String,
) -> StatusCode {
    let decision = manager.route_message(&body).await;
    debug!("Peer notice routed: {:?}", decision);

    if decision.is_handled() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}
