use crate::error::{Result, ShutdownError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers a raw notice to a peer's listener
#[async_trait]
pub trait PeerClient: Send + Sync + 'static {
    async fn post(&self, host: &str, port: u16, body: &str) -> Result<()>;
}

/// POSTs notices to `http://<host>:<port>/`
#[derive(Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(FORWARD_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn post(&self, host: &str, port: u16, body: &str) -> Result<()> {
        let url = format!("http://{}:{}/", host, port);
        debug!("Forwarding lifecycle notice to {}", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShutdownError::system(format!(
                "Peer {} answered {}",
                url, status
            )));
        }
        Ok(())
    }
}
