use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Message decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Metadata lookup for '{key}' failed: {message}")]
    Metadata { key: String, message: String },

    #[error("Lifecycle API call {operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("Failed to bind peer listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Forwarding to instance {instance_id} failed: {message}")]
    Forward { instance_id: String, message: String },

    #[error("Shutdown callback failed (triggered by {manager}): {message}")]
    Callback { manager: String, message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl ShutdownError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn api<S: Into<String>, M: std::fmt::Display>(operation: S, message: M) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn metadata<S: Into<String>, M: std::fmt::Display>(key: S, message: M) -> Self {
        Self::Metadata {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn forward<S: Into<String>, M: std::fmt::Display>(instance_id: S, message: M) -> Self {
        Self::Forward {
            instance_id: instance_id.into(),
            message: message.to_string(),
        }
    }

    pub fn callback<S: Into<String>, M: std::fmt::Display>(manager: S, message: M) -> Self {
        Self::Callback {
            manager: manager.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShutdownError>;
