use crate::error::{Result, ShutdownError};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GracefulConfig {
    pub shutdown: ShutdownConfig,
    pub lifecycle: LifecycleConfig,
    pub callbacks: CallbacksConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShutdownConfig {
    /// Period between pings to the triggering manager while callbacks run
    #[serde(default = "default_ping_interval_seconds")]
    pub ping_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LifecycleConfig {
    /// Install the lifecycle hook manager
    #[serde(default = "default_lifecycle_enabled")]
    pub enabled: bool,

    /// Queue to poll for termination notices. Empty disables polling.
    #[serde(default)]
    pub queue_name: String,

    /// Lifecycle hook whose notices this instance acts on
    #[serde(default)]
    pub hook_name: String,

    /// Period between lifecycle heartbeats during a shutdown episode
    #[serde(default = "default_ping_interval_seconds")]
    pub ping_interval_seconds: u64,

    /// Peer forwarding port. Zero disables the HTTP listener and forwarding.
    #[serde(default)]
    pub port: u16,

    /// Base delay for bind and forward retries, in milliseconds. Zero uses the default.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Bind retries for the peer listener. Zero uses the default, -1 disables retries.
    #[serde(default)]
    pub serve_retries: i32,

    /// Delivery retries when forwarding. Zero uses the default, -1 disables retries.
    #[serde(default)]
    pub forward_retries: i32,

    /// Region override; looked up from instance metadata when absent
    pub region: Option<String>,

    /// Instance id override; looked up from instance metadata when absent
    pub instance_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CallbacksConfig {
    /// Commands run concurrently when a shutdown episode starts
    #[serde(default)]
    pub commands: Vec<String>,

    /// Shell used to run each command
    #[serde(default = "default_shell")]
    pub shell: String,
}

/// Zero selects the default interval
pub fn ping_interval_or_default(seconds: u64) -> Duration {
    if seconds == 0 {
        Duration::from_secs(DEFAULT_PING_INTERVAL_SECONDS)
    } else {
        Duration::from_secs(seconds)
    }
}

impl ShutdownConfig {
    pub fn ping_interval(&self) -> Duration {
        ping_interval_or_default(self.ping_interval_seconds)
    }
}

impl LifecycleConfig {
    pub fn ping_interval(&self) -> Duration {
        ping_interval_or_default(self.ping_interval_seconds)
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.port != 0
    }

    pub fn polling_enabled(&self) -> bool {
        !self.queue_name.is_empty()
    }
}

impl GracefulConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self> {
        Self::load_from_file("graceful-shutdown.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        // Defaults first so every key exists even without a file
        let settings = Config::builder()
            .set_default(
                "shutdown.ping_interval_seconds",
                default_ping_interval_seconds() as i64,
            )?
            .set_default("lifecycle.enabled", default_lifecycle_enabled())?
            .set_default("lifecycle.queue_name", "")?
            .set_default("lifecycle.hook_name", "")?
            .set_default(
                "lifecycle.ping_interval_seconds",
                default_ping_interval_seconds() as i64,
            )?
            .set_default("lifecycle.port", 0)?
            .set_default("lifecycle.backoff_ms", default_backoff_ms() as i64)?
            .set_default("lifecycle.serve_retries", 0)?
            .set_default("lifecycle.forward_retries", 0)?
            .set_default("callbacks.commands", Vec::<String>::new())?
            .set_default("callbacks.shell", default_shell())?
            // Optional TOML file
            .add_source(File::with_name(&path_str).required(false))
            // GRACEFUL_LIFECYCLE__QUEUE_NAME style overrides
            .add_source(
                Environment::with_prefix("GRACEFUL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        // Deserialize into our config struct
        let config: GracefulConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Lifecycle section only matters when the manager is installed
        if self.lifecycle.enabled {
            if self.lifecycle.hook_name.is_empty() {
                return Err(invalid(
                    "Lifecycle hook_name is required when the lifecycle manager is enabled",
                ));
            }

            if !self.lifecycle.polling_enabled() && !self.lifecycle.forwarding_enabled() {
                return Err(invalid(
                    "Lifecycle manager needs a queue_name, a port, or both",
                ));
            }
        }

        if self.callbacks.shell.is_empty() {
            return Err(invalid("Callback shell must not be empty"));
        }

        Ok(())
    }

    /// Render as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn invalid(message: &str) -> ShutdownError {
    ShutdownError::Config(ConfigError::Message(message.to_string()))
}

impl Default for GracefulConfig {
    fn default() -> Self {
        Self {
            shutdown: ShutdownConfig::default(),
            lifecycle: LifecycleConfig::default(),
            callbacks: CallbacksConfig {
                commands: Vec::new(),
                shell: default_shell(),
            },
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            ping_interval_seconds: default_ping_interval_seconds(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            enabled: default_lifecycle_enabled(),
            queue_name: String::new(),
            hook_name: String::new(),
            ping_interval_seconds: default_ping_interval_seconds(),
            port: 0,
            backoff_ms: default_backoff_ms(),
            serve_retries: 0,
            forward_retries: 0,
            region: None,
            instance_id: None,
        }
    }
}

pub const DEFAULT_PING_INTERVAL_SECONDS: u64 = 15 * 60;
pub const DEFAULT_BACKOFF_MS: u64 = 500;

fn default_ping_interval_seconds() -> u64 {
    DEFAULT_PING_INTERVAL_SECONDS
}
fn default_lifecycle_enabled() -> bool {
    false
}
fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}
fn default_shell() -> String {
    "/bin/sh".to_string()
}
