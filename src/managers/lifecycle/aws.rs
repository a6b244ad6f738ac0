use super::api::{LifecycleApi, QueueMessage};
use crate::config::LifecycleConfig;
use crate::error::{Result, ShutdownError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

const METADATA_ENDPOINT: &str = "http://169.254.169.254/latest";
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TOKEN_TTL_SECONDS: &str = "21600";

const RECEIVE_WAIT_SECONDS: i32 = 20;
const CONTINUE_RESULT: &str = "CONTINUE";

struct AwsClients {
    autoscaling: aws_sdk_autoscaling::Client,
    ec2: aws_sdk_ec2::Client,
    sqs: aws_sdk_sqs::Client,
    hook_name: String,
    queue_url: Option<String>,
}

/// `LifecycleApi` backed by SQS, Auto Scaling, EC2 and the instance metadata service
pub struct AwsLifecycleApi {
    http: reqwest::Client,
    clients: OnceLock<AwsClients>,
}

impl AwsLifecycleApi {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(METADATA_TIMEOUT).build()?;
        Ok(Self {
            http,
            clients: OnceLock::new(),
        })
    }

    fn clients(&self) -> Result<&AwsClients> {
        self.clients
            .get()
            .ok_or_else(|| ShutdownError::system("AWS clients used before init"))
    }

    fn queue_url(&self) -> Result<(&AwsClients, &str)> {
        let clients = self.clients()?;
        let url = clients
            .queue_url
            .as_deref()
            .ok_or_else(|| ShutdownError::system("No notice queue configured"))?;
        Ok((clients, url))
    }

    /// IMDSv2 session token. `None` falls back to unauthenticated IMDSv1 reads.
    async fn metadata_token(&self) -> Option<String> {
        let response = self
            .http
            .put(format!("{}/api/token", METADATA_ENDPOINT))
            .header("X-aws-ec2-metadata-token-ttl-seconds", METADATA_TOKEN_TTL_SECONDS)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait]
impl LifecycleApi for AwsLifecycleApi {
    async fn init(&self, region: &str, config: &LifecycleConfig) -> Result<()> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let sqs = aws_sdk_sqs::Client::new(&sdk_config);

        let queue_url = if config.polling_enabled() {
            let output = sqs
                .get_queue_url()
                .queue_name(&config.queue_name)
                .send()
                .await
                .map_err(|e| {
                    ShutdownError::api("GetQueueUrl", aws_sdk_sqs::error::DisplayErrorContext(e))
                })?;
            let url = output.queue_url.ok_or_else(|| {
                ShutdownError::api("GetQueueUrl", format!("no url for '{}'", config.queue_name))
            })?;
            info!("Resolved notice queue '{}' to {}", config.queue_name, url);
            Some(url)
        } else {
            None
        };

        let clients = AwsClients {
            autoscaling: aws_sdk_autoscaling::Client::new(&sdk_config),
            ec2: aws_sdk_ec2::Client::new(&sdk_config),
            sqs,
            hook_name: config.hook_name.clone(),
            queue_url,
        };

        self.clients
            .set(clients)
            .map_err(|_| ShutdownError::system("AWS clients already initialized"))
    }

    async fn get_metadata(&self, key: &str) -> Result<String> {
        let mut request = self
            .http
            .get(format!("{}/meta-data/{}", METADATA_ENDPOINT, key));
        if let Some(token) = self.metadata_token().await {
            request = request.header("X-aws-ec2-metadata-token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ShutdownError::metadata(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShutdownError::metadata(key, format!("status {}", status)));
        }

        let value = response
            .text()
            .await
            .map_err(|e| ShutdownError::metadata(key, e))?;
        debug!("Metadata {} = {}", key, value);
        Ok(value.trim().to_string())
    }

    async fn receive_message(&self) -> Result<Option<QueueMessage>> {
        let (clients, url) = self.queue_url()?;

        let output = clients
            .sqs
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(1)
            .wait_time_seconds(RECEIVE_WAIT_SECONDS)
            .send()
            .await
            .map_err(|e| {
                ShutdownError::api("ReceiveMessage", aws_sdk_sqs::error::DisplayErrorContext(e))
            })?;

        let message = output.messages.unwrap_or_default().into_iter().next();
        Ok(message.map(|m| QueueMessage {
            body: m.body.unwrap_or_default(),
            receipt_handle: m.receipt_handle.unwrap_or_default(),
        }))
    }

    async fn delete_message(&self, message: &QueueMessage) -> Result<()> {
        let (clients, url) = self.queue_url()?;

        clients
            .sqs
            .delete_message()
            .queue_url(url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| {
                ShutdownError::api("DeleteMessage", aws_sdk_sqs::error::DisplayErrorContext(e))
            })?;
        Ok(())
    }

    async fn get_host(&self, instance_id: &str) -> Result<String> {
        let clients = self.clients()?;

        let output = clients
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| {
                ShutdownError::api("DescribeInstances", aws_sdk_ec2::error::DisplayErrorContext(e))
            })?;

        let reservations = output.reservations.unwrap_or_default();
        if reservations.len() != 1 {
            return Err(ShutdownError::api(
                "DescribeInstances",
                format!("expected 1 reservation, got {}", reservations.len()),
            ));
        }

        let instances = reservations
            .into_iter()
            .flat_map(|r| r.instances.unwrap_or_default())
            .collect::<Vec<_>>();
        if instances.len() != 1 {
            return Err(ShutdownError::api(
                "DescribeInstances",
                format!("expected 1 instance, got {}", instances.len()),
            ));
        }

        instances
            .into_iter()
            .next()
            .and_then(|i| i.private_ip_address)
            .ok_or_else(|| {
                ShutdownError::api(
                    "DescribeInstances",
                    format!("instance {} has no private ip", instance_id),
                )
            })
    }

    async fn send_heartbeat(&self, group_name: &str, action_token: &str) -> Result<()> {
        let clients = self.clients()?;

        clients
            .autoscaling
            .record_lifecycle_action_heartbeat()
            .auto_scaling_group_name(group_name)
            .lifecycle_action_token(action_token)
            .lifecycle_hook_name(&clients.hook_name)
            .send()
            .await
            .map_err(|e| {
                ShutdownError::api(
                    "RecordLifecycleActionHeartbeat",
                    aws_sdk_autoscaling::error::DisplayErrorContext(e),
                )
            })?;
        Ok(())
    }

    async fn complete_lifecycle_action(&self, group_name: &str, action_token: &str) -> Result<()> {
        let clients = self.clients()?;

        clients
            .autoscaling
            .complete_lifecycle_action()
            .auto_scaling_group_name(group_name)
            .lifecycle_action_token(action_token)
            .lifecycle_hook_name(&clients.hook_name)
            .lifecycle_action_result(CONTINUE_RESULT)
            .send()
            .await
            .map_err(|e| {
                ShutdownError::api(
                    "CompleteLifecycleAction",
                    aws_sdk_autoscaling::error::DisplayErrorContext(e),
                )
            })?;
        Ok(())
    }
}
