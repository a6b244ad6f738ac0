use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const TERMINATING_TRANSITION: &str = "autoscaling:EC2_INSTANCE_TERMINATING";

/// Termination notice published by the autoscaler for a lifecycle hook
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleHookMessage {
    #[serde(rename = "AutoScalingGroupName")]
    pub auto_scaling_group_name: String,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "LifecycleTransition")]
    pub lifecycle_transition: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "LifecycleActionToken")]
    pub lifecycle_action_token: String,
    #[serde(rename = "EC2InstanceId")]
    pub ec2_instance_id: String,
    #[serde(rename = "LifecycleHookName")]
    pub lifecycle_hook_name: String,
}

impl LifecycleHookMessage {
    /// Structural decode only. Hook, transition and instance checks belong to the caller.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_terminating(&self) -> bool {
        self.lifecycle_transition == TERMINATING_TRANSITION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTICE: &str = r#"{"AutoScalingGroupName":"my-autoscaling-group","Service":"AWS Auto Scaling","Time":"2016-02-26T15:08:14.468Z","AccountId":"123456789012","LifecycleTransition":"autoscaling:EC2_INSTANCE_TERMINATING","RequestId":"8f3f6e62-6ad1-4a3b-9f5c-4a62d0b3c9e1","LifecycleActionToken":"my-lifecycle-token","EC2InstanceId":"i-1db84ae3","LifecycleHookName":"my-lifecycle-hook"}"#;

    #[test]
    fn test_decode_full_notice() {
        let message = LifecycleHookMessage::decode(NOTICE).unwrap();

        assert_eq!(message.auto_scaling_group_name, "my-autoscaling-group");
        assert_eq!(message.lifecycle_action_token, "my-lifecycle-token");
        assert_eq!(message.ec2_instance_id, "i-1db84ae3");
        assert_eq!(message.lifecycle_hook_name, "my-lifecycle-hook");
        assert_eq!(message.account_id, "123456789012");
        assert!(message.is_terminating());
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let message = LifecycleHookMessage::decode(
            r#"{"LifecycleHookName":"hook","Event":"autoscaling:TEST_NOTIFICATION"}"#,
        )
        .unwrap();

        assert_eq!(message.lifecycle_hook_name, "hook");
        assert!(message.ec2_instance_id.is_empty());
        assert!(!message.is_terminating());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(LifecycleHookMessage::decode("message").is_err());
        assert!(LifecycleHookMessage::decode("").is_err());
        assert!(LifecycleHookMessage::decode(r#"{"EC2InstanceId": 42}"#).is_err());
        assert!(LifecycleHookMessage::decode("42").is_err());
        assert!(LifecycleHookMessage::decode("null").is_err());
    }

    #[test]
    fn test_launching_transition_is_not_terminating() {
        let message = LifecycleHookMessage {
            lifecycle_transition: "autoscaling:EC2_INSTANCE_LAUNCHING".to_string(),
            ..Default::default()
        };

        assert!(!message.is_terminating());
    }
}
