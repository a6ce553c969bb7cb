//! AWS SNS delivery.
//!
//! Publishes directly to a phone number; no topic is involved.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as AwsSnsClient;
use tracing::{error, info};

use super::{mask_phone_number, SmsError, SmsSender};
use crate::config::SnsConfig;

const SENDER_ID_ATTRIBUTE: &str = "AWS.SNS.SMS.SenderID";
const SMS_TYPE_ATTRIBUTE: &str = "AWS.SNS.SMS.SMSType";

/// SMS sender backed by AWS SNS
pub struct SnsSmsSender {
    client: AwsSnsClient,
    config: SnsConfig,
}

impl SnsSmsSender {
    /// Loads AWS credentials from the default provider chain for `config.region`.
    pub async fn new(config: SnsConfig) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()));
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        info!(region = %config.region, "Initialized SNS client");

        Self {
            client: AwsSnsClient::new(&shared_config),
            config,
        }
    }

    fn string_attribute(value: &str) -> Result<MessageAttributeValue, SmsError> {
        MessageAttributeValue::builder()
            .data_type("String")
            .string_value(value)
            .build()
            .map_err(|e| SmsError::Config(e.to_string()))
    }
}

#[async_trait]
impl SmsSender for SnsSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<String, SmsError> {
        let mut request = self.client
            .publish()
            .phone_number(phone_number)
            .message(message);

        if let Some(sender_id) = &self.config.sender_id {
            request = request
                .message_attributes(SENDER_ID_ATTRIBUTE, Self::string_attribute(sender_id)?);
        }
        if let Some(sms_type) = &self.config.sms_type {
            request = request
                .message_attributes(SMS_TYPE_ATTRIBUTE, Self::string_attribute(sms_type)?);
        }

        let output = request.send().await.map_err(|e| {
            error!(
                phone = %mask_phone_number(phone_number),
                error = %e,
                "SNS publish failed"
            );
            SmsError::Delivery(e.to_string())
        })?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        info!(
            phone = %mask_phone_number(phone_number),
            message_id = %message_id,
            "Sent SMS via SNS"
        );
        Ok(message_id)
    }

    fn provider_name(&self) -> &'static str {
        "sns"
    }
}
