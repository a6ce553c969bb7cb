//! SMS delivery.
//!
//! Verification codes leave the service through an [`SmsSender`]. The active
//! backend is chosen by configuration: AWS SNS, Twilio, or a logging sender
//! used for development and tests.

pub mod log;
pub mod sns;
pub mod twilio;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{SmsConfig, SmsProvider};

pub use self::log::LogSmsSender;
pub use self::sns::SnsSmsSender;
pub use self::twilio::TwilioSmsSender;

/// SMS delivery errors
#[derive(Debug, Error)]
pub enum SmsError {
    /// Provider accepted the request but refused to send
    #[error("SMS provider rejected message: {0}")]
    Rejected(String),
    /// Transport or SDK failure
    #[error("SMS delivery failed: {0}")]
    Delivery(String),
    /// Missing or invalid provider settings
    #[error("SMS configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends a text message to a phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Delivers `message` to `phone_number`, returning the provider message id.
    async fn send(&self, phone_number: &str, message: &str) -> Result<String, SmsError>;

    /// Short provider name for logs
    fn provider_name(&self) -> &'static str;
}

/// Builds the sender selected by `config`.
pub async fn from_config(config: &SmsConfig) -> Result<Arc<dyn SmsSender>, SmsError> {
    match config.provider {
        SmsProvider::Sns => {
            let sns = config
                .sns
                .as_ref()
                .ok_or_else(|| SmsError::Config("sms.sns section is required".into()))?;
            Ok(Arc::new(SnsSmsSender::new(sns.clone()).await))
        }
        SmsProvider::Twilio => {
            let twilio = config
                .twilio
                .as_ref()
                .ok_or_else(|| SmsError::Config("sms.twilio section is required".into()))?;
            Ok(Arc::new(TwilioSmsSender::new(twilio.clone())?))
        }
        SmsProvider::Log => Ok(Arc::new(LogSmsSender::new())),
    }
}

/// Fills the `{code}` placeholder of a message template.
pub fn render_message(template: &str, code: &str) -> String {
    template.replace("{code}", code)
}

/// Masks all but the last four characters of a phone number for logging.
pub fn mask_phone_number(phone: &str) -> String {
    let count = phone.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let visible: String = phone.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}
