use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{mask_phone_number, SmsError, SmsSender};
use crate::config::TwilioConfig;

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
    status: String,
}

/// Twilio Programmable Messaging client
pub struct TwilioSmsSender {
    config: TwilioConfig,
    client: Client,
    messages_url: String,
}

impl TwilioSmsSender {
    pub fn new(config: TwilioConfig) -> Result<Self, SmsError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(SmsError::Config("Twilio account SID and auth token are required".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let messages_url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.base_url.trim_end_matches('/'),
            config.account_sid
        );

        Ok(Self {
            config,
            client,
            messages_url,
        })
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<String, SmsError> {
        let request = MessageRequest {
            to: phone_number,
            from: &self.config.from_number,
            body: message,
        };

        let response = self.client
            .post(&self.messages_url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or(body);
            error!(
                phone = %mask_phone_number(phone_number),
                status = %status,
                "Twilio rejected message: {}",
                detail
            );
            return Err(SmsError::Rejected(format!("status {}: {}", status, detail)));
        }

        let sent: MessageResponse = response.json().await?;
        info!(
            phone = %mask_phone_number(phone_number),
            sid = %sent.sid,
            status = %sent.status,
            "Sent SMS via Twilio"
        );

        Ok(sent.sid)
    }

    fn provider_name(&self) -> &'static str {
        "twilio"
    }
}
