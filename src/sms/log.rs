//! Development sender that logs messages instead of delivering them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

use super::{mask_phone_number, SmsError, SmsSender};

/// Logs every message and keeps the last one per phone number.
#[derive(Debug, Default)]
pub struct LogSmsSender {
    outbox: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl LogSmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail, or succeed again.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Last message body sent to `phone_number`
    pub fn last_message_for(&self, phone_number: &str) -> Option<String> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(phone_number)
            .cloned()
    }
}

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<String, SmsError> {
        if self.fail.load(Ordering::SeqCst) {
            warn!(phone = %mask_phone_number(phone_number), "Simulating SMS delivery failure");
            return Err(SmsError::Delivery("simulated failure".into()));
        }

        let message_id = format!("log-{}", Uuid::new_v4());
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(phone_number.to_string(), message.to_string());

        info!(
            phone = %mask_phone_number(phone_number),
            message_id = %message_id,
            "SMS (not sent): {}",
            message
        );
        Ok(message_id)
    }

    fn provider_name(&self) -> &'static str {
        "log"
    }
}
