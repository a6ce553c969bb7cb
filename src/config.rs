//! Configuration Module
//!
//! Provides configuration management for the SMS registration service.
//! Values are layered from built-in defaults, an optional YAML file and
//! `APP_`-prefixed environment variables (nested keys joined with `__`,
//! e.g. `APP_SERVER__PORT=8080`).
//!
//! # Copyright
//! Copyright (c) 2025 Signal Messenger, LLC
//! All rights reserved.
//!
//! # License
//! Licensed under the AGPLv3 license.
//! Please see the LICENSE file in the root directory for details.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use config::{Config as ConfigFile, Environment, File};

/// Default location of the YAML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/application.yml";

/// Longest accepted verification code lifetime (one year)
pub const MAX_TTL_SECS: u64 = 86_400 * 365;

/// Application metadata configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Application {
    /// Name of the application
    pub name: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl ServerConfig {
    /// Socket address string suitable for `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

/// Verification code settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationSettings {
    /// Number of digits in a generated code
    pub code_length: usize,
    /// Lifetime of an issued code in seconds
    pub ttl_secs: u64,
    /// Interval of the background purge of expired codes; 0 disables it
    pub sweep_interval_secs: u64,
    /// Drop the issued code again when SMS delivery fails
    pub revoke_on_delivery_failure: bool,
    /// SMS body; `{code}` is replaced with the verification code
    pub message_template: String,
}

/// Supported SMS delivery backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    /// AWS Simple Notification Service
    Sns,
    /// Twilio Programmable Messaging
    Twilio,
    /// Log messages instead of sending them
    Log,
}

/// AWS SNS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnsConfig {
    /// AWS region
    pub region: String,
    /// Alphanumeric sender ID, where the destination supports it
    pub sender_id: Option<String>,
    /// `Transactional` or `Promotional`
    pub sms_type: Option<String>,
}

/// Twilio configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwilioConfig {
    /// Twilio account SID
    pub account_sid: String,
    /// Twilio auth token
    pub auth_token: String,
    /// Sending phone number in E.164 format
    pub from_number: String,
    /// API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// SMS delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsConfig {
    /// Active backend
    pub provider: SmsProvider,
    /// SNS settings, required when `provider` is `sns`
    pub sns: Option<SnsConfig>,
    /// Twilio settings, required when `provider` is `twilio`
    pub twilio: Option<TwilioConfig>,
}

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    /// AWS Cognito user pool
    Cognito,
    /// In-process fixture directory
    Fixture,
}

/// AWS Cognito configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CognitoConfig {
    /// AWS region of the user pool
    pub region: String,
    /// User pool ID
    pub user_pool_id: String,
    /// App client ID
    pub client_id: String,
}

/// Fixture directory configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FixtureConfig {
    /// Usernames reported as already registered
    #[serde(default)]
    pub taken_usernames: Vec<String>,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Active provider
    pub provider: IdentityProviderKind,
    /// Cognito settings, required when `provider` is `cognito`
    pub cognito: Option<CognitoConfig>,
    /// Fixture settings
    #[serde(default)]
    pub fixture: FixtureConfig,
}

/// Application configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Application metadata
    pub application: Application,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Verification code configuration
    pub verification: VerificationSettings,
    /// SMS delivery configuration
    pub sms: SmsConfig,
    /// Identity provider configuration
    pub identity: IdentityConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Missing required config value: {0}")]
    MissingConfig(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Config {
    /// Creates a new Config instance by loading and merging configuration from multiple sources.
    ///
    /// # Configuration Sources
    /// Later sources override earlier ones:
    /// 1. Built-in defaults
    /// 2. `config/application.yml`, if present
    /// 3. Environment variables (prefixed with `APP_`)
    ///
    /// # Errors
    /// Returns a `ConfigError` if values cannot be parsed or fail validation.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(DEFAULT_CONFIG_PATH, Self::environment())
    }

    /// Loads configuration from the given file path and environment source.
    pub fn load(path: &str, environment: Environment) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults(ConfigFile::builder())?
            .add_source(File::with_name(path).required(false))
            .add_source(environment);

        let config: Config = builder
            .build()?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(builder
            .set_default("application.name", "sms-registration")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("verification.code_length", 6)?
            .set_default("verification.ttl_secs", 180)?
            .set_default("verification.sweep_interval_secs", 60)?
            .set_default("verification.revoke_on_delivery_failure", true)?
            .set_default(
                "verification.message_template",
                "Your verification code is: {code}",
            )?
            .set_default("sms.provider", "log")?
            .set_default("identity.provider", "fixture")?)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verification.code_length == 0 {
            return Err(ConfigError::InvalidValue(
                "verification.code_length must be at least 1".into(),
            ));
        }
        if self.verification.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "verification.ttl_secs must be greater than 0".into(),
            ));
        }
        if self.verification.ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "verification.ttl_secs must not exceed {}",
                MAX_TTL_SECS
            )));
        }
        if !self.verification.message_template.contains("{code}") {
            return Err(ConfigError::InvalidValue(
                "verification.message_template must contain {code}".into(),
            ));
        }
        match self.sms.provider {
            SmsProvider::Sns if self.sms.sns.is_none() => {
                return Err(ConfigError::MissingConfig("sms.sns".into()))
            }
            SmsProvider::Twilio if self.sms.twilio.is_none() => {
                return Err(ConfigError::MissingConfig("sms.twilio".into()))
            }
            _ => {}
        }
        if self.identity.provider == IdentityProviderKind::Cognito
            && self.identity.cognito.is_none()
        {
            return Err(ConfigError::MissingConfig("identity.cognito".into()));
        }
        Ok(())
    }
}
