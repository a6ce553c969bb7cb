//! Identity provider module.
//!
//! Account lookup and registration go through [`IdentityProvider`]. Two
//! implementations exist: an AWS Cognito user pool and an in-process fixture
//! directory. Callers are never aware which one is active.

pub mod cognito;
pub mod fixture;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{IdentityConfig, IdentityProviderKind};

pub use cognito::CognitoIdentityProvider;
pub use fixture::FixtureIdentityProvider;

/// Identity provider error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Username is already registered
    #[error("Username already exists: {0}")]
    UsernameExists(String),
    /// No such account
    #[error("User not found: {0}")]
    UserNotFound(String),
    /// Provider rejected a supplied value (password policy, bad code, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Provider call failed
    #[error("Identity provider error: {0}")]
    Service(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for identity provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Attributes stored with a new account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAttributes {
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
}

/// Account directory operations the request handlers rely on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether `username` is already registered
    async fn account_exists(&self, username: &str) -> Result<bool>;

    /// Creates an account and returns its provider-assigned id
    async fn register_account(
        &self,
        username: &str,
        password: &str,
        attributes: &AccountAttributes,
    ) -> Result<String>;

    /// Username of the account holding `phone_number`, if any
    async fn find_username_by_phone(&self, phone_number: &str) -> Result<Option<String>>;

    /// Sends a password reset code to the account's registered contact
    async fn start_password_reset(&self, username: &str) -> Result<()>;

    /// Completes a password reset with the code the user received
    async fn confirm_password_reset(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()>;
}

/// Builds the provider selected by `config`.
pub async fn from_config(config: &IdentityConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.provider {
        IdentityProviderKind::Cognito => {
            let cognito = config
                .cognito
                .as_ref()
                .ok_or_else(|| Error::ConfigError("identity.cognito section is required".into()))?;
            Ok(Arc::new(CognitoIdentityProvider::new(cognito.clone()).await?))
        }
        IdentityProviderKind::Fixture => Ok(Arc::new(FixtureIdentityProvider::new(
            config.fixture.taken_usernames.iter().cloned(),
        ))),
    }
}
