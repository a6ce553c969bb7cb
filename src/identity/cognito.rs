//! AWS Cognito user pool provider.
//!
//! Existence checks use `AdminGetUser` and therefore need IAM credentials
//! allowed on the pool; sign-up and password reset use the public app client.

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::Region;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client as AwsCognitoClient;
use tracing::{debug, error, info};

use super::{AccountAttributes, Error, IdentityProvider, Result};
use crate::config::CognitoConfig;
use crate::sms::mask_phone_number;

/// Cognito-backed account directory
#[derive(Clone)]
pub struct CognitoIdentityProvider {
    client: AwsCognitoClient,
    config: CognitoConfig,
}

impl CognitoIdentityProvider {
    pub async fn new(config: CognitoConfig) -> Result<Self> {
        if config.user_pool_id.is_empty() {
            return Err(Error::ConfigError("User pool ID is required".into()));
        }
        if config.client_id.is_empty() {
            return Err(Error::ConfigError("Client ID is required".into()));
        }

        let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()));
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        info!(
            region = %config.region,
            user_pool_id = %config.user_pool_id,
            "Initialized Cognito client"
        );

        Ok(Self {
            client: AwsCognitoClient::new(&shared_config),
            config,
        })
    }

    fn attribute(name: &str, value: &str) -> Result<AttributeType> {
        AttributeType::builder()
            .name(name)
            .value(value)
            .build()
            .map_err(|e| Error::InvalidParameter(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn account_exists(&self, username: &str) -> Result<bool> {
        let result = self.client
            .admin_get_user()
            .user_pool_id(&self.config.user_pool_id)
            .username(username)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_user_not_found_exception() {
                    Ok(false)
                } else {
                    error!(username = %username, error = %err, "AdminGetUser failed");
                    Err(Error::Service(err.to_string()))
                }
            }
        }
    }

    async fn register_account(
        &self,
        username: &str,
        password: &str,
        attributes: &AccountAttributes,
    ) -> Result<String> {
        let mut request = self.client
            .sign_up()
            .client_id(&self.config.client_id)
            .username(username)
            .password(password)
            .user_attributes(Self::attribute("name", &attributes.name)?)
            .user_attributes(Self::attribute("phone_number", &attributes.phone_number)?);
        if let Some(email) = &attributes.email {
            request = request.user_attributes(Self::attribute("email", email)?);
        }

        let output = request.send().await.map_err(|e| {
            let err = e.into_service_error();
            if err.is_username_exists_exception() {
                Error::UsernameExists(username.to_string())
            } else if err.is_invalid_password_exception() || err.is_invalid_parameter_exception() {
                Error::InvalidParameter(err.to_string())
            } else {
                error!(username = %username, error = %err, "SignUp failed");
                Error::Service(err.to_string())
            }
        })?;

        let account_id = output.user_sub().to_string();
        info!(username = %username, account_id = %account_id, "Registered account");
        Ok(account_id)
    }

    async fn find_username_by_phone(&self, phone_number: &str) -> Result<Option<String>> {
        let filter = format!("phone_number = \"{}\"", phone_number.replace('"', ""));
        let output = self.client
            .list_users()
            .user_pool_id(&self.config.user_pool_id)
            .filter(filter)
            .limit(1)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                error!(
                    phone = %mask_phone_number(phone_number),
                    error = %err,
                    "ListUsers failed"
                );
                Error::Service(err.to_string())
            })?;

        let Some(user) = output.users().first() else {
            debug!(phone = %mask_phone_number(phone_number), "No account for phone number");
            return Ok(None);
        };

        let preferred = user
            .attributes()
            .iter()
            .find(|attr| attr.name() == "preferred_username")
            .and_then(|attr| attr.value());

        Ok(preferred.or(user.username()).map(str::to_string))
    }

    async fn start_password_reset(&self, username: &str) -> Result<()> {
        self.client
            .forgot_password()
            .client_id(&self.config.client_id)
            .username(username)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_user_not_found_exception() {
                    Error::UserNotFound(username.to_string())
                } else {
                    error!(username = %username, error = %err, "ForgotPassword failed");
                    Error::Service(err.to_string())
                }
            })?;

        info!(username = %username, "Started password reset");
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        self.client
            .confirm_forgot_password()
            .client_id(&self.config.client_id)
            .username(username)
            .confirmation_code(code)
            .password(new_password)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_user_not_found_exception() {
                    Error::UserNotFound(username.to_string())
                } else if err.is_code_mismatch_exception()
                    || err.is_expired_code_exception()
                    || err.is_invalid_password_exception()
                {
                    Error::InvalidParameter(err.to_string())
                } else {
                    error!(username = %username, error = %err, "ConfirmForgotPassword failed");
                    Error::Service(err.to_string())
                }
            })?;

        info!(username = %username, "Password reset confirmed");
        Ok(())
    }
}
