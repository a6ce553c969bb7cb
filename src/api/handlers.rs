//! Request handlers.
//!
//! Each handler validates its JSON body, calls the verification service and/or
//! one collaborator, and maps the outcome to a JSON response. Collaborator
//! calls happen after `issue`/`validate` return, so the code store lock is
//! never held across I/O.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error::ApiError;
use super::AppState;
use crate::identity::AccountAttributes;
use crate::sms::{mask_phone_number, render_message};

pub const MIN_USERNAME_LENGTH: usize = 3;

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub phone_number: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifySmsRequest {
    pub phone_number: Option<String>,
    pub verification_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmForgotPasswordRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckUsernameResponse {
    pub success: bool,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindUsernameResponse {
    pub success: bool,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Treats absent and empty values alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    present(value).ok_or_else(|| ApiError::Validation(message.to_string()))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// POST /api/send-sms
pub async fn send_sms(
    State(state): State<AppState>,
    payload: Result<Json<SendSmsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let phone_number = required(req.phone_number, "Phone number is required")?;

    info!(
        phone = %mask_phone_number(&phone_number),
        user_email = req.user_email.as_deref().unwrap_or(""),
        user_name = req.user_name.as_deref().unwrap_or(""),
        "Sending verification code"
    );

    let code = state.verification.issue(&phone_number);
    let message = render_message(&state.settings.message_template, &code);

    if let Err(e) = state.sms.send(&phone_number, &message).await {
        error!(
            phone = %mask_phone_number(&phone_number),
            provider = state.sms.provider_name(),
            error = %e,
            "Failed to deliver verification code"
        );
        if state.settings.revoke_on_delivery_failure {
            state.verification.revoke(&phone_number, &code);
        }
        return Err(ApiError::External("Failed to send verification code".into()));
    }

    Ok(MessageResponse::ok("Verification code sent successfully"))
}

/// POST /api/verify-sms
pub async fn verify_sms(
    State(state): State<AppState>,
    payload: Result<Json<VerifySmsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let missing = "Phone number and verification code are required";
    let phone_number = required(req.phone_number, missing)?;
    let code = required(req.verification_code, missing)?;

    info!(phone = %mask_phone_number(&phone_number), "Verifying code");

    if !state.verification.validate(&phone_number, &code) {
        warn!(phone = %mask_phone_number(&phone_number), "Verification failed");
        return Err(ApiError::InvalidCredential("Invalid verification code".into()));
    }

    Ok(MessageResponse::ok("Verification successful"))
}

/// POST /api/check-username
pub async fn check_username(
    State(state): State<AppState>,
    payload: Result<Json<CheckUsernameRequest>, JsonRejection>,
) -> Result<Json<CheckUsernameResponse>, ApiError> {
    let Json(req) = payload?;
    let username = required(req.username, "Username is required")?;

    let (is_available, message) = if username.chars().count() < MIN_USERNAME_LENGTH {
        (false, format!("Username must be at least {} characters long", MIN_USERNAME_LENGTH))
    } else if state.identity.account_exists(&username).await.map_err(|e| {
        error!(username = %username, error = %e, "Username lookup failed");
        ApiError::from(e)
    })? {
        (false, "Username is already taken".to_string())
    } else {
        (true, "Username is available".to_string())
    };

    info!(username = %username, is_available, "Checked username");

    Ok(Json(CheckUsernameResponse {
        success: true,
        is_available,
        message,
    }))
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(req) = payload?;
    let missing = "Username, password, name and phone are required";
    let username = required(req.username, missing)?;
    let password = required(req.password, missing)?;
    let name = required(req.name, missing)?;
    let phone_number = required(req.phone, missing)?;

    let log_failure = |e: crate::identity::Error| {
        error!(username = %username, error = %e, "Registration failed");
        ApiError::from(e)
    };

    if state.identity.account_exists(&username).await.map_err(log_failure)? {
        warn!(username = %username, "Registration rejected, username taken");
        return Err(ApiError::UsernameTaken);
    }

    let attributes = AccountAttributes {
        name: name.clone(),
        phone_number,
        email: present(req.email),
    };
    let account_id = state
        .identity
        .register_account(&username, &password, &attributes)
        .await
        .map_err(log_failure)?;

    info!(username = %username, account_id = %account_id, "User registered");

    Ok(Json(RegisterResponse {
        success: true,
        message: "User registered successfully".to_string(),
        user: RegisteredUser { username, name },
    }))
}

/// POST /api/find-username
///
/// Consumes the verification code before looking the account up.
pub async fn find_username(
    State(state): State<AppState>,
    payload: Result<Json<VerifySmsRequest>, JsonRejection>,
) -> Result<Json<FindUsernameResponse>, ApiError> {
    let Json(req) = payload?;
    let missing = "Phone number and verification code are required";
    let phone_number = required(req.phone_number, missing)?;
    let code = required(req.verification_code, missing)?;

    if !state.verification.validate(&phone_number, &code) {
        return Err(ApiError::InvalidCredential("Invalid verification code".into()));
    }

    let username = state
        .identity
        .find_username_by_phone(&phone_number)
        .await
        .map_err(|e| {
            error!(
                phone = %mask_phone_number(&phone_number),
                error = %e,
                "Account lookup failed"
            );
            ApiError::from(e)
        })?
        .ok_or_else(|| {
            ApiError::NotFound("No account is registered with this phone number".into())
        })?;

    Ok(Json(FindUsernameResponse {
        success: true,
        username,
    }))
}

/// POST /api/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let username = required(req.username, "Username is required")?;

    state.identity.start_password_reset(&username).await.map_err(|e| {
        error!(username = %username, error = %e, "Password reset failed");
        ApiError::from(e)
    })?;

    Ok(MessageResponse::ok("Password reset code sent"))
}

/// POST /api/confirm-forgot-password
pub async fn confirm_forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let missing = "Username, confirmation code and new password are required";
    let username = required(req.username, missing)?;
    let code = required(req.confirmation_code, missing)?;
    let new_password = required(req.new_password, missing)?;

    state
        .identity
        .confirm_password_reset(&username, &code, &new_password)
        .await
        .map_err(|e| {
            error!(username = %username, error = %e, "Password reset confirmation failed");
            ApiError::from(e)
        })?;

    Ok(MessageResponse::ok("Password has been reset"))
}
