//! HTTP interface.
//!
//! Exposes the verification and account endpoints under `/api` with
//! permissive CORS, plus a `/health` probe.

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::VerificationSettings;
use crate::identity::IdentityProvider;
use crate::sms::SmsSender;
use crate::verification::VerificationService;

pub use error::ApiError;

/// Handler-level settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// SMS body with a `{code}` placeholder
    pub message_template: String,
    /// Revoke an issued code when its delivery fails
    pub revoke_on_delivery_failure: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            message_template: "Your verification code is: {code}".to_string(),
            revoke_on_delivery_failure: true,
        }
    }
}

impl From<&VerificationSettings> for ApiSettings {
    fn from(settings: &VerificationSettings) -> Self {
        Self {
            message_template: settings.message_template.clone(),
            revoke_on_delivery_failure: settings.revoke_on_delivery_failure,
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub verification: Arc<VerificationService>,
    pub sms: Arc<dyn SmsSender>,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<ApiSettings>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/send-sms", post(handlers::send_sms))
        .route("/verify-sms", post(handlers::verify_sms))
        .route("/check-username", post(handlers::check_username))
        .route("/register", post(handlers::register))
        .route("/find-username", post(handlers::find_username))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/confirm-forgot-password", post(handlers::confirm_forgot_password));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests;
