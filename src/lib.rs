//! SMS Registration Service Library
//!
//! This library provides the core functionality for the SMS registration
//! service: one-time verification codes delivered by SMS, username
//! availability checks and account registration against an identity provider.
//!
//! # Modules
//! - `verification`: issuing and validating time-boxed single-use codes
//! - `sms`: SMS delivery via AWS SNS, Twilio, or a logging sender
//! - `identity`: account directory via AWS Cognito or a fixture
//! - `api`: HTTP routes and handlers
//! - `config`: Configuration management
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use sms_registration::{
//!     api::{self, ApiSettings, AppState},
//!     config::Config,
//!     identity, sms,
//!     verification::{VerificationConfig, VerificationService},
//! };
//!
//! async fn setup_service() -> anyhow::Result<axum::Router> {
//!     let config = Config::new()?;
//!     let verification = VerificationConfig::from(&config.verification);
//!     let state = AppState {
//!         verification: Arc::new(VerificationService::new(verification)),
//!         sms: sms::from_config(&config.sms).await?,
//!         identity: identity::from_config(&config.identity).await?,
//!         settings: Arc::new(ApiSettings::from(&config.verification)),
//!     };
//!     Ok(api::router(state))
//! }
//! ```
//!
//! # Copyright
//! Copyright (c) 2025 Signal Messenger, LLC
//! All rights reserved.
//!
//! # License
//! Licensed under the AGPLv3 license.

pub mod api;
pub mod config;
pub mod identity;
pub mod sms;
pub mod verification;
