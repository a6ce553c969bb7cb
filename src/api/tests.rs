use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracing_test::traced_test;

use super::*;
use crate::identity::{self, FixtureIdentityProvider, MockIdentityProvider};
use crate::sms::{LogSmsSender, MockSmsSender, SmsError};
use crate::verification::VerificationConfig;

const PHONE: &str = "+821012345678";

struct Harness {
    app: Router,
    outbox: Arc<LogSmsSender>,
    verification: Arc<VerificationService>,
}

impl Harness {
    fn new() -> Self {
        let outbox = Arc::new(LogSmsSender::new());
        let identity = Arc::new(FixtureIdentityProvider::new(["admin", "test", "user"]));
        Self::with(outbox.clone(), outbox, identity, ApiSettings::default())
    }

    fn with(
        outbox: Arc<LogSmsSender>,
        sms: Arc<dyn SmsSender>,
        identity: Arc<dyn IdentityProvider>,
        settings: ApiSettings,
    ) -> Self {
        let verification = Arc::new(VerificationService::new(VerificationConfig::default()));
        let app = router(AppState {
            verification: verification.clone(),
            sms,
            identity,
            settings: Arc::new(settings),
        });
        Self {
            app,
            outbox,
            verification,
        }
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn delivered_code(&self, phone: &str) -> String {
        let message = self.outbox.last_message_for(phone).expect("no SMS delivered");
        message.rsplit(' ').next().unwrap().to_string()
    }
}

fn failing_sms() -> Arc<dyn SmsSender> {
    let mut sms = MockSmsSender::new();
    sms.expect_send()
        .returning(|_, _| Err(SmsError::Delivery("provider unavailable".into())));
    sms.expect_provider_name().return_const("mock");
    Arc::new(sms)
}

#[tokio::test]
#[traced_test]
async fn send_then_verify_then_replay() {
    let h = Harness::new();

    let (status, body) = h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Verification code sent successfully" }));

    let code = h.delivered_code(PHONE);
    assert_eq!(code.len(), 6);

    let verify = json!({ "phone_number": PHONE, "verification_code": code });
    let (status, body) = h.post("/api/verify-sms", verify.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "Verification successful" }));

    let (status, body) = h.post("/api/verify-sms", verify).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Invalid verification code"));

    assert!(logs_contain("Sending verification code"));
    assert!(!logs_contain(PHONE));
}

#[tokio::test]
async fn wrong_code_can_be_retried() {
    let h = Harness::new();
    h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;
    let code = h.delivered_code(PHONE);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (status, _) = h
        .post("/api/verify-sms", json!({ "phone_number": PHONE, "verification_code": wrong }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .post("/api/verify-sms", json!({ "phone_number": PHONE, "verification_code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn send_sms_requires_phone_number() {
    let h = Harness::new();

    for body in [json!({}), json!({ "phone_number": "" })] {
        let (status, body) = h.post("/api/send-sms", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "Phone number is required" }));
    }
    assert_eq!(h.verification.pending(), 0);
}

#[tokio::test]
async fn send_sms_accepts_optional_user_fields() {
    let h = Harness::new();
    let (status, _) = h
        .post(
            "/api/send-sms",
            json!({
                "phone_number": PHONE,
                "user_email": "minji@example.com",
                "user_name": "Minji"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn verify_sms_requires_both_fields() {
    let h = Harness::new();
    let (status, body) = h.post("/api/verify-sms", json!({ "phone_number": PHONE })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Phone number and verification code are required"));
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let h = Harness::new();
    let (status, body) = h
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/send-sms")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn delivery_failure_returns_500_and_revokes_code() {
    let outbox = Arc::new(LogSmsSender::new());
    let h = Harness::with(
        outbox,
        failing_sms(),
        Arc::new(FixtureIdentityProvider::default()),
        ApiSettings::default(),
    );

    let (status, body) = h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "error": "Failed to send verification code" }));
    assert_eq!(h.verification.pending(), 0);
}

#[tokio::test]
async fn delivery_failure_keeps_code_when_revocation_disabled() {
    let h = Harness::with(
        Arc::new(LogSmsSender::new()),
        failing_sms(),
        Arc::new(FixtureIdentityProvider::default()),
        ApiSettings {
            revoke_on_delivery_failure: false,
            ..ApiSettings::default()
        },
    );

    let (status, _) = h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.verification.pending(), 1);
}

#[tokio::test]
async fn short_username_is_unavailable() {
    let h = Harness::new();
    let (status, body) = h.post("/api/check-username", json!({ "username": "ab" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["isAvailable"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("at least 3"));
}

#[tokio::test]
async fn check_username_reports_taken_and_free_names() {
    let h = Harness::new();

    let (status, body) = h.post("/api/check-username", json!({ "username": "admin" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAvailable"], json!(false));
    assert_eq!(body["message"], json!("Username is already taken"));

    let (_, body) = h.post("/api/check-username", json!({ "username": "minji" })).await;
    assert_eq!(body["isAvailable"], json!(true));
    assert_eq!(body["message"], json!("Username is available"));

    let (status, _) = h.post("/api/check-username", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn check_username_provider_failure_is_500() {
    let mut provider = MockIdentityProvider::new();
    provider
        .expect_account_exists()
        .returning(|_| Err(identity::Error::Service("connection reset".into())));
    let h = Harness::with(
        Arc::new(LogSmsSender::new()),
        Arc::new(LogSmsSender::new()),
        Arc::new(provider),
        ApiSettings::default(),
    );

    let (status, body) = h.post("/api/check-username", json!({ "username": "minji" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn register_then_name_is_taken() {
    let h = Harness::new();
    let request = json!({
        "username": "minji",
        "password": "Passw0rd!",
        "name": "Kim Minji",
        "phone": PHONE,
    });

    let (status, body) = h.post("/api/register", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("User registered successfully"));
    assert_eq!(body["user"], json!({ "username": "minji", "name": "Kim Minji" }));

    let (status, body) = h.post("/api/register", request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Username is already taken"));

    let (_, body) = h.post("/api/check-username", json!({ "username": "minji" })).await;
    assert_eq!(body["isAvailable"], json!(false));
}

#[tokio::test]
async fn register_requires_all_fields() {
    let h = Harness::new();
    let (status, body) = h
        .post(
            "/api/register",
            json!({ "username": "minji", "password": "Passw0rd!", "name": "Kim Minji" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Username, password, name and phone are required"));
}

#[tokio::test]
async fn register_passes_attributes_to_provider() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_account_exists().returning(|_| Ok(false));
    provider
        .expect_register_account()
        .withf(|username, password, attributes| {
            username == "minji"
                && password == "Passw0rd!"
                && attributes.phone_number == PHONE
                && attributes.email.as_deref() == Some("minji@example.com")
        })
        .times(1)
        .returning(|_, _, _| Ok("sub-123".to_string()));
    let h = Harness::with(
        Arc::new(LogSmsSender::new()),
        Arc::new(LogSmsSender::new()),
        Arc::new(provider),
        ApiSettings::default(),
    );

    let (status, _) = h
        .post(
            "/api/register",
            json!({
                "username": "minji",
                "password": "Passw0rd!",
                "name": "Kim Minji",
                "phone": PHONE,
                "email": "minji@example.com",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn find_username_consumes_code() {
    let h = Harness::new();
    h.post(
        "/api/register",
        json!({
            "username": "minji",
            "password": "Passw0rd!",
            "name": "Kim Minji",
            "phone": PHONE
        }),
    )
    .await;

    h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;
    let request = json!({ "phone_number": PHONE, "verification_code": h.delivered_code(PHONE) });

    let (status, body) = h.post("/api/find-username", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "username": "minji" }));

    let (status, _) = h.post("/api/find-username", request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn find_username_without_account_is_404() {
    let h = Harness::new();
    h.post("/api/send-sms", json!({ "phone_number": PHONE })).await;

    let (status, body) = h
        .post(
            "/api/find-username",
            json!({ "phone_number": PHONE, "verification_code": h.delivered_code(PHONE) }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn password_reset_flow() {
    let h = Harness::new();

    let (status, body) = h.post("/api/forgot-password", json!({ "username": "admin" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Password reset code sent"));

    let (status, body) = h
        .post(
            "/api/confirm-forgot-password",
            json!({
                "username": "admin",
                "confirmation_code": "123456",
                "new_password": "N3w-pass!"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Password has been reset"));

    let (status, _) = h.post("/api/forgot-password", json!({ "username": "nobody" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .post("/api/confirm-forgot-password", json!({ "username": "admin" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_probe() {
    let h = Harness::new();
    let (status, body) = h
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}
