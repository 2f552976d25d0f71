#![allow(clippy::unwrap_used, clippy::expect_used)]
//! reCAPTCHA validation with a stand-in verifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formgate_kernel::captcha::{
    CaptchaError, CaptchaVerifier, RESPONSE_FIELD, recaptcha_field,
};
use formgate_kernel::{Field, Form, FormError};
use formgate_test_utils::{TestRequest, no_csrf_config};
use parking_lot::Mutex;
use serde_json::json;

/// Records every call; accepts the response `"human"` only.
#[derive(Default)]
struct FakeVerifier {
    calls: Mutex<Vec<(String, String, Option<String>)>>,
}

#[async_trait]
impl CaptchaVerifier for FakeVerifier {
    async fn verify(
        &self,
        secret: &str,
        response: &str,
        remote_ip: Option<&str>,
    ) -> Result<(), CaptchaError> {
        // Suspend for real so a caller that does not await sees nothing.
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.calls.lock().push((
            secret.to_string(),
            response.to_string(),
            remote_ip.map(str::to_string),
        ));
        if response == "human" {
            Ok(())
        } else {
            Err(CaptchaError::Rejected(vec![
                "The response parameter is invalid or malformed.".to_string(),
            ]))
        }
    }
}

fn signup(verifier: &Arc<FakeVerifier>) -> formgate_kernel::FormBuilder {
    Form::builder("signup")
        .field(Field::string("email"))
        .field(recaptcha_field("captcha", verifier.clone()))
}

fn submission() -> TestRequest {
    TestRequest::post()
        .config(no_csrf_config())
        .setting("RECAPTCHA_PRIVATE_KEY", "private")
        .field("email", "a@example.com")
}

#[tokio::test]
async fn test_valid_response_passes() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(submission().field(RESPONSE_FIELD, "human").build())
        .unwrap();

    assert!(form.validate_on_submit_async().await.unwrap());
    let calls = verifier.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "private");
    assert_eq!(calls[0].1, "human");
}

#[tokio::test]
async fn test_rejected_response_is_awaited_and_recorded() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(submission().field(RESPONSE_FIELD, "robot").build())
        .unwrap();

    assert!(!form.validate_on_submit_async().await.unwrap());
    assert_eq!(
        form.field("captcha").unwrap().errors(),
        ["The response parameter is invalid or malformed."]
    );
    assert_eq!(verifier.calls.lock().len(), 1);
}

#[tokio::test]
async fn test_missing_response() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier).bind(submission().build()).unwrap();

    assert!(!form.validate_async().await.unwrap());
    assert_eq!(
        form.field("captcha").unwrap().errors(),
        ["The response parameter is missing."]
    );
    assert!(verifier.calls.lock().is_empty());
}

#[tokio::test]
async fn test_missing_secret() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(
            TestRequest::post()
                .config(no_csrf_config())
                .field(RESPONSE_FIELD, "human")
                .build(),
        )
        .unwrap();

    assert!(!form.validate_async().await.unwrap());
    assert_eq!(
        form.field("captcha").unwrap().errors(),
        ["The secret parameter is missing."]
    );
}

#[tokio::test]
async fn test_response_from_json_body() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(submission().json(json!({ RESPONSE_FIELD: "human" })).build())
        .unwrap();

    assert!(form.validate_async().await.unwrap());
    assert_eq!(verifier.calls.lock()[0].1, "human");
}

#[tokio::test]
async fn test_testing_mode_skips_verification() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(submission().setting("TESTING", true).build())
        .unwrap();

    assert!(form.validate_async().await.unwrap());
    assert!(verifier.calls.lock().is_empty());
}

#[tokio::test]
async fn test_captcha_field_refuses_the_sync_path() {
    let verifier = Arc::new(FakeVerifier::default());
    let mut form = signup(&verifier)
        .bind(submission().field(RESPONSE_FIELD, "human").build())
        .unwrap();

    let err = form.validate().unwrap_err();
    assert!(matches!(err, FormError::AsyncInSyncPath { ref field, .. } if field == "captcha"));
    assert!(verifier.calls.lock().is_empty());
}
