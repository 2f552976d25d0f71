//! reCAPTCHA verification and widget markup.
//!
//! The validator is asynchronous: it posts the visitor's response token to
//! the siteverify endpoint and records a field error when Google rejects
//! it. Settings come from the request's config (`RECAPTCHA_*`); `TESTING`
//! set to `true` skips verification entirely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::form::{Field, Form};
use crate::markup::html_escape;
use crate::validation::{AsyncValidator, ValidationError, ValidationResult, Validator};

/// Google's verification endpoint.
pub const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Script providing the widget.
pub const SCRIPT_URL: &str = "https://www.google.com/recaptcha/api.js";

/// Form (or JSON) key the widget submits its token under.
pub const RESPONSE_FIELD: &str = "g-recaptcha-response";

/// Timeout for one verification request.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a response token was not accepted.
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// Google answered and rejected the token.
    #[error("{}", .0.join(" "))]
    Rejected(Vec<String>),

    /// The verification request itself failed.
    #[error("reCAPTCHA verification request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Checks a response token with the CAPTCHA provider.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(
        &self,
        secret: &str,
        response: &str,
        remote_ip: Option<&str>,
    ) -> Result<(), CaptchaError>;
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// HTTP client for the siteverify endpoint.
#[derive(Debug, Clone)]
pub struct RecaptchaClient {
    client: reqwest::Client,
    url: String,
}

impl Default for RecaptchaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RecaptchaClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to build reCAPTCHA client, verifying without a timeout");
                reqwest::Client::new()
            });

        Self {
            client,
            url: VERIFY_URL.to_string(),
        }
    }

    /// Verify against another endpoint (a stub server in tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaClient {
    async fn verify(
        &self,
        secret: &str,
        response: &str,
        remote_ip: Option<&str>,
    ) -> Result<(), CaptchaError> {
        let mut params = vec![("secret", secret), ("response", response)];
        if let Some(ip) = remote_ip {
            params.push(("remoteip", ip));
        }

        let reply: SiteVerifyResponse = self
            .client
            .post(&self.url)
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if reply.success {
            debug!("reCAPTCHA response verified");
            return Ok(());
        }

        let messages = if reply.error_codes.is_empty() {
            vec![error_message("").to_string()]
        } else {
            reply
                .error_codes
                .iter()
                .map(|code| error_message(code).to_string())
                .collect()
        };
        Err(CaptchaError::Rejected(messages))
    }
}

/// Human readable message for a siteverify error code.
fn error_message(code: &str) -> &'static str {
    match code {
        "missing-input-secret" => "The secret parameter is missing.",
        "invalid-input-secret" => "The secret parameter is invalid or malformed.",
        "missing-input-response" => "The response parameter is missing.",
        "invalid-input-response" => "The response parameter is invalid or malformed.",
        "bad-request" => "The request is invalid or malformed.",
        "timeout-or-duplicate" => {
            "The response is no longer valid: either is too old or has been used previously."
        }
        _ => "The reCAPTCHA response could not be verified.",
    }
}

/// Asynchronous validator checking the submitted reCAPTCHA response.
#[derive(Clone)]
pub struct RecaptchaValidator {
    verifier: Arc<dyn CaptchaVerifier>,
}

impl RecaptchaValidator {
    pub fn new(verifier: Arc<dyn CaptchaVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl AsyncValidator for RecaptchaValidator {
    async fn validate(&self, form: &Form, _field: &Field) -> ValidationResult {
        let Some(request) = form.request() else {
            return Err(ValidationError::invalid("The response parameter is missing."));
        };
        let config = request.config();
        if config.get("TESTING") == Some(&Value::Bool(true)) {
            debug!(form = %form.name(), "TESTING set, skipping reCAPTCHA");
            return Ok(());
        }

        let response = request
            .form()
            .get(RESPONSE_FIELD)
            .map(String::as_str)
            .filter(|response| !response.is_empty())
            .or_else(|| {
                request
                    .json()
                    .and_then(|json| json.get(RESPONSE_FIELD))
                    .and_then(Value::as_str)
            });
        let Some(response) = response else {
            return Err(ValidationError::invalid("The response parameter is missing."));
        };

        let Some(secret) = config
            .get_string("RECAPTCHA_PRIVATE_KEY")
            .filter(|secret| !secret.is_empty())
        else {
            return Err(ValidationError::invalid("The secret parameter is missing."));
        };

        self.verifier
            .verify(&secret, response, request.remote_addr())
            .await
            .map_err(|err| {
                warn!(form = %form.name(), error = %err, "reCAPTCHA verification failed");
                ValidationError::invalid(err.to_string())
            })
    }
}

impl From<RecaptchaValidator> for Validator {
    fn from(validator: RecaptchaValidator) -> Self {
        Validator::asynchronous(validator)
    }
}

/// A captcha field validated by [`RecaptchaValidator`].
pub fn recaptcha_field(name: impl Into<String>, verifier: Arc<dyn CaptchaVerifier>) -> Field {
    Field::captcha(name).validator(RecaptchaValidator::new(verifier))
}

/// Render the reCAPTCHA script tag and widget for the configured site key.
pub fn render_recaptcha(config: &AppConfig) -> String {
    format!("{}\n{}", render_script(config), render_widget(config))
}

fn render_script(config: &AppConfig) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, param) in [
        ("RECAPTCHA_ONLOAD", "onload"),
        ("RECAPTCHA_RENDER", "render"),
        ("RECAPTCHA_LANGUAGE", "hl"),
    ] {
        if let Some(value) = config.get_string(key) {
            query.append_pair(param, &value);
        }
    }
    let query = query.finish();

    let mut src = SCRIPT_URL.to_string();
    if !query.is_empty() {
        src.push('?');
        src.push_str(&query);
    }

    let mut tag = format!("<script src=\"{}\"", html_escape(&src));
    if config.get_bool("RECAPTCHA_ASYNC", true) {
        tag.push_str(" async");
    }
    if config.get_bool("RECAPTCHA_DEFER", true) {
        tag.push_str(" defer");
    }
    tag.push_str("></script>");
    tag
}

fn render_widget(config: &AppConfig) -> String {
    let mut div = format!(
        "<div class=\"g-recaptcha\" data-sitekey=\"{}\"",
        html_escape(config.get_str("RECAPTCHA_PUBLIC_KEY", ""))
    );
    for (key, attribute) in [
        ("RECAPTCHA_THEME", "data-theme"),
        ("RECAPTCHA_BADGE", "data-badge"),
        ("RECAPTCHA_SIZE", "data-size"),
        ("RECAPTCHA_TYPE", "data-type"),
        ("RECAPTCHA_TABINDEX", "data-tabindex"),
        ("RECAPTCHA_CALLBACK", "data-callback"),
        ("RECAPTCHA_EXPIRED_CALLBACK", "data-expired-callback"),
        ("RECAPTCHA_ERROR_CALLBACK", "data-error-callback"),
    ] {
        if let Some(value) = config.get_string(key) {
            div.push_str(&format!(" {attribute}=\"{}\"", html_escape(&value)));
        }
    }
    div.push_str("></div>");
    div
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_messages() {
        assert_eq!(error_message("missing-input-response"), "The response parameter is missing.");
        assert_eq!(error_message("bad-request"), "The request is invalid or malformed.");
        assert_eq!(error_message("???"), "The reCAPTCHA response could not be verified.");

        let err = CaptchaError::Rejected(vec![
            "The secret parameter is missing.".to_string(),
            "The response parameter is missing.".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "The secret parameter is missing. The response parameter is missing."
        );
    }

    #[test]
    fn test_widget_renders() {
        let config = AppConfig::new()
            .with("RECAPTCHA_PUBLIC_KEY", "pubkey")
            .with("RECAPTCHA_THEME", "dark")
            .with("RECAPTCHA_LANGUAGE", "de")
            .with("RECAPTCHA_DEFER", false);
        let html = render_recaptcha(&config);

        assert!(html.contains("<script src=\"https://www.google.com/recaptcha/api.js?hl=de\" async>"));
        assert!(html.contains("<div class=\"g-recaptcha\" data-sitekey=\"pubkey\" data-theme=\"dark\">"));
        assert!(!html.contains("defer"));
    }

    #[test]
    fn test_widget_escapes_config_values() {
        let config = AppConfig::new()
            .with("RECAPTCHA_PUBLIC_KEY", "\"><script>")
            .with("RECAPTCHA_ONLOAD", "a&b");
        let html = render_recaptcha(&config);

        assert!(html.contains("data-sitekey=\"&quot;&gt;&lt;script&gt;\""));
        assert!(html.contains("onload=a%26b"));
        assert!(html.contains("async defer"));
    }

    #[test]
    fn test_recaptcha_field_has_async_validator() {
        let field = recaptcha_field("captcha", Arc::new(RecaptchaClient::new()));
        assert_eq!(field.validators().len(), 1);
        assert!(field.validators()[0].is_async());
    }
}
