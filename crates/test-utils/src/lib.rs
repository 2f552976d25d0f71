//! formgate test utilities.
//!
//! Request fixtures and a small set of canned validators for integration
//! testing forms: one of each kind (sync/async, always/conditionally
//! failing), so a test can mix them and compare the two validation paths.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formgate_kernel::{
    AppConfig, AsyncValidator, Field, Form, FormRequest, HttpRequest, MultiDict, SessionData,
    UploadedFile, ValidationError, ValidationResult, Validator,
};
use serde_json::Value;

/// Secret used by [`test_config`].
pub const TEST_SECRET: &str = "top secret !!!";

/// Config with a secret key set, so CSRF protection can be resolved.
pub fn test_config() -> AppConfig {
    AppConfig::new().with("SECRET_KEY", TEST_SECRET)
}

/// Config with CSRF protection turned off.
pub fn no_csrf_config() -> AppConfig {
    AppConfig::new().with("WTF_CSRF_ENABLED", false)
}

/// Builder for requests to bind forms to.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: String,
    config: AppConfig,
    form: MultiDict<String>,
    files: Option<MultiDict<UploadedFile>>,
    session: Option<SessionData>,
    json: Option<Value>,
}

impl TestRequest {
    /// A request with the given method and [`test_config`].
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            config: test_config(),
            form: MultiDict::new(),
            files: None,
            session: Some(SessionData::new()),
            json: None,
        }
    }

    pub fn get() -> Self {
        Self::new("GET")
    }

    pub fn post() -> Self {
        Self::new("POST")
    }

    /// Replace the application config.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Set (or override) a single config value.
    pub fn setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.set(key, value);
        self
    }

    /// Add a form value.
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.form.append(name, value.to_string());
        self
    }

    /// Add an uploaded file.
    pub fn file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.get_or_insert_with(MultiDict::new).append(name, file);
        self
    }

    /// Attach the given session instead of a fresh one.
    pub fn session(mut self, session: &SessionData) -> Self {
        self.session = Some(session.clone());
        self
    }

    /// Send the request without any session.
    pub fn without_session(mut self) -> Self {
        self.session = None;
        self
    }

    /// Set a JSON body.
    pub fn json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// The request as the forms see it.
    pub fn build(self) -> Arc<dyn FormRequest> {
        let mut request =
            HttpRequest::new(self.method, Arc::new(self.config)).with_form(self.form);
        if let Some(files) = self.files {
            request = request.with_files(files);
        }
        if let Some(session) = self.session {
            request = request.with_context("session", session);
        }
        if let Some(json) = self.json {
            request = request.with_json(json);
        }
        Arc::new(request)
    }
}

/// Issue a CSRF token for `session`, the way a rendered form would.
pub fn csrf_token_for(session: &SessionData) -> String {
    Form::builder("token_issuer")
        .bind(TestRequest::get().session(session).build())
        .ok()
        .and_then(|form| form.csrf_token())
        .unwrap_or_default()
}

fn field_text(field: &Field) -> &str {
    field.data().as_text().unwrap_or_default()
}

struct AsyncConditionallyFail;

#[async_trait]
impl AsyncValidator for AsyncConditionallyFail {
    async fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        tokio::task::yield_now().await;
        if field_text(field) == "fail" {
            return Err(ValidationError::invalid("async validation failed"));
        }
        Ok(())
    }
}

struct AsyncAlwaysPass;

#[async_trait]
impl AsyncValidator for AsyncAlwaysPass {
    async fn validate(&self, _form: &Form, _field: &Field) -> ValidationResult {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }
}

/// Async validator failing when the field holds `"fail"`.
pub fn async_conditionally_fail() -> Validator {
    Validator::asynchronous(AsyncConditionallyFail)
}

/// Async validator that sleeps briefly and passes.
pub fn async_always_pass() -> Validator {
    Validator::asynchronous(AsyncAlwaysPass)
}

/// Sync validator that always fails.
pub fn sync_always_fail() -> Validator {
    Validator::from_fn(|_, _| Err(ValidationError::invalid("sync validation failed")))
}

/// Sync validator failing when the field holds `"fail"`.
pub fn sync_conditionally_fail() -> Validator {
    Validator::from_fn(|_, field| {
        if field_text(field) == "fail" {
            Err(ValidationError::invalid("sync validation failed"))
        } else {
            Ok(())
        }
    })
}
