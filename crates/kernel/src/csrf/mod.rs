//! CSRF settings derived from the request's application config.
//!
//! Settings are resolved once per form, when it is bound to a request, and
//! owned by that form. Nothing is shared between form instances.

mod token;

pub use token::{SESSION_SECRET_KEY, SessionCsrf};

use chrono::TimeDelta;
use tracing::{debug, warn};

use crate::error::{FormError, FormResult};
use crate::form::{Field, Form};
use crate::request::FormRequest;
use crate::session::SessionData;
use crate::validation::{SyncValidator, ValidationResult};

/// Default name of the hidden token field.
pub const DEFAULT_FIELD_NAME: &str = "csrf_token";

/// Default token lifetime in seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 1800;

/// Default name of the session-like context on the request.
pub const DEFAULT_CONTEXT_NAME: &str = "session";

/// CSRF protection settings for one form.
#[derive(Debug, Clone, Default)]
pub enum CsrfSettings {
    /// No CSRF protection; nothing else was resolved.
    #[default]
    Disabled,
    /// CSRF protection with fully resolved settings.
    Enabled(CsrfConfig),
}

/// Resolved settings for an enabled CSRF protection.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    /// Name of the hidden token field.
    pub field_name: String,
    /// Application secret keying the token signature.
    pub secret: Vec<u8>,
    /// Token lifetime; `None` means tokens never expire.
    pub time_limit: Option<TimeDelta>,
    /// Session the tokens are bound to.
    pub context: SessionData,
}

impl CsrfSettings {
    /// Derive settings from the request's application config.
    ///
    /// Without a request CSRF is disabled. When the config disables CSRF no
    /// secret, time limit or context is looked up, so a missing secret is
    /// not an error in that case.
    pub fn for_request(request: Option<&dyn FormRequest>) -> FormResult<Self> {
        Self::resolve(request, None)
    }

    /// Derive settings, letting a per-form override force CSRF on or off.
    pub fn resolve(request: Option<&dyn FormRequest>, enabled: Option<bool>) -> FormResult<Self> {
        let config = match (request, enabled) {
            (_, Some(false)) | (None, None) => return Ok(Self::Disabled),
            (None, Some(true)) => {
                return Err(FormError::MissingCsrfContext {
                    name: DEFAULT_CONTEXT_NAME.to_string(),
                });
            }
            (Some(request), _) => request.config(),
        };

        let enabled = enabled.unwrap_or_else(|| config.get_bool("WTF_CSRF_ENABLED", true));
        if !enabled {
            return Ok(Self::Disabled);
        }

        let field_name = config
            .get_str("WTF_CSRF_FIELD_NAME", DEFAULT_FIELD_NAME)
            .to_string();

        let secret = config
            .get_string("WTF_CSRF_SECRET_KEY")
            .or_else(|| config.get_string("SECRET_KEY"))
            .filter(|secret| !secret.is_empty())
            .ok_or(FormError::MissingSecret)?;

        let time_limit = match config.get_u64("WTF_CSRF_TIME_LIMIT", DEFAULT_TIME_LIMIT_SECS)? {
            None | Some(0) => None,
            Some(secs) => Some(
                i64::try_from(secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .ok_or_else(|| {
                        FormError::invalid_config("WTF_CSRF_TIME_LIMIT", "time limit is too large")
                    })?,
            ),
        };

        let context_name = config.get_str("WTF_CSRF_CONTEXT_NAME", DEFAULT_CONTEXT_NAME);
        let context = request
            .and_then(|request| request.context(context_name))
            .ok_or_else(|| FormError::MissingCsrfContext {
                name: context_name.to_string(),
            })?;

        debug!(field = %field_name, ?time_limit, "CSRF protection enabled");

        Ok(Self::Enabled(CsrfConfig {
            field_name,
            secret: secret.into_bytes(),
            time_limit,
            context,
        }))
    }

    /// Whether CSRF protection is on.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// The resolved settings, when enabled.
    pub fn config(&self) -> Option<&CsrfConfig> {
        match self {
            Self::Enabled(config) => Some(config),
            Self::Disabled => None,
        }
    }

    /// Name of the hidden token field, when enabled.
    pub fn field_name(&self) -> Option<&str> {
        self.config().map(|config| config.field_name.as_str())
    }
}

/// Pre-validation of the hidden token field.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfTokenCheck;

impl SyncValidator for CsrfTokenCheck {
    fn validate(&self, form: &Form, field: &Field) -> ValidationResult {
        // A form without CSRF settings never carries a token field.
        let Some(config) = form.csrf().config() else {
            return Ok(());
        };
        let result = SessionCsrf::new(config).validate_token(field.data().as_text());
        if let Err(err) = &result {
            warn!(form = %form.name(), error = %err, "CSRF token rejected");
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::config::AppConfig;
    use crate::request::HttpRequest;

    fn request(config: AppConfig) -> HttpRequest {
        HttpRequest::new("POST", Arc::new(config)).with_context("session", SessionData::new())
    }

    #[test]
    fn test_no_request_disables_csrf() {
        let settings = CsrfSettings::for_request(None).unwrap();
        assert!(!settings.is_enabled());
        assert!(settings.field_name().is_none());
    }

    #[test]
    fn test_disabled_by_config_skips_secret_lookup() {
        let req = request(AppConfig::new().with("WTF_CSRF_ENABLED", false));
        let settings = CsrfSettings::for_request(Some(&req)).unwrap();
        assert!(matches!(settings, CsrfSettings::Disabled));
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let req = request(AppConfig::new());
        let err = CsrfSettings::for_request(Some(&req)).unwrap_err();
        assert!(matches!(err, FormError::MissingSecret));

        let req = request(AppConfig::new().with("SECRET_KEY", ""));
        let err = CsrfSettings::for_request(Some(&req)).unwrap_err();
        assert!(matches!(err, FormError::MissingSecret));
    }

    #[test]
    fn test_defaults() {
        let req = request(AppConfig::new().with("SECRET_KEY", "top secret !!!"));
        let settings = CsrfSettings::for_request(Some(&req)).unwrap();
        let config = settings.config().unwrap();

        assert_eq!(config.field_name, "csrf_token");
        assert_eq!(config.secret, b"top secret !!!".to_vec());
        assert_eq!(config.time_limit, Some(TimeDelta::seconds(1800)));
    }

    #[test]
    fn test_csrf_secret_key_takes_precedence() {
        let req = request(
            AppConfig::new()
                .with("SECRET_KEY", "general")
                .with("WTF_CSRF_SECRET_KEY", "specific")
                .with("WTF_CSRF_FIELD_NAME", "token")
                .with("WTF_CSRF_TIME_LIMIT", Value::Null),
        );
        let settings = CsrfSettings::for_request(Some(&req)).unwrap();
        let config = settings.config().unwrap();

        assert_eq!(config.secret, b"specific".to_vec());
        assert_eq!(config.field_name, "token");
        assert_eq!(config.time_limit, None);
    }

    #[test]
    fn test_context_is_resolved_by_name() {
        let session = SessionData::new();
        let req = HttpRequest::new("POST", Arc::new(
            AppConfig::new()
                .with("SECRET_KEY", "s")
                .with("WTF_CSRF_CONTEXT_NAME", "my_session"),
        ))
        .with_context("my_session", session.clone());

        let settings = CsrfSettings::for_request(Some(&req)).unwrap();
        assert!(settings.config().unwrap().context.same_session(&session));
    }

    #[test]
    fn test_missing_context_is_config_error() {
        let req = HttpRequest::new("POST", Arc::new(AppConfig::new().with("SECRET_KEY", "s")));
        let err = CsrfSettings::for_request(Some(&req)).unwrap_err();
        assert!(matches!(err, FormError::MissingCsrfContext { ref name } if name == "session"));
    }

    #[test]
    fn test_override_disables_even_without_secret() {
        let req = request(AppConfig::new());
        let settings = CsrfSettings::resolve(Some(&req), Some(false)).unwrap();
        assert!(!settings.is_enabled());
    }
}
