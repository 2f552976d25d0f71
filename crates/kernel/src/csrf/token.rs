//! Session-bound CSRF tokens.
//!
//! Each session holds a random secret under [`SESSION_SECRET_KEY`]. A token
//! is `"{expires}##{hmac}"`, where `expires` is the UTC expiry timestamp
//! (`%Y%m%d%H%M%S`, empty without a time limit) and `hmac` is the hex
//! HMAC-SHA256 of the session secret followed by `expires`, keyed with the
//! application's CSRF secret. A token therefore only validates against the
//! session that issued it.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use super::CsrfConfig;
use crate::validation::{ValidationError, ValidationResult};

/// Session key holding the per-session CSRF secret.
pub const SESSION_SECRET_KEY: &str = "csrf";

/// Expiry timestamp format; fixed width so string comparison orders it.
const EXPIRY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Separator between expiry and signature.
const SEPARATOR: &str = "##";

type HmacSha256 = Hmac<Sha256>;

/// Token generation and verification for one form's CSRF settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionCsrf<'a> {
    config: &'a CsrfConfig,
}

impl<'a> SessionCsrf<'a> {
    /// Bind to a form's CSRF configuration.
    pub fn new(config: &'a CsrfConfig) -> Self {
        Self { config }
    }

    /// Generate a token for the current session.
    pub fn generate_token(&self) -> String {
        self.generate_token_at(Utc::now())
    }

    /// Generate a token as if the current time were `now`.
    ///
    /// Creates the session secret on first use.
    pub fn generate_token_at(&self, now: DateTime<Utc>) -> String {
        let session_secret = self.session_secret();
        let expires = match self.config.time_limit {
            Some(limit) => now
                .checked_add_signed(limit)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .format(EXPIRY_FORMAT)
                .to_string(),
            None => String::new(),
        };
        let signature = self.sign(&session_secret, &expires).unwrap_or_default();
        format!("{expires}{SEPARATOR}{signature}")
    }

    /// Validate a submitted token against the current session.
    pub fn validate_token(&self, token: Option<&str>) -> ValidationResult {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate a submitted token as if the current time were `now`.
    pub fn validate_token_at(&self, token: Option<&str>, now: DateTime<Utc>) -> ValidationResult {
        let Some((expires, signature)) = token.and_then(|t| t.split_once(SEPARATOR)) else {
            return Err(ValidationError::invalid("CSRF token missing."));
        };

        let Some(session_secret) = self.config.context.get_str(SESSION_SECRET_KEY) else {
            return Err(ValidationError::invalid("CSRF session token missing."));
        };

        let Some(expected) = self.sign(&session_secret, expires) else {
            return Err(ValidationError::invalid("CSRF failed."));
        };
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            debug!("CSRF signature mismatch");
            return Err(ValidationError::invalid("CSRF failed."));
        }

        if self.config.time_limit.is_some() && now.format(EXPIRY_FORMAT).to_string().as_str() > expires
        {
            return Err(ValidationError::invalid("CSRF token expired."));
        }

        Ok(())
    }

    /// The session secret, created if the session has none.
    fn session_secret(&self) -> String {
        let context = &self.config.context;
        match context.get_or_insert_with(SESSION_SECRET_KEY, || Value::from(new_session_secret())) {
            Value::String(secret) => secret,
            _ => {
                // Something else claimed the key; replace it.
                let secret = new_session_secret();
                context.insert(SESSION_SECRET_KEY, secret.clone());
                secret
            }
        }
    }

    fn sign(&self, session_secret: &str, expires: &str) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret).ok()?;
        mac.update(session_secret.as_bytes());
        mac.update(expires.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Random per-session secret: hex SHA-256 of 64 random bytes.
fn new_session_secret() -> String {
    let mut random_bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    hex::encode(Sha256::digest(random_bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::session::SessionData;

    fn config(secret: &str, time_limit: Option<TimeDelta>, context: SessionData) -> CsrfConfig {
        CsrfConfig {
            field_name: "csrf_token".to_string(),
            secret: secret.as_bytes().to_vec(),
            time_limit,
            context,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_token_format() {
        let config = config("top secret", Some(TimeDelta::seconds(1800)), SessionData::new());
        let token = SessionCsrf::new(&config).generate_token_at(noon());

        let (expires, signature) = token.split_once("##").unwrap();
        assert_eq!(expires, "20260301123000");
        // hex encoded HMAC-SHA256
        assert_eq!(signature.len(), 64);
        assert!(config.context.contains_key(SESSION_SECRET_KEY));
    }

    #[test]
    fn test_token_round_trip() {
        let config = config("top secret", Some(TimeDelta::seconds(1800)), SessionData::new());
        let csrf = SessionCsrf::new(&config);
        let token = csrf.generate_token_at(noon());

        assert!(csrf.validate_token_at(Some(&token), noon()).is_ok());
    }

    #[test]
    fn test_token_without_time_limit_never_expires() {
        let config = config("top secret", None, SessionData::new());
        let csrf = SessionCsrf::new(&config);
        let token = csrf.generate_token_at(noon());

        assert!(token.starts_with("##"));
        let much_later = noon() + TimeDelta::days(3650);
        assert!(csrf.validate_token_at(Some(&token), much_later).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let config = config("top secret", Some(TimeDelta::seconds(60)), SessionData::new());
        let csrf = SessionCsrf::new(&config);
        let token = csrf.generate_token_at(noon());

        let err = csrf
            .validate_token_at(Some(&token), noon() + TimeDelta::seconds(61))
            .unwrap_err();
        assert_eq!(err.message(), Some("CSRF token expired."));
    }

    #[test]
    fn test_missing_and_malformed_tokens() {
        let config = config("top secret", None, SessionData::new());
        let csrf = SessionCsrf::new(&config);
        csrf.generate_token();

        for token in [None, Some(""), Some("no-separator")] {
            let err = csrf.validate_token(token).unwrap_err();
            assert_eq!(err.message(), Some("CSRF token missing."));
        }

        let err = csrf.validate_token(Some("##deadbeef")).unwrap_err();
        assert_eq!(err.message(), Some("CSRF failed."));
    }

    #[test]
    fn test_session_without_secret() {
        let config = config("top secret", None, SessionData::new());
        let err = SessionCsrf::new(&config)
            .validate_token(Some("##abc"))
            .unwrap_err();
        assert_eq!(err.message(), Some("CSRF session token missing."));
    }

    #[test]
    fn test_token_is_bound_to_its_session() {
        let first = config("top secret", None, SessionData::new());
        let second = config("top secret", None, SessionData::new());

        let first_token = SessionCsrf::new(&first).generate_token();
        let second_token = SessionCsrf::new(&second).generate_token();

        assert!(SessionCsrf::new(&first).validate_token(Some(&first_token)).is_ok());
        assert!(SessionCsrf::new(&second).validate_token(Some(&second_token)).is_ok());
        assert!(SessionCsrf::new(&second).validate_token(Some(&first_token)).is_err());
        assert!(SessionCsrf::new(&first).validate_token(Some(&second_token)).is_err());
    }

    #[test]
    fn test_token_is_bound_to_the_app_secret() {
        let session = SessionData::new();
        let issuing = config("top secret", None, session.clone());
        let other_app = config("another secret", None, session);

        let token = SessionCsrf::new(&issuing).generate_token();
        assert!(SessionCsrf::new(&other_app).validate_token(Some(&token)).is_err());
    }
}
