//! Application configuration consulted by forms.
//!
//! Forms read their settings (CSRF, reCAPTCHA, testing mode) from the
//! application config attached to the request, the same way a web framework
//! exposes `app.config`. Values are JSON so booleans, numbers and `null`
//! survive a round trip through environment variables.

use std::collections::HashMap;
use std::env;

use serde_json::Value;

use crate::error::{FormError, FormResult};

/// Prefixes of environment variables picked up by [`AppConfig::from_env`].
const ENV_PREFIXES: &[&str] = &["WTF_", "RECAPTCHA_"];

/// Standalone environment variables picked up by [`AppConfig::from_env`].
const ENV_KEYS: &[&str] = &["SECRET_KEY", "TESTING"];

/// Key → value application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    values: HashMap<String, Value>,
}

impl AppConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load form-related configuration from environment variables.
    ///
    /// Picks up `SECRET_KEY`, `TESTING` and every `WTF_*` / `RECAPTCHA_*`
    /// variable. Values that parse as JSON keep their JSON type, anything
    /// else is stored as a string.
    pub fn from_env() -> Self {
        let values = env::vars()
            .filter(|(key, _)| {
                ENV_KEYS.contains(&key.as_str())
                    || ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
            })
            .map(|(key, raw)| (key, parse_env_value(&raw)))
            .collect();

        Self { values }
    }

    /// Set a value, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether the key is present (even if its value is `null`).
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get a boolean, falling back to `default` when absent.
    ///
    /// Non-boolean values follow the usual truthiness rules: `null`, `0`,
    /// `""` and empty containers are false.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            None => default,
            Some(value) => is_truthy(value),
        }
    }

    /// Get a string, falling back to `default` when absent or `null`.
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// Get an optional string. Numbers and booleans are rendered as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Get an unsigned integer.
    ///
    /// Returns `Ok(None)` for an explicit `null`, the default when absent,
    /// and an error when the value is not a non-negative integer.
    pub fn get_u64(&self, key: &str, default: u64) -> FormResult<Option<u64>> {
        match self.values.get(key) {
            None => Ok(Some(default)),
            Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                FormError::invalid_config(key, format!("expected a non-negative integer, got {n}"))
            }),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                FormError::invalid_config(key, format!("expected a non-negative integer, got {s:?}"))
            }),
            Some(other) => Err(FormError::invalid_config(
                key,
                format!("expected a non-negative integer, got {other}"),
            )),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AppConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
