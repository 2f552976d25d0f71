//! Session context handed to CSRF protection.
//!
//! [`SessionData`] is the session-like object a request carries. It is a
//! cheap, cloneable handle: every clone sees the same entries, so a token
//! generated while rendering is visible when the next request validates.
//! The tower-sessions bridge copies the CSRF entries in and out of a real
//! session around a handler.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::csrf::SESSION_SECRET_KEY;

/// Default session expiry (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Shared handle to a session-like key/value map.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl SessionData {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Get a string value.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.write().insert(key.into(), value.into())
    }

    /// Insert the value unless the key is already set; returns the stored value.
    pub fn get_or_insert_with(&self, key: &str, f: impl FnOnce() -> Value) -> Value {
        let mut entries = self.inner.write();
        entries.entry(key.to_string()).or_insert_with(f).clone()
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    /// Whether the key is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Whether two handles point at the same session.
    pub fn same_session(&self, other: &SessionData) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Keys copied between a tower session and [`SessionData`].
const BRIDGED_KEYS: &[&str] = &[SESSION_SECRET_KEY];

/// Copy the CSRF entries of a tower session into a fresh [`SessionData`].
pub async fn load_session(session: &Session) -> Result<SessionData> {
    let data = SessionData::new();
    for key in BRIDGED_KEYS {
        let value: Option<Value> = session
            .get(key)
            .await
            .with_context(|| format!("failed to read '{key}' from session"))?;
        if let Some(value) = value {
            data.insert(*key, value);
        }
    }
    Ok(data)
}

/// Write the CSRF entries of a [`SessionData`] back to the tower session.
pub async fn store_session(data: &SessionData, session: &Session) -> Result<()> {
    for key in BRIDGED_KEYS {
        match data.get(key) {
            Some(value) => session
                .insert(key, value)
                .await
                .with_context(|| format!("failed to store '{key}' in session"))?,
            None => {
                session
                    .remove::<Value>(key)
                    .await
                    .with_context(|| format!("failed to clear '{key}' from session"))?;
            }
        }
    }
    Ok(())
}

/// Create an in-memory session layer.
///
/// Suitable for development and the demo server; production deployments
/// bring their own store.
pub fn create_session_layer(secure: bool) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let session = SessionData::new();
        let handle = session.clone();
        handle.insert("csrf", "abc");

        assert_eq!(session.get_str("csrf").as_deref(), Some("abc"));
        assert!(session.same_session(&handle));
        assert!(!session.same_session(&SessionData::new()));
    }

    #[test]
    fn test_get_or_insert_with_keeps_existing() {
        let session = SessionData::new();
        let first = session.get_or_insert_with("csrf", || Value::from("one"));
        let second = session.get_or_insert_with("csrf", || Value::from("two"));

        assert_eq!(first, Value::from("one"));
        assert_eq!(second, Value::from("one"));
    }

    #[test]
    fn test_remove() {
        let session = SessionData::new();
        session.insert("csrf", "abc");
        assert!(session.remove("csrf").is_some());
        assert!(!session.contains_key("csrf"));
    }
}
