//! The request surface a form needs.
//!
//! A form only looks at four things on a request: the HTTP method, the
//! submitted form data, the uploaded files, and the application config (plus
//! the session-like context CSRF protection binds to). [`FormRequest`] is that
//! surface; [`HttpRequest`] is an owned implementation that the axum adapter
//! and the tests build.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::session::SessionData;

/// HTTP methods that count as a form submission.
pub const SUBMIT_VERBS: &[&str] = &["DELETE", "PATCH", "POST", "PUT"];

/// Ordered multi-value map, as submitted form data arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDict<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for MultiDict<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> MultiDict<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the key.
    pub fn append(&mut self, key: impl Into<String>, value: V) {
        self.entries.push((key.into(), value));
    }

    /// Replace every value for the key with a single value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value));
    }

    /// First value for the key.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Every value for the key, in submission order.
    pub fn get_all(&self, key: &str) -> Vec<&V> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    /// Whether the key has at least one value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of key/value pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over key/value pairs in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert every value, keeping keys and order.
    pub fn map_values<U>(&self, mut f: impl FnMut(&V) -> U) -> MultiDict<U> {
        MultiDict {
            entries: self.entries.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
        }
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MultiDict<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Read-only chain over several multi-value maps.
///
/// Lookups go to the first map that has the key; later maps with the same
/// key are shadowed entirely.
#[derive(Debug, Clone)]
pub struct ChainedParameters<'a, V> {
    maps: Vec<&'a MultiDict<V>>,
}

impl<'a, V> ChainedParameters<'a, V> {
    /// Chain the given maps, first map wins.
    pub fn new(maps: impl IntoIterator<Item = &'a MultiDict<V>>) -> Self {
        Self {
            maps: maps.into_iter().collect(),
        }
    }

    /// First value for the key from the first map holding it.
    pub fn get(&self, key: &str) -> Option<&'a V> {
        self.maps.iter().copied().find_map(|map| map.get(key))
    }

    /// Every value for the key, from the first map holding it only.
    pub fn get_all(&self, key: &str) -> Vec<&'a V> {
        self.maps
            .iter()
            .copied()
            .find(|map| map.contains_key(key))
            .map(|map| map.get_all(key))
            .unwrap_or_default()
    }

    /// Whether any chained map has the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.maps.iter().any(|map| map.contains_key(key))
    }

    /// Whether every chained map is empty.
    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(|map| map.is_empty())
    }
}

/// An uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Client-supplied filename (untrusted).
    pub name: String,
    /// Client-supplied content type.
    pub content_type: Option<String>,
    /// File contents.
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl UploadedFile {
    /// Create an uploaded file.
    pub fn new(name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            body: body.into(),
        }
    }

    /// Set the content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A single submitted input: form text or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormInput {
    Text(String),
    File(UploadedFile),
}

impl FormInput {
    /// Text form of the input; files yield their filename.
    pub fn as_text(&self) -> &str {
        match self {
            FormInput::Text(text) => text,
            FormInput::File(file) => &file.name,
        }
    }
}

impl From<&str> for FormInput {
    fn from(text: &str) -> Self {
        FormInput::Text(text.to_string())
    }
}

impl From<String> for FormInput {
    fn from(text: String) -> Self {
        FormInput::Text(text)
    }
}

impl From<UploadedFile> for FormInput {
    fn from(file: UploadedFile) -> Self {
        FormInput::File(file)
    }
}

/// What a form needs from the incoming request.
pub trait FormRequest: Send + Sync {
    /// HTTP method, upper case.
    fn method(&self) -> &str;

    /// Submitted form data.
    fn form(&self) -> &MultiDict<String>;

    /// Uploaded files, if the request was multipart.
    fn files(&self) -> Option<&MultiDict<UploadedFile>>;

    /// Application configuration.
    fn config(&self) -> &AppConfig;

    /// Session-like context stored on the request under `name`.
    fn context(&self, name: &str) -> Option<SessionData>;

    /// Client address, when known.
    fn remote_addr(&self) -> Option<&str> {
        None
    }

    /// Parsed JSON body, when the request carried one.
    fn json(&self) -> Option<&Value> {
        None
    }
}

/// Owned request snapshot.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: String,
    form: MultiDict<String>,
    files: Option<MultiDict<UploadedFile>>,
    config: Arc<AppConfig>,
    contexts: HashMap<String, SessionData>,
    remote_addr: Option<String>,
    json: Option<Value>,
}

impl HttpRequest {
    /// Create a request with no form data.
    pub fn new(method: impl Into<String>, config: Arc<AppConfig>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            form: MultiDict::new(),
            files: None,
            config,
            contexts: HashMap::new(),
            remote_addr: None,
            json: None,
        }
    }

    /// Set the submitted form data.
    pub fn with_form(mut self, form: MultiDict<String>) -> Self {
        self.form = form;
        self
    }

    /// Set the uploaded files.
    pub fn with_files(mut self, files: MultiDict<UploadedFile>) -> Self {
        self.files = Some(files);
        self
    }

    /// Attach a session-like context under `name`.
    pub fn with_context(mut self, name: impl Into<String>, context: SessionData) -> Self {
        self.contexts.insert(name.into(), context);
        self
    }

    /// Set the client address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the parsed JSON body.
    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Mutable access to the submitted form data.
    pub fn form_mut(&mut self) -> &mut MultiDict<String> {
        &mut self.form
    }
}

impl FormRequest for HttpRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn form(&self) -> &MultiDict<String> {
        &self.form
    }

    fn files(&self) -> Option<&MultiDict<UploadedFile>> {
        self.files.as_ref()
    }

    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn context(&self, name: &str) -> Option<SessionData> {
        self.contexts.get(name).cloned()
    }

    fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }
}
