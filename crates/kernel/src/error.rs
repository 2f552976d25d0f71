//! Form error types.
//!
//! These are the failures that escape a form: configuration problems found
//! while binding a form to a request, and misuse of the validation entry
//! points. Validator outcomes never end up here; they are collected on the
//! field they belong to (see [`crate::validation::ValidationError`]).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Configuration and misuse errors.
#[derive(Debug, Error)]
pub enum FormError {
    /// CSRF is enabled but neither secret key is configured.
    #[error("CSRF protection needs either WTF_CSRF_SECRET_KEY or SECRET_KEY")]
    MissingSecret,

    /// The request carries no session-like object under the configured name.
    #[error("CSRF protection needs a '{name}' context on the request (set WTF_CSRF_CONTEXT_NAME)")]
    MissingCsrfContext { name: String },

    /// A configuration value has the wrong type.
    #[error("invalid configuration value for {key}: {details}")]
    InvalidConfig { key: String, details: String },

    /// The legacy synchronous path was used after the form switched to
    /// asynchronous validation.
    #[error(
        "form '{form}' validates asynchronously; use validate_async() or validate_on_submit_async() instead of the synchronous entry points"
    )]
    SyncValidationAfterUpgrade { form: String },

    /// An asynchronous validator or hook was reached on the synchronous path.
    #[error(
        "field '{field}' has an asynchronous {what}; it can only run through validate_async()"
    )]
    AsyncInSyncPath { field: String, what: &'static str },
}

impl FormError {
    /// Create an invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            details: details.into(),
        }
    }

    /// Create an async-on-sync-path error.
    pub fn async_in_sync_path(field: impl Into<String>, what: &'static str) -> Self {
        Self::AsyncInSyncPath {
            field: field.into(),
            what,
        }
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        // Every variant is a server-side defect, never the visitor's fault.
        tracing::error!(error = %self, "form error");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}

/// Result type alias using FormError.
pub type FormResult<T> = Result<T, FormError>;
