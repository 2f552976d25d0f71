//! Validation pipeline.
//!
//! A validator checks one field of a form and reports one of three outcomes:
//! `Ok(())` (pass), [`ValidationError::Invalid`] (record the message and keep
//! going), or [`ValidationError::Stop`] (record the message, if any, and skip
//! the rest of the field's validators).
//!
//! Whether a validator is synchronous or asynchronous is fixed when the
//! [`Validator`] is built. Both kinds share one asynchronous calling
//! convention ([`Validator::execute`]); the chain runner still tells them
//! apart so every asynchronous validator of a field is started before any of
//! them is awaited, and synchronous validators run afterwards.
//!
//! The pipeline has two entry points per level:
//! - asynchronous: [`run_validation_chain`], [`validate_field`] and
//!   `Form::validate_async`
//! - synchronous (legacy): [`run_validation_chain_sync`],
//!   [`validate_field_sync`] and `Form::validate`, which refuse asynchronous
//!   validators and hooks.

mod chain;
mod field;
mod form;

pub use chain::{run_validation_chain, run_validation_chain_sync};
pub use field::{validate_field, validate_field_sync};
pub use form::ExtraValidators;
pub(crate) use form::{inline_validators, install_async, validate_base, validate_base_async};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::form::{Field, Form};

/// Failure reported by a validator or hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Record the message and continue with the next validator.
    #[error("{0}")]
    Invalid(String),

    /// Record the message (if any) and stop the field's validator chain.
    #[error("{}", .0.as_deref().unwrap_or("validation stopped"))]
    Stop(Option<String>),
}

impl ValidationError {
    /// A continue-error with a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// A stop signal with a message.
    pub fn stop(message: impl Into<String>) -> Self {
        Self::Stop(Some(message.into()))
    }

    /// A stop signal without a message.
    pub fn halt() -> Self {
        Self::Stop(None)
    }

    /// Whether this outcome stops the chain.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }

    /// The message to record, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Invalid(message) => Some(message),
            Self::Stop(message) => message.as_deref().filter(|m| !m.is_empty()),
        }
    }

    /// Consume into the message to record, if any.
    pub fn into_message(self) -> Option<String> {
        match self {
            Self::Invalid(message) => Some(message),
            Self::Stop(message) => message.filter(|m| !m.is_empty()),
        }
    }
}

/// Outcome of a validator or hook.
pub type ValidationResult = Result<(), ValidationError>;

/// A validator that completes without suspending.
pub trait SyncValidator: Send + Sync {
    fn validate(&self, form: &Form, field: &Field) -> ValidationResult;
}

impl<F> SyncValidator for F
where
    F: Fn(&Form, &Field) -> ValidationResult + Send + Sync,
{
    fn validate(&self, form: &Form, field: &Field) -> ValidationResult {
        self(form, field)
    }
}

/// A validator that may suspend (network calls, database lookups).
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn validate(&self, form: &Form, field: &Field) -> ValidationResult;
}

/// Adapter turning a boxed-future closure into an [`AsyncValidator`].
struct AsyncFn<F>(F);

#[async_trait]
impl<F> AsyncValidator for AsyncFn<F>
where
    F: for<'a> Fn(&'a Form, &'a Field) -> BoxFuture<'a, ValidationResult> + Send + Sync,
{
    async fn validate(&self, form: &Form, field: &Field) -> ValidationResult {
        (self.0)(form, field).await
    }
}

/// Validation mode of a form or field.
///
/// A form starts in one mode; `Sync` can be upgraded to `Async` once and
/// never goes back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    #[default]
    Sync,
    Async,
}

/// A validator whose sync/async nature is fixed at construction.
#[derive(Clone)]
pub enum Validator {
    Sync(Arc<dyn SyncValidator>),
    Async(Arc<dyn AsyncValidator>),
}

impl Validator {
    /// Wrap a synchronous validator.
    pub fn sync(validator: impl SyncValidator + 'static) -> Self {
        Self::Sync(Arc::new(validator))
    }

    /// Wrap an asynchronous validator.
    pub fn asynchronous(validator: impl AsyncValidator + 'static) -> Self {
        Self::Async(Arc::new(validator))
    }

    /// Build a synchronous validator from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Form, &Field) -> ValidationResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Build an asynchronous validator from a closure returning a boxed
    /// future, e.g. `|form, field| async move { .. }.boxed()`.
    pub fn from_async_fn<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Form, &'a Field) -> BoxFuture<'a, ValidationResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Async(Arc::new(AsyncFn(f)))
    }

    /// Whether this validator is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Run the validator; synchronous validators complete immediately.
    pub fn execute<'a>(&'a self, form: &'a Form, field: &'a Field) -> BoxFuture<'a, ValidationResult> {
        match self {
            Self::Sync(validator) => futures::future::ready(validator.validate(form, field)).boxed(),
            Self::Async(validator) => validator.validate(form, field),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Validator::Sync"),
            Self::Async(_) => f.write_str("Validator::Async"),
        }
    }
}

/// Signature of a synchronous post-validation hook.
pub type SyncPostHook = dyn Fn(&Form, &Field, bool) -> ValidationResult + Send + Sync;

/// Signature of an asynchronous post-validation hook.
pub type AsyncPostHook =
    dyn for<'a> Fn(&'a Form, &'a Field, bool) -> BoxFuture<'a, ValidationResult> + Send + Sync;

/// Hook run after a field's validator chain; receives whether the chain was
/// stopped. Any error it returns is recorded on the field.
#[derive(Clone)]
pub enum PostValidator {
    Sync(Arc<SyncPostHook>),
    Async(Arc<AsyncPostHook>),
}

impl PostValidator {
    /// Build a synchronous post-validation hook.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Form, &Field, bool) -> ValidationResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Build an asynchronous post-validation hook.
    pub fn from_async_fn<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Form, &'a Field, bool) -> BoxFuture<'a, ValidationResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Async(Arc::new(f))
    }

    /// Whether this hook is asynchronous.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for PostValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("PostValidator::Sync"),
            Self::Async(_) => f.write_str("PostValidator::Async"),
        }
    }
}
