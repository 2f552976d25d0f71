//! Field validation wrapper: pre-validation, the chain, post-validation.

use tracing::debug;

use super::chain::{record, run_validation_chain, run_validation_chain_sync};
use super::{PostValidator, Validator};
use crate::error::{FormError, FormResult};
use crate::form::{Field, FieldKind, Form};

/// Validate one field on the asynchronous path.
///
/// Returns the field's new error list, starting from its process errors.
/// The field passes iff the list is empty. The post-validation hook always
/// runs and learns whether the chain was stopped.
pub async fn validate_field(form: &Form, field: &Field, extra: &[Validator]) -> Vec<String> {
    let mut errors = field.process_errors().to_vec();
    pre_validate_kind(field, &mut errors);

    let mut stopped = false;
    if let Some(hook) = field.pre_validator() {
        stopped = record(hook.execute(form, field).await, &mut errors);
    }

    if !stopped {
        stopped = run_validation_chain(
            form,
            field,
            field.validators().iter().chain(extra),
            &mut errors,
        )
        .await;
    }

    match field.post_validator() {
        Some(PostValidator::Sync(hook)) => {
            record(hook(form, field, stopped), &mut errors);
        }
        Some(PostValidator::Async(hook)) => {
            record(hook(form, field, stopped).await, &mut errors);
        }
        None => {}
    }

    debug!(field = %field.name(), stopped, errors = errors.len(), "field validated");
    errors
}

/// Validate one field on the legacy synchronous path.
///
/// Fails before running anything when the field carries an asynchronous
/// validator or hook.
pub fn validate_field_sync(form: &Form, field: &Field, extra: &[Validator]) -> FormResult<Vec<String>> {
    ensure_sync(field, extra)?;

    let mut errors = field.process_errors().to_vec();
    pre_validate_kind(field, &mut errors);

    let mut stopped = false;
    if let Some(Validator::Sync(hook)) = field.pre_validator() {
        stopped = record(hook.validate(form, field), &mut errors);
    }

    if !stopped {
        stopped = run_validation_chain_sync(
            form,
            field,
            field.validators().iter().chain(extra),
            &mut errors,
        )?;
    }

    if let Some(PostValidator::Sync(hook)) = field.post_validator() {
        record(hook(form, field, stopped), &mut errors);
    }

    debug!(field = %field.name(), stopped, errors = errors.len(), "field validated (sync)");
    Ok(errors)
}

pub(super) fn ensure_sync(field: &Field, extra: &[Validator]) -> FormResult<()> {
    if field.pre_validator().is_some_and(Validator::is_async) {
        return Err(FormError::async_in_sync_path(field.name(), "pre_validate hook"));
    }
    if field.post_validator().is_some_and(PostValidator::is_async) {
        return Err(FormError::async_in_sync_path(field.name(), "post_validate hook"));
    }
    if field.validators().iter().chain(extra).any(Validator::is_async) {
        return Err(FormError::async_in_sync_path(field.name(), "validator"));
    }
    Ok(())
}

/// Checks every field of a kind gets before its own hook runs.
fn pre_validate_kind(field: &Field, errors: &mut Vec<String>) {
    if let FieldKind::Select { choices } = field.kind() {
        let chosen = field
            .data()
            .as_text()
            .is_some_and(|value| choices.iter().any(|(choice, _)| choice == value));
        if !chosen {
            errors.push("Not a valid choice.".to_string());
        }
    }
}
