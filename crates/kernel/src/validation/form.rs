//! Form validation orchestrator and the async upgrade.

use std::collections::HashMap;

use tracing::debug;

use super::field::{ensure_sync, validate_field, validate_field_sync};
use super::{ValidationMode, Validator};
use crate::error::{FormError, FormResult};
use crate::form::Form;

/// Extra validators per field name, run after the field's own validators.
pub type ExtraValidators = HashMap<String, Vec<Validator>>;

/// Collect the form's inline validators as extra validators.
pub(crate) fn inline_validators(form: &Form) -> ExtraValidators {
    form.fields()
        .iter()
        .filter_map(|field| {
            form.inline_validator(field.name())
                .map(|validator| (field.name().to_string(), vec![validator.clone()]))
        })
        .collect()
}

/// Switch a form and its fields to asynchronous validation.
///
/// Only the first call has an effect; it returns whether it did. Composite
/// fields stay on the synchronous path. Validators are never touched.
pub(crate) fn install_async(form: &mut Form) -> bool {
    if form.is_async() {
        return false;
    }

    form.set_mode(ValidationMode::Async);
    for field in form.fields_mut() {
        if !field.is_composite() {
            field.set_mode(ValidationMode::Async);
        }
    }

    debug!(form = %form.name(), build_id = %form.build_id(), "asynchronous validation installed");
    true
}

/// Validate every field on the asynchronous path.
///
/// All fields are validated, in order, even after one failed. Fields still in
/// synchronous mode go through the synchronous wrapper; an asynchronous
/// validator on one of them fails the call before any validator runs.
pub(crate) async fn validate_base_async(form: &mut Form, extra: &ExtraValidators) -> FormResult<bool> {
    for field in form.fields() {
        if field.mode() == ValidationMode::Sync {
            ensure_sync(field, extra_for(extra, field.name()))?;
        }
    }
    form.clear_errors();

    let view: &Form = form;
    let mut results = Vec::with_capacity(view.fields().len());
    for field in view.fields() {
        let extra = extra_for(extra, field.name());
        let errors = match field.mode() {
            ValidationMode::Async => validate_field(view, field, extra).await,
            ValidationMode::Sync => validate_field_sync(view, field, extra)?,
        };
        results.push(errors);
    }

    let success = form.finish_validation(results);
    debug!(form = %form.name(), build_id = %form.build_id(), success, "form validated");
    Ok(success)
}

/// Validate every field on the legacy synchronous path.
pub(crate) fn validate_base(form: &mut Form, extra: &ExtraValidators) -> FormResult<bool> {
    if form.is_async() {
        return Err(FormError::SyncValidationAfterUpgrade {
            form: form.name().to_string(),
        });
    }
    for field in form.fields() {
        ensure_sync(field, extra_for(extra, field.name()))?;
    }
    form.clear_errors();

    let view: &Form = form;
    let results = view
        .fields()
        .iter()
        .map(|field| validate_field_sync(view, field, extra_for(extra, field.name())))
        .collect::<FormResult<Vec<_>>>()?;

    let success = form.finish_validation(results);
    debug!(form = %form.name(), build_id = %form.build_id(), success, "form validated (sync)");
    Ok(success)
}

fn extra_for<'e>(extra: &'e ExtraValidators, field: &str) -> &'e [Validator] {
    extra.get(field).map(Vec::as_slice).unwrap_or_default()
}
