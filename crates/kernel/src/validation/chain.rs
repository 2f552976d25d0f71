//! Validator chain runner.

use futures::future::join_all;
use tracing::debug;

use super::{ValidationResult, Validator};
use crate::error::{FormError, FormResult};
use crate::form::{Field, Form};

/// Record one outcome in `errors`; returns whether it stops the chain.
pub(super) fn record(outcome: ValidationResult, errors: &mut Vec<String>) -> bool {
    match outcome {
        Ok(()) => false,
        Err(err) => {
            let stop = err.is_stop();
            errors.extend(err.into_message());
            stop
        }
    }
}

/// Run a field's validators, appending failures to `errors`.
///
/// Asynchronous validators are all started before any of them is awaited
/// and run concurrently on the current task. Their outcomes are folded in
/// declared order: every continue-error is recorded, the first stop records
/// its message and ends the chain, later stops are dropped. Synchronous
/// validators run afterwards, in order, unless the chain already stopped.
///
/// Returns whether the chain was stopped.
pub async fn run_validation_chain<'v>(
    form: &Form,
    field: &Field,
    validators: impl IntoIterator<Item = &'v Validator>,
    errors: &mut Vec<String>,
) -> bool {
    let mut asynchronous = Vec::new();
    let mut synchronous = Vec::new();
    for validator in validators {
        match validator {
            Validator::Async(_) => asynchronous.push(validator),
            Validator::Sync(check) => synchronous.push(check),
        }
    }

    let mut stopped = false;
    if !asynchronous.is_empty() {
        let outcomes = join_all(
            asynchronous
                .iter()
                .map(|validator| validator.execute(form, field)),
        )
        .await;

        for outcome in outcomes {
            match outcome {
                Err(err) if err.is_stop() && stopped => {
                    debug!(field = %field.name(), error = %err, "dropping late stop");
                }
                outcome => stopped |= record(outcome, errors),
            }
        }
    }

    if stopped {
        debug!(field = %field.name(), "chain stopped by async validator");
        return true;
    }

    for validator in synchronous {
        if record(validator.validate(form, field), errors) {
            return true;
        }
    }

    false
}

/// Legacy synchronous chain: validators run strictly in declared order.
///
/// Fails before running anything when the chain holds an asynchronous
/// validator.
pub fn run_validation_chain_sync<'v>(
    form: &Form,
    field: &Field,
    validators: impl IntoIterator<Item = &'v Validator>,
    errors: &mut Vec<String>,
) -> FormResult<bool> {
    let validators: Vec<&Validator> = validators.into_iter().collect();
    if validators.iter().any(|validator| validator.is_async()) {
        return Err(FormError::async_in_sync_path(field.name(), "validator"));
    }

    for validator in validators {
        let Validator::Sync(validator) = validator else {
            continue;
        };
        if record(validator.validate(form, field), errors) {
            return Ok(true);
        }
    }

    Ok(false)
}
