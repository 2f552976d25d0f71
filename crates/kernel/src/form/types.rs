//! Form instances and their validation entry points.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};
use uuid::Uuid;

use super::builder::FormBuilder;
use super::field::Field;
use crate::csrf::{CsrfSettings, SessionCsrf};
use crate::error::FormResult;
use crate::request::{FormRequest, SUBMIT_VERBS};
use crate::validation::{self, ExtraValidators, ValidationMode, Validator};

/// A form bound (or not) to a request.
pub struct Form {
    pub(super) name: String,
    /// Unique id of this instance, for tracing.
    pub(super) build_id: Uuid,
    pub(super) fields: Vec<Field>,
    /// Form-level validators keyed by the field they check.
    pub(super) inline: HashMap<String, Validator>,
    pub(super) request: Option<Arc<dyn FormRequest>>,
    pub(super) csrf: CsrfSettings,
    pub(super) mode: ValidationMode,
    /// `None` until a validation pass completes.
    pub(super) errors: Option<FormErrors>,
}

impl Form {
    /// Start building a form.
    pub fn builder(name: impl Into<String>) -> FormBuilder {
        FormBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Fields in declaration order; the CSRF field comes last.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn csrf(&self) -> &CsrfSettings {
        &self.csrf
    }

    /// The request the form was bound to.
    pub fn request(&self) -> Option<&dyn FormRequest> {
        self.request.as_deref()
    }

    /// Errors of the last validation pass, by field.
    pub fn errors(&self) -> Option<&FormErrors> {
        self.errors.as_ref()
    }

    /// Whether the form validates asynchronously.
    pub fn is_async(&self) -> bool {
        self.mode == ValidationMode::Async
    }

    /// Switch to asynchronous validation; see [`FormBuilder::asynchronous`].
    ///
    /// Returns whether this call changed anything. Once switched, the
    /// synchronous entry points fail.
    pub fn install_async(&mut self) -> bool {
        validation::install_async(self)
    }

    /// Validate with the form's inline validators (legacy synchronous path).
    pub fn validate(&mut self) -> FormResult<bool> {
        let extra = validation::inline_validators(self);
        self.validate_base(&extra)
    }

    /// Validate with the given extra validators (legacy synchronous path).
    pub fn validate_base(&mut self, extra: &ExtraValidators) -> FormResult<bool> {
        validation::validate_base(self, extra)
    }

    /// Validate with the form's inline validators, switching the form to
    /// asynchronous validation first.
    pub async fn validate_async(&mut self) -> FormResult<bool> {
        self.install_async();
        let extra = validation::inline_validators(self);
        validation::validate_base_async(self, &extra).await
    }

    /// Validate with the given extra validators, switching the form to
    /// asynchronous validation first.
    pub async fn validate_base_async(&mut self, extra: &ExtraValidators) -> FormResult<bool> {
        self.install_async();
        validation::validate_base_async(self, extra).await
    }

    /// Whether the bound request is a submission.
    pub fn is_submitted(&self) -> bool {
        self.request
            .as_ref()
            .is_some_and(|request| SUBMIT_VERBS.contains(&request.method()))
    }

    /// `is_submitted() && validate()`.
    pub fn validate_on_submit(&mut self) -> FormResult<bool> {
        if self.is_async() {
            // Reject the call even when nothing was submitted.
            return self.validate();
        }
        if !self.is_submitted() {
            return Ok(false);
        }
        self.validate()
    }

    /// `is_submitted() && validate_async()`.
    pub async fn validate_on_submit_async(&mut self) -> FormResult<bool> {
        self.install_async();
        if !self.is_submitted() {
            return Ok(false);
        }
        self.validate_async().await
    }

    /// A fresh CSRF token to render, when CSRF protection is on.
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf
            .config()
            .map(|config| SessionCsrf::new(config).generate_token())
    }

    pub(crate) fn inline_validator(&self, field: &str) -> Option<&Validator> {
        self.inline.get(field)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    pub(crate) fn set_mode(&mut self, mode: ValidationMode) {
        self.mode = mode;
    }

    pub(crate) fn clear_errors(&mut self) {
        self.errors = None;
    }

    /// Store each field's errors (in field order) and rebuild the cache.
    ///
    /// Returns whether every field passed.
    pub(crate) fn finish_validation(&mut self, results: Vec<Vec<String>>) -> bool {
        let mut errors = FormErrors::default();
        for (field, field_errors) in self.fields.iter_mut().zip(results) {
            if !field_errors.is_empty() {
                errors.0.push((field.name().to_string(), field_errors.clone()));
            }
            field.set_errors(field_errors);
        }
        let success = errors.is_empty();
        self.errors = Some(errors);
        success
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.name)
            .field("build_id", &self.build_id)
            .field("fields", &self.fields)
            .field("csrf", &self.csrf.is_enabled())
            .field("mode", &self.mode)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Validation errors by field name, in field order. Fields without errors
/// are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<(String, Vec<String>)>);

impl FormErrors {
    /// Errors of one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, errors)| errors.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Number of fields with errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, errors)| (name.as_str(), errors.as_slice()))
    }
}

impl Serialize for FormErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FormError;
    use crate::validation::ValidationError;

    #[test]
    fn test_unbound_form_is_never_submitted() {
        let mut form = Form::builder("contact").field(Field::string("msg")).build();
        assert!(!form.is_submitted());
        assert!(form.request().is_none());
        assert!(!form.validate_on_submit().unwrap());
        assert!(form.errors().is_none());
        assert!(form.csrf_token().is_none());
    }

    #[test]
    fn test_validate_populates_field_errors_and_cache() {
        let mut form = Form::builder("contact")
            .field(Field::string("msg").validator(Validator::from_fn(|_, field| {
                if field.data().is_truthy() {
                    Ok(())
                } else {
                    Err(ValidationError::stop("This field is required."))
                }
            })))
            .field(Field::string("name"))
            .build();

        assert!(!form.validate().unwrap());
        assert_eq!(form.field("msg").unwrap().errors(), ["This field is required."]);
        assert!(form.field("name").unwrap().errors().is_empty());

        let errors = form.errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            serde_json::to_value(errors).unwrap(),
            serde_json::json!({"msg": ["This field is required."]})
        );
    }

    #[test]
    fn test_sync_entry_points_fail_after_upgrade() {
        let mut form = Form::builder("contact").field(Field::string("msg")).build();
        assert!(form.install_async());

        assert!(matches!(
            form.validate(),
            Err(FormError::SyncValidationAfterUpgrade { .. })
        ));
        assert!(matches!(
            form.validate_on_submit(),
            Err(FormError::SyncValidationAfterUpgrade { .. })
        ));
    }

    #[tokio::test]
    async fn test_validate_async_upgrades_once() {
        let mut form = Form::builder("contact").field(Field::string("msg")).build();
        assert!(!form.is_async());

        assert!(form.validate_async().await.unwrap());
        assert!(form.is_async());
        assert!(!form.install_async());
        assert!(form.validate_async().await.unwrap());
        assert!(form.errors().unwrap().is_empty());
    }
}
