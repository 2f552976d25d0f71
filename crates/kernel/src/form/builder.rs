//! Form construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::field::Field;
use super::types::Form;
use crate::csrf::CsrfSettings;
use crate::error::FormResult;
use crate::request::{ChainedParameters, FormInput, FormRequest, MultiDict};
use crate::validation::{self, ValidationMode, Validator};

/// Builder for [`Form`].
#[derive(Debug, Default)]
pub struct FormBuilder {
    name: String,
    fields: Vec<Field>,
    inline: HashMap<String, Validator>,
    mode: ValidationMode,
    csrf: Option<bool>,
    formdata: Option<MultiDict<FormInput>>,
}

impl FormBuilder {
    pub(super) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a field; fields keep the order they are added in.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a form-level validator for one field, run after the field's own
    /// validators. A later call for the same field replaces the earlier one.
    pub fn inline_validator(mut self, field: impl Into<String>, validator: impl Into<Validator>) -> Self {
        self.inline.insert(field.into(), validator.into());
        self
    }

    /// Build the form in asynchronous validation mode.
    pub fn asynchronous(mut self) -> Self {
        self.mode = ValidationMode::Async;
        self
    }

    /// Force CSRF protection on or off, overriding `WTF_CSRF_ENABLED`.
    pub fn csrf(mut self, enabled: bool) -> Self {
        self.csrf = Some(enabled);
        self
    }

    /// Process fields from this data instead of the request's.
    pub fn formdata(mut self, formdata: MultiDict<FormInput>) -> Self {
        self.formdata = Some(formdata);
        self
    }

    /// Build the form bound to a request.
    ///
    /// CSRF settings come from the request's config; when enabled the hidden
    /// token field is appended after the declared fields. Fields are then
    /// processed from the explicit form data if one was given, else from
    /// the request's form data chained with its uploaded files.
    pub fn bind(self, request: Arc<dyn FormRequest>) -> FormResult<Form> {
        let csrf = CsrfSettings::resolve(Some(&*request), self.csrf)?;
        Ok(self.assemble(Some(request), csrf))
    }

    /// Build an unbound form. CSRF protection needs a request, so an
    /// unbound form never has it.
    pub fn build(self) -> Form {
        self.assemble(None, CsrfSettings::Disabled)
    }

    fn assemble(self, request: Option<Arc<dyn FormRequest>>, csrf: CsrfSettings) -> Form {
        let mut fields = self.fields;
        if let Some(name) = csrf.field_name() {
            fields.push(Field::csrf_token(name));
        }

        process_fields(&mut fields, self.formdata.as_ref(), request.as_deref());

        let mut form = Form {
            name: self.name,
            build_id: Uuid::now_v7(),
            fields,
            inline: self.inline,
            request,
            csrf,
            mode: ValidationMode::Sync,
            errors: None,
        };
        if self.mode == ValidationMode::Async {
            validation::install_async(&mut form);
        }

        debug!(
            form = %form.name(),
            build_id = %form.build_id(),
            fields = form.fields().len(),
            csrf = form.csrf().is_enabled(),
            "form built"
        );
        form
    }
}

/// Coerce every field from the form data that applies.
///
/// Empty form data counts as nothing submitted, so defaults apply.
fn process_fields(
    fields: &mut [Field],
    explicit: Option<&MultiDict<FormInput>>,
    request: Option<&dyn FormRequest>,
) {
    let text;
    let files;
    let formdata = match (explicit, request) {
        (Some(formdata), _) => Some(ChainedParameters::new([formdata])),
        (None, Some(request)) => {
            text = request.form().map_values(|value| FormInput::Text(value.clone()));
            files = request
                .files()
                .map(|files| files.map_values(|file| FormInput::File(file.clone())));
            Some(ChainedParameters::new(
                [Some(&text), files.as_ref()].into_iter().flatten(),
            ))
        }
        (None, None) => None,
    };
    let formdata = formdata.filter(|formdata| !formdata.is_empty());

    for field in fields {
        field.process(formdata.as_ref());
    }
}
