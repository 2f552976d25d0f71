//! Stock validators.
//!
//! All of them are synchronous and accept a custom message through
//! `.message(..)`. Each converts into a [`Validator`], so they can be passed
//! straight to [`Field::validator`](crate::form::Field::validator).

use std::collections::BTreeSet;

use regex::Regex;

use crate::form::{Field, FieldValue, Form};
use crate::validation::{SyncValidator, ValidationError, ValidationResult, Validator};

const REQUIRED: &str = "This field is required.";

macro_rules! into_validator {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Validator {
                fn from(validator: $ty) -> Self {
                    Validator::sync(validator)
                }
            }
        )*
    };
}

into_validator!(
    DataRequired,
    InputRequired,
    Length,
    NumberRange,
    EqualTo,
    Regexp,
    AnyOf,
    FileRequired,
    FileAllowed,
);

macro_rules! with_message {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Replace the default error message.
                pub fn message(mut self, message: impl Into<String>) -> Self {
                    self.message = Some(message.into());
                    self
                }
            }
        )*
    };
}

with_message!(
    DataRequired,
    InputRequired,
    Length,
    NumberRange,
    EqualTo,
    Regexp,
    AnyOf,
    FileRequired,
    FileAllowed,
);

/// Stops the chain unless the field's value is truthy.
///
/// Whitespace-only text counts as missing.
#[derive(Debug, Clone, Default)]
pub struct DataRequired {
    message: Option<String>,
}

impl DataRequired {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncValidator for DataRequired {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        if field.data().is_truthy() {
            return Ok(());
        }
        Err(ValidationError::stop(
            self.message.as_deref().unwrap_or(REQUIRED),
        ))
    }
}

/// Stops the chain unless something non-empty was submitted for the field.
#[derive(Debug, Clone, Default)]
pub struct InputRequired {
    message: Option<String>,
}

impl InputRequired {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncValidator for InputRequired {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let submitted = field
            .raw_data()
            .first()
            .is_some_and(|input| !input.as_text().is_empty());
        if submitted {
            return Ok(());
        }
        Err(ValidationError::stop(
            self.message.as_deref().unwrap_or(REQUIRED),
        ))
    }
}

/// Length limits on text (in characters), lists and filenames.
#[derive(Debug, Clone, Default)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
    message: Option<String>,
}

impl Length {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self {
            min,
            max,
            message: None,
        }
    }

    pub fn min(min: usize) -> Self {
        Self::new(Some(min), None)
    }

    pub fn max(max: usize) -> Self {
        Self::new(None, Some(max))
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self::new(Some(min), Some(max))
    }

    fn default_message(&self) -> String {
        match (self.min, self.max) {
            (Some(min), None) => {
                format!("Field must be at least {min} {} long.", characters(min))
            }
            (None, Some(max)) => {
                format!("Field cannot be longer than {max} {}.", characters(max))
            }
            (Some(min), Some(max)) if min == max => {
                format!("Field must be exactly {max} {} long.", characters(max))
            }
            (Some(min), Some(max)) => {
                format!("Field must be between {min} and {max} characters long.")
            }
            (None, None) => "Invalid length.".to_string(),
        }
    }
}

impl SyncValidator for Length {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let length = field.data().len();
        let too_short = self.min.is_some_and(|min| length < min);
        let too_long = self.max.is_some_and(|max| length > max);
        if !too_short && !too_long {
            return Ok(());
        }
        Err(ValidationError::invalid(
            self.message.clone().unwrap_or_else(|| self.default_message()),
        ))
    }
}

fn characters(n: usize) -> &'static str {
    if n == 1 { "character" } else { "characters" }
}

/// Inclusive bounds on an integer value.
///
/// Text that parses as an integer is accepted too; anything else fails.
#[derive(Debug, Clone, Default)]
pub struct NumberRange {
    min: Option<i64>,
    max: Option<i64>,
    message: Option<String>,
}

impl NumberRange {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self {
            min,
            max,
            message: None,
        }
    }

    fn default_message(&self) -> String {
        match (self.min, self.max) {
            (Some(min), None) => format!("Number must be at least {min}."),
            (None, Some(max)) => format!("Number must be at most {max}."),
            (Some(min), Some(max)) => format!("Number must be between {min} and {max}."),
            (None, None) => "Invalid number.".to_string(),
        }
    }
}

impl SyncValidator for NumberRange {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let number = match field.data() {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        };
        let in_range = number.is_some_and(|n| {
            self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max)
        });
        if in_range {
            return Ok(());
        }
        Err(ValidationError::invalid(
            self.message.clone().unwrap_or_else(|| self.default_message()),
        ))
    }
}

/// Requires the same value as another field of the form.
#[derive(Debug, Clone)]
pub struct EqualTo {
    other: String,
    message: Option<String>,
}

impl EqualTo {
    pub fn new(other: impl Into<String>) -> Self {
        Self {
            other: other.into(),
            message: None,
        }
    }
}

impl SyncValidator for EqualTo {
    fn validate(&self, form: &Form, field: &Field) -> ValidationResult {
        let Some(other) = form.field(&self.other) else {
            return Err(ValidationError::invalid(format!(
                "Invalid field name '{}'.",
                self.other
            )));
        };
        if field.data() == other.data() {
            return Ok(());
        }
        Err(ValidationError::invalid(self.message.clone().unwrap_or_else(|| {
            format!("Field must be equal to {}.", self.other)
        })))
    }
}

/// Requires text matching a pattern at its start.
#[derive(Debug, Clone)]
pub struct Regexp {
    regex: Regex,
    message: Option<String>,
}

impl Regexp {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            message: None,
        })
    }
}

impl SyncValidator for Regexp {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let text = field.data().as_text().unwrap_or_default();
        if self.regex.find(text).is_some_and(|m| m.start() == 0) {
            return Ok(());
        }
        Err(ValidationError::invalid(
            self.message.as_deref().unwrap_or("Invalid input."),
        ))
    }
}

/// Requires the text value to be one of a fixed set.
#[derive(Debug, Clone)]
pub struct AnyOf {
    values: Vec<String>,
    message: Option<String>,
}

impl AnyOf {
    pub fn new<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            message: None,
        }
    }
}

impl SyncValidator for AnyOf {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let allowed = field
            .data()
            .as_text()
            .is_some_and(|text| self.values.iter().any(|value| value == text));
        if allowed {
            return Ok(());
        }
        Err(ValidationError::invalid(self.message.clone().unwrap_or_else(|| {
            format!("Invalid value, must be one of: {}.", self.values.join(", "))
        })))
    }
}

/// Stops the chain unless an uploaded file with a name is present.
#[derive(Debug, Clone, Default)]
pub struct FileRequired {
    message: Option<String>,
}

impl FileRequired {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncValidator for FileRequired {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        if field.data().as_file().is_some_and(|file| !file.name.is_empty()) {
            return Ok(());
        }
        Err(ValidationError::stop(
            self.message.as_deref().unwrap_or(REQUIRED),
        ))
    }
}

/// Restricts uploads to filename extensions.
///
/// Extensions are matched case-insensitively against the end of the
/// filename, so multi-dot extensions like `tar.gz` work. A missing file
/// passes; combine with [`FileRequired`] to demand one.
#[derive(Debug, Clone)]
pub struct FileAllowed {
    extensions: BTreeSet<String>,
    message: Option<String>,
}

impl FileAllowed {
    pub fn new<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().to_lowercase();
                if ext.starts_with('.') { ext } else { format!(".{ext}") }
            })
            .collect();
        Self {
            extensions,
            message: None,
        }
    }
}

impl SyncValidator for FileAllowed {
    fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let Some(file) = field.data().as_file().filter(|file| !file.name.is_empty()) else {
            return Ok(());
        };

        let filename = file.name.to_lowercase();
        if self.extensions.iter().any(|ext| filename.ends_with(ext.as_str())) {
            return Ok(());
        }
        Err(ValidationError::stop(
            self.message.as_deref().unwrap_or("File type does not allowed."),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::request::{FormInput, MultiDict, UploadedFile};

    /// Validate `field` against `data` and return its errors.
    fn errors_for(field: Field, data: MultiDict<FormInput>) -> Vec<String> {
        let name = field.name().to_string();
        let mut form = Form::builder("validators").field(field).formdata(data).build();
        form.validate().unwrap();
        form.field(&name).unwrap().errors().to_vec()
    }

    fn text(pairs: &[(&str, &str)]) -> MultiDict<FormInput> {
        pairs.iter().map(|(k, v)| (*k, FormInput::from(*v))).collect()
    }

    fn upload(name: &str, filename: &str) -> MultiDict<FormInput> {
        [(name, FormInput::from(UploadedFile::new(filename, b"=^o^=".to_vec())))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_data_required() {
        let field = || Field::string("msg").validator(DataRequired::new());
        assert_eq!(errors_for(field(), text(&[("msg", "  ")])), [REQUIRED]);
        assert!(errors_for(field(), text(&[("msg", "hi")])).is_empty());

        let custom = Field::string("msg").validator(DataRequired::new().message("Say something"));
        assert_eq!(errors_for(custom, text(&[("other", "x")])), ["Say something"]);
    }

    #[test]
    fn test_data_required_stops_the_chain() {
        let field = Field::string("msg")
            .validator(DataRequired::new())
            .validator(Length::min(3));
        assert_eq!(errors_for(field, text(&[("msg", "")])), [REQUIRED]);
    }

    #[test]
    fn test_input_required_accepts_whitespace() {
        let field = || Field::string("msg").validator(InputRequired::new());
        assert!(errors_for(field(), text(&[("msg", " ")])).is_empty());
        assert_eq!(errors_for(field(), text(&[("other", "x")])), [REQUIRED]);
    }

    #[test]
    fn test_length_messages() {
        let check = |validator: Length, value: &str| {
            errors_for(Field::string("msg").validator(validator), text(&[("msg", value)]))
        };

        assert_eq!(check(Length::min(3), "ab"), ["Field must be at least 3 characters long."]);
        assert_eq!(check(Length::max(10), "this is too long"), ["Field cannot be longer than 10 characters."]);
        assert_eq!(check(Length::between(2, 2), "abc"), ["Field must be exactly 2 characters long."]);
        assert_eq!(check(Length::between(2, 4), "a"), ["Field must be between 2 and 4 characters long."]);
        assert!(check(Length::max(10), "ok").is_empty());
    }

    #[test]
    fn test_number_range() {
        let check = |value: &str| {
            errors_for(
                Field::integer("n").validator(NumberRange::new(Some(1), Some(10))),
                text(&[("n", value)]),
            )
        };

        assert!(check("5").is_empty());
        assert_eq!(check("11"), ["Number must be between 1 and 10."]);
        // Coercion failure plus an out-of-range empty value.
        assert_eq!(check("x"), ["Not a valid integer value.", "Number must be between 1 and 10."]);
    }

    #[test]
    fn test_equal_to() {
        let form_errors = |password: &str, confirm: &str| {
            let mut form = Form::builder("signup")
                .field(Field::string("password"))
                .field(Field::string("confirm").validator(EqualTo::new("password")))
                .formdata(text(&[("password", password), ("confirm", confirm)]))
                .build();
            form.validate().unwrap();
            form.field("confirm").unwrap().errors().to_vec()
        };

        assert!(form_errors("secret", "secret").is_empty());
        assert_eq!(form_errors("secret", "other"), ["Field must be equal to password."]);

        let missing = Field::string("confirm").validator(EqualTo::new("nope"));
        assert_eq!(errors_for(missing, text(&[])), ["Invalid field name 'nope'."]);
    }

    #[test]
    fn test_regexp_matches_from_start() {
        let field = || Field::string("code").validator(Regexp::new(r"[A-Z]{3}").unwrap());
        assert!(errors_for(field(), text(&[("code", "ABC123")])).is_empty());
        assert_eq!(errors_for(field(), text(&[("code", "1ABC")])), ["Invalid input."]);
    }

    #[test]
    fn test_any_of() {
        let field = || Field::string("size").validator(AnyOf::new(["s", "m", "l"]));
        assert!(errors_for(field(), text(&[("size", "m")])).is_empty());
        assert_eq!(
            errors_for(field(), text(&[("size", "xl")])),
            ["Invalid value, must be one of: s, m, l."]
        );
    }

    #[test]
    fn test_file_required() {
        let field = || Field::file("required").validator(FileRequired::new());
        assert_eq!(errors_for(field(), upload("required", "")), [REQUIRED]);
        assert!(errors_for(field(), upload("required", "fake-file.lol")).is_empty());
    }

    #[test]
    fn test_file_allowed() {
        let field = || Field::file("image").validator(FileAllowed::new(["png", "JpG", ".jpeg"]));
        let denied = ["File type does not allowed."];

        assert!(errors_for(field(), upload("image", "")).is_empty());
        assert!(errors_for(field(), text(&[])).is_empty());
        assert_eq!(errors_for(field(), upload("image", "left-pad.js")), denied);
        assert!(errors_for(field(), upload("image", "sanic.jpg")).is_empty());
        assert!(errors_for(field(), upload("image", "sanic.JPEG")).is_empty());
        assert!(errors_for(field(), upload("image", "sanic.exe.png")).is_empty());
        assert_eq!(errors_for(field(), upload("image", "sanic.png.exe")), denied);
        assert!(errors_for(field(), upload("image", ".png")).is_empty());
    }

    #[test]
    fn test_multi_dot_extensions() {
        let field = || Field::file("archive").validator(FileAllowed::new(["tar.gz"]));
        assert!(errors_for(field(), upload("archive", "backup.TAR.GZ")).is_empty());
        assert!(!errors_for(field(), upload("archive", "backup.gz")).is_empty());
    }
}
