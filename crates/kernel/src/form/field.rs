//! Form fields and their typed values.

use crate::csrf::CsrfTokenCheck;
use crate::request::{ChainedParameters, FormInput, UploadedFile};
use crate::validation::{PostValidator, ValidationMode, Validator};

/// Raw values a checkbox treats as unchecked.
const FALSE_VALUES: &[&str] = &["false", ""];

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Single line of text.
    String,
    /// Hidden text input.
    Hidden,
    /// Integer input.
    Integer,
    /// Checkbox.
    Boolean,
    /// Submit button; true when it was the one pressed.
    Submit,
    /// Single file upload.
    File,
    /// Choice among fixed `(value, label)` pairs.
    Select { choices: Vec<(String, String)> },
    /// reCAPTCHA widget.
    Captcha,
    /// Hidden CSRF token.
    CsrfToken,
    /// Every submitted value under the field name. Composite: it always
    /// validates on the synchronous path.
    List,
}

impl FieldKind {
    /// Value of a field nothing was submitted for and with no default.
    fn empty_value(&self) -> FieldValue {
        match self {
            FieldKind::String
            | FieldKind::Hidden
            | FieldKind::Select { .. }
            | FieldKind::Captcha
            | FieldKind::CsrfToken => FieldValue::Text(String::new()),
            FieldKind::Boolean | FieldKind::Submit => FieldValue::Bool(false),
            FieldKind::List => FieldValue::List(Vec::new()),
            FieldKind::Integer | FieldKind::File => FieldValue::Empty,
        }
    }
}

/// A field's current, coerced value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Bool(bool),
    File(UploadedFile),
    List(Vec<String>),
}

impl FieldValue {
    /// The text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The integer value, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The uploaded file, if this is one.
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            FieldValue::File(file) => Some(file),
            _ => None,
        }
    }

    /// Whether the value counts as provided: non-blank text, a non-zero
    /// number, `true`, a named file or a non-empty list.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Empty => false,
            FieldValue::Text(text) => !text.trim().is_empty(),
            FieldValue::Integer(n) => *n != 0,
            FieldValue::Bool(b) => *b,
            FieldValue::File(file) => !file.name.is_empty(),
            FieldValue::List(values) => !values.is_empty(),
        }
    }

    /// Length as checked by length limits: characters for text and
    /// filenames, digits for integers (the sign does not count), items for
    /// lists.
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Empty | FieldValue::Bool(_) => 0,
            FieldValue::Text(text) => text.chars().count(),
            FieldValue::Integer(n) => n.unsigned_abs().to_string().len(),
            FieldValue::File(file) => file.name.chars().count(),
            FieldValue::List(values) => values.len(),
        }
    }

    /// Whether [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<UploadedFile> for FieldValue {
    fn from(file: UploadedFile) -> Self {
        FieldValue::File(file)
    }
}

/// A single named input of a form.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    label: String,
    kind: FieldKind,
    default: Option<FieldValue>,
    data: FieldValue,
    raw_data: Vec<FormInput>,
    validators: Vec<Validator>,
    process_errors: Vec<String>,
    errors: Vec<String>,
    pre_validate: Option<Validator>,
    post_validate: Option<PostValidator>,
    mode: ValidationMode,
}

impl Field {
    /// Create a field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let data = kind.empty_value();
        Self {
            label: label_from_name(&name),
            name,
            kind,
            default: None,
            data,
            raw_data: Vec::new(),
            validators: Vec::new(),
            process_errors: Vec::new(),
            errors: Vec::new(),
            pre_validate: None,
            post_validate: None,
            mode: ValidationMode::Sync,
        }
    }

    /// Create a text field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// Create a hidden field.
    pub fn hidden(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Hidden)
    }

    /// Create an integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Create a checkbox.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Create a submit button.
    pub fn submit(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Submit)
    }

    /// Create a file upload field.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::File)
    }

    /// Create a select field from `(value, label)` pairs.
    pub fn select<V, L>(name: impl Into<String>, choices: impl IntoIterator<Item = (V, L)>) -> Self
    where
        V: Into<String>,
        L: Into<String>,
    {
        let choices = choices
            .into_iter()
            .map(|(value, label)| (value.into(), label.into()))
            .collect();
        Self::new(name, FieldKind::Select { choices })
    }

    /// Create a multi-value field.
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List)
    }

    /// Create a bare captcha field; see [`crate::captcha::recaptcha_field`].
    pub fn captcha(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Captcha)
    }

    /// Create the hidden CSRF token field, checked before its validators.
    pub fn csrf_token(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::CsrfToken)
            .label("CSRF Token")
            .pre_validate(Validator::sync(CsrfTokenCheck))
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Append a validator.
    pub fn validator(mut self, validator: impl Into<Validator>) -> Self {
        self.validators.push(validator.into());
        self
    }

    /// Set the value used when nothing was submitted for the field.
    pub fn default(mut self, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.data = value.clone();
        self.default = Some(value);
        self
    }

    /// Set the hook run before the validators.
    pub fn pre_validate(mut self, hook: impl Into<Validator>) -> Self {
        self.pre_validate = Some(hook.into());
        self
    }

    /// Set the hook run after the validators.
    pub fn post_validate(mut self, hook: PostValidator) -> Self {
        self.post_validate = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_text(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Current value.
    pub fn data(&self) -> &FieldValue {
        &self.data
    }

    /// Inputs submitted under the field name.
    pub fn raw_data(&self) -> &[FormInput] {
        &self.raw_data
    }

    /// Errors of the last validation pass.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Errors found while coercing the submitted input.
    pub fn process_errors(&self) -> &[String] {
        &self.process_errors
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn pre_validator(&self) -> Option<&Validator> {
        self.pre_validate.as_ref()
    }

    pub fn post_validator(&self) -> Option<&PostValidator> {
        self.post_validate.as_ref()
    }

    /// Whether the field aggregates several values.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, FieldKind::List)
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: ValidationMode) {
        self.mode = mode;
    }

    pub(crate) fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    /// Coerce submitted input into the field's value.
    ///
    /// Without form data the default (or the kind's empty value) is kept.
    pub(crate) fn process(&mut self, formdata: Option<&ChainedParameters<'_, FormInput>>) {
        self.process_errors.clear();
        self.raw_data.clear();
        self.data = self
            .default
            .clone()
            .unwrap_or_else(|| self.kind.empty_value());

        let Some(formdata) = formdata else {
            return;
        };
        self.raw_data = formdata
            .get_all(&self.name)
            .into_iter()
            .cloned()
            .collect();

        let first = self.raw_data.first();
        match &self.kind {
            FieldKind::String
            | FieldKind::Hidden
            | FieldKind::Select { .. }
            | FieldKind::Captcha
            | FieldKind::CsrfToken => {
                if let Some(input) = first {
                    self.data = FieldValue::Text(input.as_text().to_string());
                }
            }
            FieldKind::Integer => {
                if let Some(input) = first {
                    match input.as_text().trim().parse::<i64>() {
                        Ok(n) => self.data = FieldValue::Integer(n),
                        Err(_) => {
                            self.data = FieldValue::Empty;
                            self.process_errors
                                .push("Not a valid integer value.".to_string());
                        }
                    }
                }
            }
            FieldKind::Boolean | FieldKind::Submit => {
                let checked = first.is_some_and(|input| !FALSE_VALUES.contains(&input.as_text()));
                self.data = FieldValue::Bool(checked);
            }
            FieldKind::File => match first {
                Some(FormInput::File(file)) => self.data = FieldValue::File(file.clone()),
                Some(FormInput::Text(_)) => self.data = FieldValue::Empty,
                None => {}
            },
            FieldKind::List => {
                self.data = FieldValue::List(
                    self.raw_data
                        .iter()
                        .map(|input| input.as_text().to_string())
                        .collect(),
                );
            }
        }
    }
}

/// `first_name` → `First Name`.
fn label_from_name(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::request::MultiDict;

    fn processed(field: Field, data: MultiDict<FormInput>) -> Field {
        let mut field = field;
        field.process(Some(&ChainedParameters::new([&data])));
        field
    }

    fn text(pairs: &[(&str, &str)]) -> MultiDict<FormInput> {
        pairs.iter().map(|(k, v)| (*k, FormInput::from(*v))).collect()
    }

    #[test]
    fn test_label_from_name() {
        assert_eq!(Field::string("first_name").label_text(), "First Name");
        assert_eq!(Field::string("msg").label_text(), "Msg");
        assert_eq!(Field::string("msg").label("Message").label_text(), "Message");
    }

    #[test]
    fn test_text_takes_first_value() {
        let field = processed(Field::string("msg"), text(&[("msg", "a"), ("msg", "b")]));
        assert_eq!(field.data(), &FieldValue::from("a"));
        assert_eq!(field.raw_data().len(), 2);
    }

    #[test]
    fn test_default_applies_when_key_is_absent() {
        let field = processed(Field::string("msg").default("hello"), text(&[("other", "x")]));
        assert_eq!(field.data(), &FieldValue::from("hello"));

        let mut field = Field::integer("n").default(5_i64);
        field.process(None);
        assert_eq!(field.data().as_integer(), Some(5));
    }

    #[test]
    fn test_integer_coercion() {
        let field = processed(Field::integer("n"), text(&[("n", " 42 ")]));
        assert_eq!(field.data().as_integer(), Some(42));
        assert!(field.process_errors().is_empty());

        let field = processed(Field::integer("n"), text(&[("n", "forty-two")]));
        assert_eq!(field.data(), &FieldValue::Empty);
        assert_eq!(field.process_errors(), ["Not a valid integer value."]);
    }

    #[test]
    fn test_checkbox_values() {
        let field = processed(Field::boolean("agree"), text(&[("agree", "y")]));
        assert_eq!(field.data(), &FieldValue::Bool(true));

        let field = processed(Field::boolean("agree"), text(&[("agree", "false")]));
        assert_eq!(field.data(), &FieldValue::Bool(false));

        // Unchecked boxes are not submitted at all.
        let field = processed(Field::boolean("agree").default(true), text(&[("x", "1")]));
        assert_eq!(field.data(), &FieldValue::Bool(false));
    }

    #[test]
    fn test_file_and_list_values() {
        let mut data = text(&[("tags", "a"), ("tags", "b")]);
        data.append("upload", FormInput::from(UploadedFile::new("a.png", b"png".to_vec())));

        let field = processed(Field::file("upload"), data.clone());
        assert_eq!(field.data().as_file().map(|f| f.name.as_str()), Some("a.png"));

        let field = processed(Field::list("tags"), data);
        assert_eq!(
            field.data(),
            &FieldValue::List(vec!["a".to_string(), "b".to_string()])
        );
        assert!(field.is_composite());
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::from("   ").is_truthy());
        assert!(FieldValue::from("x").is_truthy());
        assert!(!FieldValue::Integer(0).is_truthy());
        assert!(!FieldValue::File(UploadedFile::default()).is_truthy());
        assert!(!FieldValue::Empty.is_truthy());
        assert_eq!(FieldValue::from("héllo").len(), 5);
    }

    #[test]
    fn test_integer_length_ignores_sign() {
        assert_eq!(FieldValue::Integer(1234).len(), 4);
        assert_eq!(FieldValue::Integer(-1234).len(), 4);
        assert_eq!(FieldValue::Integer(i64::MIN).len(), 19);
        assert_eq!(FieldValue::Integer(0).len(), 1);
    }
}
