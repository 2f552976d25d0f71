//! formgate kernel library
//!
//! Request-bound forms with session CSRF protection and a validation
//! pipeline that runs asynchronous validators (network checks such as
//! reCAPTCHA) next to ordinary ones. The `formgate` binary is a small demo
//! server built on it.

pub mod captcha;
pub mod config;
pub mod csrf;
pub mod error;
pub mod extract;
pub mod form;
pub mod markup;
pub mod request;
pub mod session;
pub mod validation;
pub mod validators;

pub use config::AppConfig;
pub use error::{FormError, FormResult};
pub use form::{Field, FieldKind, FieldValue, Form, FormBuilder, FormErrors};
pub use request::{FormInput, FormRequest, HttpRequest, MultiDict, UploadedFile};
pub use session::SessionData;
pub use validation::{
    AsyncValidator, PostValidator, SyncValidator, ValidationError, ValidationMode,
    ValidationResult, Validator,
};
