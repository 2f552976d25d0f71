//! Forms bound to a request.
//!
//! A [`Form`] holds named fields in declaration order. Binding it to a
//! request resolves CSRF settings from the request's config and processes
//! every field from the submitted data. Validation goes through
//! [`crate::validation`].

mod builder;
mod field;
mod types;

pub use builder::FormBuilder;
pub use field::{Field, FieldKind, FieldValue};
pub use types::{Form, FormErrors};
