//! Minimal HTML helpers for forms.

use crate::form::Form;

/// Escape text for HTML content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Hidden input carrying a fresh CSRF token, or an empty string when the
/// form has no CSRF protection.
pub fn csrf_input(form: &Form) -> String {
    let (Some(name), Some(token)) = (form.csrf().field_name(), form.csrf_token()) else {
        return String::new();
    };
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
        html_escape(name),
        html_escape(&token)
    )
}
