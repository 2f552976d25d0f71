//! Reading submitted form data from axum requests.

use anyhow::{Context, Result};
use axum::extract::Multipart;
use tracing::debug;

use crate::request::{MultiDict, UploadedFile};

/// Parse an `application/x-www-form-urlencoded` body.
pub fn read_urlencoded(body: &[u8]) -> MultiDict<String> {
    url::form_urlencoded::parse(body)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Split a multipart body into text fields and uploaded files.
///
/// Parts with a filename are files, even when the filename is empty (an
/// empty file input).
pub async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(MultiDict<String>, MultiDict<UploadedFile>)> {
    let mut form = MultiDict::new();
    let mut files = MultiDict::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .context("failed to read multipart field")?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        match field.file_name().map(|s| s.to_string()) {
            Some(filename) => {
                let content_type = field.content_type().map(|s| s.to_string());
                let body = field
                    .bytes()
                    .await
                    .with_context(|| format!("failed to read upload '{name}'"))?;
                debug!(field = %name, filename = %filename, size = body.len(), "received upload");
                files.append(
                    name,
                    UploadedFile {
                        name: filename,
                        content_type,
                        body: body.to_vec(),
                    },
                );
            }
            None => {
                let text = field
                    .text()
                    .await
                    .with_context(|| format!("failed to read field '{name}'"))?;
                form.append(name, text);
            }
        }
    }

    Ok((form, files))
}
