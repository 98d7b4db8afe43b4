use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use campus_common::validation::require_non_blank;

use crate::error::AppError;
use crate::state::AppState;
use crate::storage::{MAX_MEDIA_BYTES, MediaKind, StoredMedia, check_image, upload_media};

/// Upper bound on a whole multipart body: one image plus text fields.
pub const MAX_FORM_BYTES: usize = MAX_MEDIA_BYTES + 1024 * 1024;

/// A file part of a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Text fields of a multipart form plus at most one file.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl FormData {
    /// Trimmed value of a text field; blank counts as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Untrimmed value, for secrets where whitespace is significant.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Required text field, trimmed and length-checked.
    pub fn text(&self, name: &str) -> Result<String, AppError> {
        require_non_blank(name, self.get(name).unwrap_or_default()).map_err(AppError::BadRequest)
    }
}

/// Read every field of `multipart`. The part named `file_field` is kept as
/// an [`Upload`]; an empty file part (no file chosen) is dropped.
pub async fn parse_multipart(
    multipart: &mut Multipart,
    file_field: &str,
) -> Result<FormData, AppError> {
    let mut form = FormData::default();
    let mut total_size: usize = 0;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name() else {
            tracing::debug!("ignoring unnamed multipart field");
            continue;
        };
        let name = name.to_string();
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field.bytes().await?;
        total_size = total_size.saturating_add(bytes.len());
        if total_size > MAX_FORM_BYTES {
            return Err(AppError::bad_request("upload is too large"));
        }

        if name == file_field {
            if bytes.is_empty() {
                continue;
            }
            form.file = Some(Upload {
                content_type: content_type.unwrap_or_default(),
                bytes,
            });
        } else {
            let value = String::from_utf8(bytes.to_vec())
                .map_err(|_| AppError::bad_request(format!("{name} must be UTF-8 text")))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Store an uploaded image. `None` when nothing was uploaded.
pub async fn store_image(
    state: &AppState,
    kind: MediaKind,
    upload: Option<Upload>,
) -> Result<Option<StoredMedia>, AppError> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    check_image(&upload.content_type, upload.bytes.len()).map_err(AppError::BadRequest)?;
    let stored = upload_media(
        state.storage.as_ref(),
        &state.media_public_url,
        kind,
        &upload.content_type,
        upload.bytes.to_vec(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("media upload failed: {e}")))?;
    Ok(Some(stored))
}

/// Best-effort removal of an image stored for a request that then failed.
pub async fn discard_image(state: &AppState, stored: Option<&StoredMedia>) {
    if let Some(media) = stored
        && let Err(e) = state.storage.delete(&media.key).await
    {
        tracing::warn!(key = %media.key, "could not remove orphaned upload: {e}");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData {
            fields: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            file: None,
        }
    }

    #[test]
    fn blank_values_are_absent() {
        let f = form(&[("name", "  Chess  "), ("logo", "   ")]);
        assert_eq!(f.get("name"), Some("Chess"));
        assert_eq!(f.get("logo"), None);
        assert_eq!(f.get("missing"), None);
    }

    #[test]
    fn text_names_the_missing_field() {
        let AppError::BadRequest(msg) = form(&[]).text("title").unwrap_err() else {
            unreachable!()
        };
        assert_eq!(msg, "title is required");
        assert_eq!(form(&[("title", " Quiz ")]).text("title").unwrap(), "Quiz");
    }

    #[test]
    fn text_rejects_overlong_values() {
        let long = "x".repeat(2001);
        assert!(form(&[("description", long.as_str())]).text("description").is_err());
    }

    async fn describe(mut multipart: Multipart) -> Result<String, AppError> {
        let form = parse_multipart(&mut multipart, "logo").await?;
        let file = form
            .file
            .as_ref()
            .map(|f| format!("{}:{}", f.content_type, f.bytes.len()));
        Ok(format!(
            "{}|{}",
            form.get("name").unwrap_or("-"),
            file.unwrap_or_else(|| "none".to_string())
        ))
    }

    async fn post_form(body: Vec<u8>, content_type: String) -> String {
        use axum::{Router, routing::post};

        use crate::routes::test_helpers::{assert_status, post_multipart};

        let app = Router::new().route("/", post(describe));
        let resp = post_multipart(app, "/", None, body, content_type).await;
        let body = assert_status(resp, axum::http::StatusCode::OK).await;
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn keeps_file_part_with_content_type() {
        use crate::routes::test_helpers::make_multipart_with_file;

        let (body, ct) = make_multipart_with_file(
            &[("name", b"Chess".as_slice())],
            Some(("logo", "image/png", b"\x89PNG....".as_slice())),
        );
        assert_eq!(post_form(body, ct).await, "Chess|image/png:8");
    }

    #[tokio::test]
    async fn empty_file_part_counts_as_no_upload() {
        use crate::routes::test_helpers::make_multipart_with_file;

        let (body, ct) = make_multipart_with_file(
            &[("name", b"Chess".as_slice())],
            Some(("logo", "application/octet-stream", b"".as_slice())),
        );
        assert_eq!(post_form(body, ct).await, "Chess|none");
    }
}
