//! Multipart upload payload parsing.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::error::ApiError;

const SOURCE: &str = "infra::http::upload";
const FILE_FIELD: &str = "file";
const JSON_MIME: &str = "application/json";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file field in upload")]
    Missing,
    #[error("file content type `{0}` is not JSON")]
    NotJson(String),
    #[error("upload exceeds the request size limit")]
    TooLarge,
    #[error("malformed multipart payload: {0}")]
    Malformed(String),
    #[error("file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("file does not contain a JSON array")]
    NotAnArray,
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let api = match &err {
            UploadError::Missing => ApiError::bad_request("Please upload a JSON file", None),
            UploadError::NotJson(_) => ApiError::bad_request("Only JSON files are allowed", None),
            UploadError::TooLarge => ApiError::bad_request("File too large", None),
            UploadError::Malformed(detail) => {
                ApiError::bad_request("Invalid multipart payload", Some(detail.clone()))
            }
            UploadError::InvalidJson(parse) => {
                ApiError::bad_request("Invalid JSON file", Some(parse.to_string()))
            }
            UploadError::NotAnArray => {
                ApiError::bad_request("JSON file must contain an array of chapters", None)
            }
        };
        api.with_source(SOURCE)
    }
}

fn is_json_mime(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(JSON_MIME))
}

fn multipart_error(err: &axum_extra::extract::multipart::MultipartError) -> UploadError {
    let status = err.status();
    warn!(
        target = "chapterdash::http::upload",
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => UploadError::TooLarge,
        _ => UploadError::Malformed(err.body_text()),
    }
}

/// Read the `file` field, insisting on a JSON content type.
pub async fn read_json_file(multipart: &mut Multipart) -> Result<Bytes, UploadError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(UploadError::Missing),
            Err(err) => return Err(multipart_error(&err)),
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_json_mime(&content_type) {
            return Err(UploadError::NotJson(content_type));
        }

        return field.bytes().await.map_err(|err| multipart_error(&err));
    }
}

/// Decode an uploaded file into the candidate records it holds.
pub fn parse_chapter_array(data: &[u8]) -> Result<Vec<Value>, UploadError> {
    match serde_json::from_slice::<Value>(data)? {
        Value::Array(items) => Ok(items),
        _ => Err(UploadError::NotAnArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_json_mime_with_parameters() {
        assert!(is_json_mime("application/json"));
        assert!(is_json_mime("Application/JSON; charset=utf-8"));
        assert!(!is_json_mime("text/plain"));
        assert!(!is_json_mime(""));
    }

    #[test]
    fn array_is_required() {
        assert_eq!(parse_chapter_array(b"[1, {}]").unwrap().len(), 2);
        assert!(matches!(
            parse_chapter_array(b"{\"a\": 1}"),
            Err(UploadError::NotAnArray)
        ));
        assert!(matches!(
            parse_chapter_array(b"[1,"),
            Err(UploadError::InvalidJson(_))
        ));
    }
}
