//! Storable form of cached response bodies.

use bytes::Bytes;
use serde::de::IgnoredAny;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("response body is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("stored payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// The exact text the handler emitted.
pub fn encode(body: &[u8]) -> Result<String, CodecError> {
    Ok(std::str::from_utf8(body)?.to_owned())
}

/// Recover a response body from its stored form, rejecting anything that is not JSON.
pub fn decode(stored: String) -> Result<Bytes, CodecError> {
    serde_json::from_str::<IgnoredAny>(&stored)?;
    Ok(Bytes::from(stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_keeps_body_text_verbatim() {
        let body = br#"{"success":true,  "chapters":[]}"#;
        let stored = encode(body).unwrap();
        assert_eq!(stored.as_bytes(), body);
        assert_eq!(decode(stored).unwrap().as_ref(), body);
    }

    #[test]
    fn non_utf8_bodies_are_not_encodable() {
        assert!(matches!(
            encode(&[0xff, 0xfe]),
            Err(CodecError::NotUtf8(_))
        ));
    }

    #[test]
    fn corrupted_payloads_fail_to_decode() {
        assert!(matches!(
            decode("{\"success\":tr".to_string()),
            Err(CodecError::InvalidJson(_))
        ));
    }
}
