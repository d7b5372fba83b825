//! Body parsing utilities for HTTP requests

use crate::error::FrameworkError;
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

/// Collect the full body, rejecting bodies larger than `limit` bytes
pub async fn collect_body(body: Incoming, limit: usize) -> Result<Bytes, FrameworkError> {
    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| FrameworkError::validation("body", format!("Failed to read request body: {}", e)))
}

/// Parse bytes as JSON into the target type
///
/// Malformed JSON is a client error, reported as a validation failure.
pub fn parse_json<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, FrameworkError> {
    serde_json::from_slice(bytes)
        .map_err(|e| FrameworkError::validation("body", format!("Failed to parse JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        slug: String,
    }

    #[test]
    fn test_parse_json() {
        let payload: Payload = parse_json(&Bytes::from_static(br#"{"slug":"foo"}"#)).unwrap();
        assert_eq!(payload.slug, "foo");

        let err = parse_json::<Payload>(&Bytes::from_static(b"{")).unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}
