//! RFC 7807 Problem Details for HTTP APIs (pure data model, no HTTP framework dependencies)

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Problem type assumed when a document does not name one.
pub const ABOUT_BLANK: &str = "about:blank";

/// Failure to read a body as a problem document.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Body is not a JSON object
    #[error("problem body is not a JSON object: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Body is a JSON object but does not have the problem document shape
    #[error("problem body does not match RFC 7807: {0}")]
    Schema(#[source] serde_json::Error),
}

/// RFC 7807 Problem Details document.
///
/// Every member except `title` is optional. Extension members are accepted
/// on decode and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct ProblemDocument {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_uri: Option<String>,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// The HTTP status code generated by the origin server for this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// A human-readable explanation specific to this occurrence of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDocument {
    /// Create a document carrying only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            type_uri: None,
            title: title.into(),
            status: None,
            detail: None,
            instance: None,
        }
    }

    /// Create an `about:blank` document titled with the canonical reason phrase of `status`.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status.canonical_reason().unwrap_or("Unknown Status"))
            .with_type(ABOUT_BLANK)
            .with_status(status)
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = Some(type_uri.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status.as_u16());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = Some(uri.into());
        self
    }

    /// The `status` member as a valid HTTP status code, if present.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status.and_then(|s| StatusCode::from_u16(s).ok())
    }
}

/// Decode a buffered body as a problem document.
///
/// The body must be a single JSON object. Arrays are rejected even though
/// they would otherwise map onto the struct positionally.
///
/// # Errors
/// Returns [`DecodeError::Syntax`] when the body is not a single JSON object
/// (trailing whitespace is allowed) and
/// [`DecodeError::Schema`] when the object lacks `title` or a member has the
/// wrong type.
pub fn decode(body: &[u8]) -> Result<ProblemDocument, DecodeError> {
    let object: Map<String, Value> = serde_json::from_slice(body).map_err(DecodeError::Syntax)?;
    serde_json::from_value(Value::Object(object)).map_err(DecodeError::Schema)
}

/// Axum integration: make `ProblemDocument` directly usable as a response
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ProblemDocument {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;

        let status = self
            .status_code()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(crate::media::APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn from_status_uses_reason_phrase() {
        let p = ProblemDocument::from_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(p.title, "Internal Server Error");
        assert_eq!(p.status, Some(500));
        assert_eq!(p.type_uri.as_deref(), Some(ABOUT_BLANK));
        assert_eq!(p.detail, None);
        assert_eq!(p.instance, None);
    }

    #[test]
    fn serializes_type_member_and_skips_absent_members() {
        let p = ProblemDocument::from_status(StatusCode::BAD_REQUEST).with_detail("missing id");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "about:blank",
                "title": "Bad Request",
                "status": 400,
                "detail": "missing id",
            })
        );
    }

    #[test]
    fn decodes_minimal_document() {
        let p = decode(br#"{"title":"Internal Server Error","status":500}"#).unwrap();
        assert_eq!(
            p,
            ProblemDocument::new("Internal Server Error")
                .with_status(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn decodes_full_document_and_ignores_extensions() {
        let body = br#"{
            "type": "https://example.com/probs/out-of-credit",
            "title": "You do not have enough credit.",
            "status": 403,
            "detail": "Your current balance is 30, but that costs 50.",
            "instance": "/account/12345/msgs/abc",
            "balance": 30,
            "accounts": ["/account/12345", "/account/67890"]
        }"#;
        let p = decode(body).unwrap();
        assert_eq!(p.type_uri.as_deref(), Some("https://example.com/probs/out-of-credit"));
        assert_eq!(p.status_code(), Some(StatusCode::FORBIDDEN));
        assert_eq!(p.instance.as_deref(), Some("/account/12345/msgs/abc"));
    }

    #[test]
    fn null_members_decode_as_absent() {
        let p = decode(br#"{"title":"Oops","detail":null,"status":null}"#).unwrap();
        assert_eq!(p.detail, None);
        assert_eq!(p.status, None);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(decode(b"<html>oops</html>"), Err(DecodeError::Syntax(_))));
        assert!(matches!(decode(b""), Err(DecodeError::Syntax(_))));
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(matches!(
            decode(br#"{"title":"Oops"} {"title":"again"}"#),
            Err(DecodeError::Syntax(_))
        ));
        assert!(matches!(decode(br#"{"title":"Oops"}garbage"#), Err(DecodeError::Syntax(_))));
        assert!(decode(b"{\"title\":\"Oops\"}\n").is_ok());
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(decode(br#"["Internal Server Error"]"#), Err(DecodeError::Syntax(_))));
        assert!(matches!(decode(b"42"), Err(DecodeError::Syntax(_))));
    }

    #[test]
    fn rejects_schema_mismatch() {
        assert!(matches!(decode(br#"{"status":500}"#), Err(DecodeError::Schema(_))));
        assert!(matches!(
            decode(br#"{"title":"x","status":"500"}"#),
            Err(DecodeError::Schema(_))
        ));
        assert!(matches!(
            decode(br#"{"title":"x","status":70000}"#),
            Err(DecodeError::Schema(_))
        ));
    }

    #[test]
    fn status_code_ignores_invalid_values() {
        let mut p = ProblemDocument::new("x");
        p.status = Some(42);
        assert_eq!(p.status_code(), None);
    }
}
