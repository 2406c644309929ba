//! Content type checks for problem documents

use http::HeaderMap;
use http::header::CONTENT_TYPE;

/// Generic JSON media type.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type for Problem Details as per RFC 7807.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Returns `true` when `content_type` declares a body that may be a problem document.
///
/// This is an exact, case-sensitive comparison against [`APPLICATION_JSON`] and
/// [`APPLICATION_PROBLEM_JSON`]. Parameters are not stripped, so
/// `application/problem+json; charset=utf-8` is rejected.
#[must_use]
pub fn is_problem_content_type(content_type: &str) -> bool {
    content_type == APPLICATION_JSON || content_type == APPLICATION_PROBLEM_JSON
}

/// Reads the `Content-Type` header and applies [`is_problem_content_type`].
///
/// A missing header or a value that is not visible ASCII never matches.
#[must_use]
pub fn has_problem_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_problem_content_type)
}
