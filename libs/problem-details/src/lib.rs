//! RFC 7807 problem documents
//!
//! Pure data model for `application/problem+json` bodies, with no dependency
//! on a particular HTTP server. It includes:
//! - `ProblemDocument` with a strict decoder: `title` is required, `status` must
//!   fit a `u16`, and nothing may follow the JSON object
//! - Media type constants and the content type check used to find candidate bodies
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod media;
pub mod problem;

pub use media::{
    APPLICATION_JSON, APPLICATION_PROBLEM_JSON, has_problem_content_type, is_problem_content_type,
};
pub use problem::{ABOUT_BLANK, DecodeError, ProblemDocument, decode};
