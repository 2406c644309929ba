//! Problem response reporting middleware
//!
//! A tower layer that watches responses for RFC 7807 problem documents and
//! forwards the severe ones to an error-tracking session as informational
//! events. The client-visible response is never altered.
//!
//! A response is reported when all of the following hold:
//! - its `Content-Type` is exactly `application/json` or `application/problem+json`
//! - its status satisfies the configured classifier (any 5xx by default)
//! - the request carries a [`ReportingSession`] extension
//! - its body decodes as a problem document
//!
//! # Example
//! ```rust,ignore
//! use problem_reporter::{Options, ProblemReportLayer, SentryHubLayer};
//! use tower::ServiceBuilder;
//!
//! let app = axum::Router::new()
//!     .route("/", axum::routing::get(handler))
//!     .layer(
//!         ServiceBuilder::new()
//!             .layer(SentryHubLayer::from_main())
//!             .layer(ProblemReportLayer::new(Options::new().wait_for_delivery(true))),
//!     );
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod capture;
pub mod classify;
pub mod config;
pub mod context;
#[cfg(feature = "sentry")]
pub mod hub;
pub mod layer;
pub mod reporter;

pub use capture::{BoxError, ReplayBody, capture_body};
pub use classify::{StatusClassifier, client_error, only_server_error};
pub use config::{
    ConfigError, DEFAULT_FLUSH_TIMEOUT, DEFAULT_MAX_CAPTURE_BYTES, Options, ReporterConfig,
};
pub use context::{DiagnosticContext, PROBLEM_DETAILS_CONTEXT, event_message};
#[cfg(feature = "sentry")]
pub use hub::{HubReporter, SentryHubLayer, SentryHubService};
pub use layer::{ProblemReportLayer, ProblemReportService, ReportedProblem, report_problem};
pub use reporter::{
    CapturedEvent, ContextMap, MemoryReporter, ReportScope, Reporter, ReportingSession, Severity,
};
