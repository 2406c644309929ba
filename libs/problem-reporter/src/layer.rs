//! Tower middleware reporting problem responses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, header};
use http_body::Body;
use problem_details::{DecodeError, has_problem_content_type};
use tower::{Layer, Service};

use crate::capture::{BoxError, ReplayBody, capture_body};
use crate::config::{Options, ReporterConfig};
use crate::context::{DiagnosticContext, PROBLEM_DETAILS_CONTEXT, event_message};
use crate::reporter::{Reporter, ReportingSession, Severity};

/// What was sent to the reporter for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedProblem {
    pub message: String,
    pub context: DiagnosticContext,
}

/// Decode `body` and capture one informational event on `reporter`.
///
/// The diagnostic context is attached under `"problemDetails"` inside an
/// isolated scope, so it never leaks onto other events of the same session.
///
/// # Errors
/// Returns the decode error when `body` is not a problem document; nothing is
/// captured in that case.
pub fn report_problem(
    reporter: &dyn Reporter,
    body: &[u8],
) -> Result<ReportedProblem, DecodeError> {
    let problem = problem_details::decode(body)?;
    let context = DiagnosticContext::from(&problem);
    let message = event_message(&problem).to_owned();
    let context_map = context.to_map();

    reporter.with_scope(&mut |scope| {
        scope.set_context(PROBLEM_DETAILS_CONTEXT, context_map.clone());
        scope.capture_message(&message, Severity::Info);
    });

    Ok(ReportedProblem { message, context })
}

/// Wait for the session to deliver its events, off the async worker threads.
///
/// The outcome is only logged.
async fn wait_for_delivery(session: ReportingSession, timeout: Duration) {
    let flushed = tokio::task::spawn_blocking(move || session.reporter().flush(timeout)).await;
    match flushed {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis(),
                "problem event delivery not confirmed before flush timeout"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "problem event flush task failed");
        }
    }
}

/// Tower layer that reports problem responses to the request's reporting session.
///
/// Responses pass through unchanged. A report is made only when the response
/// declares a JSON or problem+json content type, its status satisfies the
/// configured classifier, the request carries a [`ReportingSession`], and the
/// body decodes as a problem document.
#[derive(Clone, Debug)]
pub struct ProblemReportLayer {
    options: Arc<Options>,
}

impl ProblemReportLayer {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options: Arc::new(options.normalized()),
        }
    }

    #[must_use]
    pub fn from_config(config: ReporterConfig) -> Self {
        Self::new(Options::from(config))
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Default for ProblemReportLayer {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<S> Layer<S> for ProblemReportLayer {
    type Service = ProblemReportService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProblemReportService {
            inner,
            options: Arc::clone(&self.options),
        }
    }
}

/// Service that inspects responses of the inner service.
///
/// Created by [`ProblemReportLayer`].
#[derive(Clone, Debug)]
pub struct ProblemReportService<S> {
    inner: S,
    options: Arc<Options>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ProblemReportService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: 'static,
    ReqBody: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<ReplayBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let session = ReportingSession::from_request(&req);
        let options = Arc::clone(&self.options);
        let response = self.inner.call(req);

        Box::pin(async move {
            let response = response.await?;
            Ok(inspect(response, session, &options).await)
        })
    }
}

/// Session to report to, if the response is a reportable candidate.
fn reporting_target<B>(
    response: &Response<B>,
    session: Option<ReportingSession>,
    options: &Options,
) -> Option<ReportingSession> {
    let status = response.status().as_u16();

    if !has_problem_content_type(response.headers()) {
        tracing::trace!(status, "response is not a problem document candidate");
        return None;
    }
    if !options.is_reportable.is_reportable(status) {
        tracing::debug!(status, "problem response status not reportable");
        return None;
    }
    let Some(session) = session else {
        tracing::debug!(status, "no reporting session on request, skipping problem report");
        return None;
    };

    let declared_len = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if let Some(size) = declared_len.filter(|len| *len > options.max_capture_bytes) {
        tracing::debug!(
            status,
            size,
            limit = options.max_capture_bytes,
            "problem response larger than capture limit, not reported"
        );
        return None;
    }

    Some(session)
}

async fn inspect<B>(
    response: Response<B>,
    session: Option<ReportingSession>,
    options: &Options,
) -> Response<ReplayBody<B>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let Some(session) = reporting_target(&response, session, options) else {
        return response.map(ReplayBody::passthrough);
    };

    let status = response.status().as_u16();
    let (parts, body) = response.into_parts();
    let (body, captured) = capture_body(body, options.max_capture_bytes).await;

    let Some(bytes) = captured else {
        tracing::debug!(
            status,
            limit = options.max_capture_bytes,
            "problem response body exceeded capture limit or failed, not reported"
        );
        return Response::from_parts(parts, body);
    };

    let outcome = report_problem(session.reporter(), &bytes);
    match outcome {
        Ok(reported) => {
            tracing::debug!(status, message = %reported.message, "reported problem response");
            if options.wait_for_delivery {
                wait_for_delivery(session, options.flush_timeout).await;
            }
        }
        Err(e) => {
            tracing::debug!(status, error = %e, "response body is not a problem document");
        }
    }

    Response::from_parts(parts, body)
}
