//! Sentry-backed reporting session.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::Request;
use sentry::protocol::{Context as EventContext, Map};
use sentry::{Hub, Level, SentryFuture, SentryFutureExt};
use tower::{Layer, Service};

use crate::reporter::{ContextMap, ReportScope, Reporter, ReportingSession, Severity};

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Debug => Level::Debug,
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warning,
            Severity::Error => Level::Error,
            Severity::Fatal => Level::Fatal,
        }
    }
}

/// [`Reporter`] backed by a sentry hub.
#[derive(Clone)]
pub struct HubReporter {
    hub: Arc<Hub>,
}

impl HubReporter {
    #[must_use]
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }
}

struct HubScope<'a> {
    hub: &'a Hub,
}

impl ReportScope for HubScope<'_> {
    fn set_context(&mut self, key: &str, context: ContextMap) {
        let map: Map<String, serde_json::Value> = context.into_iter().collect();
        self.hub
            .configure_scope(|scope| scope.set_context(key, EventContext::Other(map)));
    }

    fn capture_message(&mut self, message: &str, severity: Severity) {
        self.hub.capture_message(message, severity.into());
    }
}

impl Reporter for HubReporter {
    fn with_scope(&self, f: &mut dyn FnMut(&mut dyn ReportScope)) {
        // configure_scope inside the callback targets the pushed scope, which is popped on return
        self.hub.with_scope(
            |_| {},
            || {
                let mut scope = HubScope { hub: &self.hub };
                f(&mut scope);
            },
        );
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.hub
            .client()
            .is_none_or(|client| client.flush(Some(timeout)))
    }
}

/// Tower layer that gives every request its own sentry hub.
///
/// Each request gets a hub forked from `parent`, wrapped in a
/// [`ReportingSession`] and stored in the request extensions. The same hub is
/// bound as the current hub while the inner service runs, so scope data set by
/// handlers through `sentry::configure_scope` lands on the reported events.
/// Requests that already carry a session keep it, and the inner future runs
/// on the hub that was current when the request arrived.
#[derive(Clone)]
pub struct SentryHubLayer {
    parent: Arc<Hub>,
}

impl SentryHubLayer {
    #[must_use]
    pub fn new(parent: Arc<Hub>) -> Self {
        Self { parent }
    }

    /// Fork request hubs from the process-wide main hub.
    #[must_use]
    pub fn from_main() -> Self {
        Self::new(Hub::main())
    }
}

impl<S> Layer<S> for SentryHubLayer {
    type Service = SentryHubService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SentryHubService {
            inner,
            parent: Arc::clone(&self.parent),
        }
    }
}

/// Service that attaches a per-request hub before forwarding the request.
///
/// Created by [`SentryHubLayer`].
#[derive(Clone)]
pub struct SentryHubService<S> {
    inner: S,
    parent: Arc<Hub>,
}

impl<S, B> Service<Request<B>> for SentryHubService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = SentryFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let hub = if ReportingSession::from_request(&req).is_some() {
            Hub::current()
        } else {
            let hub = Arc::new(Hub::new_from_top(&self.parent));
            ReportingSession::new(Arc::new(HubReporter::new(Arc::clone(&hub)))).attach(&mut req);
            hub
        };
        let future = Hub::run(Arc::clone(&hub), || self.inner.call(req));
        future.bind_hub(hub)
    }
}
