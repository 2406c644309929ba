//! Error-tracking session capability.
//!
//! The middleware never talks to an error tracker directly. It looks up a
//! [`ReportingSession`] in the request extensions and drives it through the
//! [`Reporter`] trait, so any backend (a sentry hub, an in-memory recorder in
//! tests) can be plugged in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Request;
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Structured context block attached to an event.
pub type ContextMap = Map<String, Value>;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

/// Isolated scope handed out by [`Reporter::with_scope`].
pub trait ReportScope {
    /// Attach a named context block to events captured in this scope.
    fn set_context(&mut self, key: &str, context: ContextMap);

    /// Capture a message-level event carrying the scope's context.
    fn capture_message(&mut self, message: &str, severity: Severity);
}

/// Error-tracking session bound to a request.
pub trait Reporter: Send + Sync {
    /// Run `f` inside a fresh scope.
    ///
    /// Context attached through the scope must be visible only to events
    /// captured within the same call.
    fn with_scope(&self, f: &mut dyn FnMut(&mut dyn ReportScope));

    /// Block until queued events are delivered or `timeout` elapses.
    ///
    /// Returns `false` on timeout.
    fn flush(&self, timeout: Duration) -> bool;
}

/// Request extension carrying the reporting session for that request.
#[derive(Clone)]
pub struct ReportingSession(Arc<dyn Reporter>);

impl ReportingSession {
    #[must_use]
    pub fn new<R: Reporter + 'static>(reporter: Arc<R>) -> Self {
        Self(reporter)
    }

    #[must_use]
    pub fn reporter(&self) -> &dyn Reporter {
        self.0.as_ref()
    }

    /// Session attached to `req`, if any.
    #[must_use]
    pub fn from_request<B>(req: &Request<B>) -> Option<Self> {
        req.extensions().get::<Self>().cloned()
    }

    /// Attach this session to `req`, replacing any previous one.
    pub fn attach<B>(self, req: &mut Request<B>) {
        req.extensions_mut().insert(self);
    }
}

impl fmt::Debug for ReportingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingSession").finish_non_exhaustive()
    }
}

/// Event recorded by [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub message: String,
    pub severity: Severity,
    pub contexts: BTreeMap<String, ContextMap>,
}

/// In-process reporter that keeps every captured event.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<CapturedEvent>>,
    flushes: Mutex<Vec<Duration>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events captured so far.
    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Timeouts passed to each `flush` call, in call order.
    #[must_use]
    pub fn flushes(&self) -> Vec<Duration> {
        self.flushes.lock().clone()
    }
}

struct MemoryScope<'a> {
    reporter: &'a MemoryReporter,
    contexts: BTreeMap<String, ContextMap>,
}

impl ReportScope for MemoryScope<'_> {
    fn set_context(&mut self, key: &str, context: ContextMap) {
        self.contexts.insert(key.to_owned(), context);
    }

    fn capture_message(&mut self, message: &str, severity: Severity) {
        self.reporter.events.lock().push(CapturedEvent {
            message: message.to_owned(),
            severity,
            contexts: self.contexts.clone(),
        });
    }
}

impl Reporter for MemoryReporter {
    fn with_scope(&self, f: &mut dyn FnMut(&mut dyn ReportScope)) {
        let mut scope = MemoryScope {
            reporter: self,
            contexts: BTreeMap::new(),
        };
        f(&mut scope);
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.flushes.lock().push(timeout);
        true
    }
}
