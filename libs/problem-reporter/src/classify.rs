//! Status code classification.

use std::fmt;
use std::sync::Arc;

/// Default classifier: any 5xx status.
#[must_use]
pub fn only_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}

/// Ready-made alternative classifier: any 4xx status.
#[must_use]
pub fn client_error(status: u16) -> bool {
    (400..500).contains(&status)
}

/// Predicate deciding whether a response status warrants a report.
///
/// Cheap to clone; all clones share the same predicate.
#[derive(Clone)]
pub struct StatusClassifier(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl StatusClassifier {
    #[must_use]
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    #[must_use]
    pub fn is_reportable(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(only_server_error)
    }
}

impl fmt::Debug for StatusClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusClassifier").finish_non_exhaustive()
    }
}
