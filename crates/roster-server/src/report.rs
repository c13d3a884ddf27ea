//! Error reporting seam for the boundary layer.
//!
//! Handlers report unexpected (500-class) errors through an injected
//! [`ErrorReporter`] instead of a process-wide hook, so tests and deployments
//! can observe failures without global state.

use std::error::Error;

/// Notifies an external service of unexpected errors.
pub trait ErrorReporter: Send + Sync {
    /// Called once per unexpected error, after it has been logged.
    fn report(&self, err: &(dyn Error + 'static));
}

/// The default reporter: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, _err: &(dyn Error + 'static)) {}
}
