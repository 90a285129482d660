//! The logging seam between the executor and its host.

/// A sink for informational log lines.
///
/// Hosts embed the executor inside their own logging system; the executor
/// only ever needs to emit plain informational text, so this is the entire
/// required surface. Implement it for a logging handle, a log manager, or a
/// test recorder alike.
pub trait LogSink {
    /// Emit one informational message.
    fn info(&self, message: &str);
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn info(&self, message: &str) {
        (**self).info(message);
    }
}

/// Sink that writes each message to stderr, one line per call.
///
/// The default for hosts without a richer logger.
pub struct StderrSink;

impl LogSink for StderrSink {
    fn info(&self, message: &str) {
        eprintln!("{message}");
    }
}
