use std::sync::Arc;

use crate::TRACE_TARGET_SCRIPT;

/// Receiver for the one capability a script holds: `console.log`.
///
/// Called synchronously on the evaluation thread with every argument
/// already rendered to text. Shared between concurrent invocations, so
/// implementations must not assume lines from different scripts arrive in
/// any particular order.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, args: &[String]);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, args: &[String]) {
        (**self).log(args);
    }
}

/// Forwards script output to `tracing` under [`TRACE_TARGET_SCRIPT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    #[must_use]
    pub fn shared() -> Arc<dyn LogSink> {
        Arc::new(Self)
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, args: &[String]) {
        let message = args.join(" ");
        tracing::event!(
            name: "log",
            target: TRACE_TARGET_SCRIPT,
            tracing::Level::INFO,
            "{message}"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl NoopLogSink {
    #[must_use]
    pub fn shared() -> Arc<dyn LogSink> {
        Arc::new(Self)
    }
}

impl LogSink for NoopLogSink {
    fn log(&self, _args: &[String]) {}
}
