//! Outcome reporting capability
//!
//! Components report operation outcomes through an injected [`OutcomeLogger`]
//! rather than logging directly. Implementations are fire-and-forget and must
//! not panic.

use std::fmt::Debug;

/// Receives operation outcomes for observability
pub trait OutcomeLogger: Debug + Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);
}

/// Default logger: forwards to `tracing` events
///
/// With a `tracing-subscriber` fmt subscriber installed this is the local
/// console sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl OutcomeLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "cloudtable", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "cloudtable", "{message}");
    }
}

/// Discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentLogger;

impl OutcomeLogger for SilentLogger {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
