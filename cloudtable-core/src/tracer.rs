//! Injectable operation counters
//!
//! An [`OperationTracer`] counts named events and measures elapsed time since
//! it was created. It is constructed explicitly and handed to whatever needs
//! it; clones share the same counters. A disabled tracer is a single `None`
//! and every call on it is a no-op.

use crate::logger::OutcomeLogger;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const BATCHES_COMMITTED: &str = "batches_committed";
pub const OPERATIONS_COMMITTED: &str = "operations_committed";
pub const BATCHES_FAILED: &str = "batches_failed";
pub const BATCHES_ROTATED: &str = "batches_rotated";
pub const BATCHES_DISCARDED: &str = "batches_discarded";
pub const ENTITIES_RETRIEVED: &str = "entities_retrieved";

struct TracerInner {
    started_at: SystemTime,
    started: Instant,
    counters: RwLock<BTreeMap<String, u64>>,
}

/// Named counters plus a wall-clock timer
#[derive(Clone, Default)]
pub struct OperationTracer(Option<Arc<TracerInner>>);

impl fmt::Debug for OperationTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(inner) => f
                .debug_struct("OperationTracer")
                .field("counters", &inner.counters.read().len())
                .field("elapsed", &inner.started.elapsed())
                .finish(),
            None => f.write_str("OperationTracer(disabled)"),
        }
    }
}

impl OperationTracer {
    /// Create an enabled tracer; the timer starts now
    pub fn new() -> Self {
        Self(Some(Arc::new(TracerInner {
            started_at: SystemTime::now(),
            started: Instant::now(),
            counters: RwLock::new(BTreeMap::new()),
        })))
    }

    #[inline]
    pub fn disabled() -> Self {
        Self(None)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, amount: u64) {
        let Some(inner) = &self.0 else {
            return;
        };
        let mut counters = inner.counters.write();
        match counters.get_mut(name) {
            Some(value) => *value = value.saturating_add(amount),
            None => {
                counters.insert(name.to_string(), amount);
            }
        }
    }

    pub fn set(&self, name: &str, value: u64) {
        if let Some(inner) = &self.0 {
            inner.counters.write().insert(name.to_string(), value);
        }
    }

    /// Current value of a counter; 0 if never touched or disabled
    pub fn get(&self, name: &str) -> u64 {
        self.0
            .as_ref()
            .and_then(|inner| inner.counters.read().get(name).copied())
            .unwrap_or(0)
    }

    pub fn elapsed(&self) -> Duration {
        self.0
            .as_ref()
            .map(|inner| inner.started.elapsed())
            .unwrap_or_default()
    }

    /// Snapshot of every counter; `None` when disabled
    pub fn report(&self) -> Option<TraceReport> {
        let inner = self.0.as_ref()?;
        Some(TraceReport {
            started_at: inner.started_at,
            elapsed: inner.started.elapsed(),
            counters: inner
                .counters
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        })
    }

    /// Write the report line by line through `logger`
    pub fn log_report(&self, logger: &dyn OutcomeLogger) {
        if let Some(report) = self.report() {
            for line in report.to_string().lines() {
                logger.info(line);
            }
        }
    }
}

/// Point-in-time view of an [`OperationTracer`]
#[derive(Debug, Clone, PartialEq)]
pub struct TraceReport {
    pub started_at: SystemTime,
    pub elapsed: Duration,
    /// Sorted by counter name
    pub counters: Vec<(String, u64)>,
}

impl TraceReport {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .iter()
            .find(|(k, _)| k == name)
            .map_or(0, |(_, v)| *v)
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self
            .started_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        writeln!(f, "STARTED AT: {:.3} (unix seconds)", started.as_secs_f64())?;
        writeln!(f, "EXEC. TIME: {:.3} seconds", self.elapsed.as_secs_f64())?;
        for (name, value) in &self.counters {
            writeln!(f, "{name} {value}")?;
        }
        Ok(())
    }
}
