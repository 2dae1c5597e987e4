//! Tracer trait for observing test-unit execution.
//!
//! This module defines the [`Tracer`] trait and related types. The default
//! [`NoopTracer`] costs nothing when tracing is not needed, [`EventCollector`]
//! records events for assertions, and `LogTracer` (behind the `tracing` feature)
//! forwards them to the `tracing` crate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fixture_matrix::{Config, EventCollector, Runner};
//!
//! let collector = Arc::new(EventCollector::new());
//! let runner = Runner::with_tracer(collector.clone()).with_config(Config::default());
//! assert!(collector.is_empty());
//! # let _ = runner;
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::FailureKind;
use crate::relocate::SourceLocation;

/// Outcome of one test unit or sub-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CaseStatus {
    /// Returned normally.
    Passed,
    /// Propagated a failure of the given kind.
    Failed(FailureKind),
}

impl CaseStatus {
    /// Returns `true` for [`CaseStatus::Passed`].
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

/// Tracer trait for observing test-unit execution.
///
/// All methods have default empty implementations, so only the events of
/// interest need overriding.
pub trait Tracer: Send + Sync + 'static {
    /// Called before a unit runs.
    #[inline]
    fn on_unit_start(&self, _unit: &str) {}

    /// Called after each sub-case of a multi-combination unit.
    #[inline]
    fn on_subcase(&self, _unit: &str, _label: &str, _status: CaseStatus) {}

    /// Called when a failure has been re-pointed at a declaration site.
    #[inline]
    fn on_relocated(&self, _unit: &str, _location: &SourceLocation, _kind: FailureKind) {}

    /// Called after a unit finished, with its overall status. A
    /// multi-combination unit reports the worst status among its sub-cases.
    #[inline]
    fn on_unit_end(&self, _unit: &str, _status: CaseStatus, _duration: Duration) {}
}

/// Zero-cost tracer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

impl<T: Tracer> Tracer for Arc<T> {
    fn on_unit_start(&self, unit: &str) {
        (**self).on_unit_start(unit)
    }

    fn on_subcase(&self, unit: &str, label: &str, status: CaseStatus) {
        (**self).on_subcase(unit, label, status)
    }

    fn on_relocated(&self, unit: &str, location: &SourceLocation, kind: FailureKind) {
        (**self).on_relocated(unit, location, kind)
    }

    fn on_unit_end(&self, unit: &str, status: CaseStatus, duration: Duration) {
        (**self).on_unit_end(unit, status, duration)
    }
}

/// An event recorded by [`EventCollector`].
#[derive(Debug, Clone, PartialEq)]
pub enum SuiteEvent {
    /// A unit started.
    UnitStart {
        /// Unit name.
        unit: String,
    },
    /// A sub-case finished.
    Subcase {
        /// Unit name.
        unit: String,
        /// Combination label.
        label: String,
        /// Sub-case outcome.
        status: CaseStatus,
    },
    /// A failure was relocated.
    Relocated {
        /// Unit name.
        unit: String,
        /// Declaration site the failure now points at.
        location: SourceLocation,
        /// Kind of the relocated failure.
        kind: FailureKind,
    },
    /// A unit finished.
    UnitEnd {
        /// Unit name.
        unit: String,
        /// Overall outcome.
        status: CaseStatus,
        /// Wall-clock time spent in the unit.
        duration: Duration,
    },
}

/// Event collector for testing: accumulates events for assertions.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<SuiteEvent>>,
}

impl EventCollector {
    /// Create a new empty event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events as a vector.
    pub fn events(&self) -> Vec<SuiteEvent> {
        self.events.lock().clone()
    }

    /// Take collected events, clearing the collector.
    pub fn take(&self) -> Vec<SuiteEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Get the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Tracer for EventCollector {
    fn on_unit_start(&self, unit: &str) {
        self.events.lock().push(SuiteEvent::UnitStart {
            unit: unit.to_string(),
        });
    }

    fn on_subcase(&self, unit: &str, label: &str, status: CaseStatus) {
        self.events.lock().push(SuiteEvent::Subcase {
            unit: unit.to_string(),
            label: label.to_string(),
            status,
        });
    }

    fn on_relocated(&self, unit: &str, location: &SourceLocation, kind: FailureKind) {
        self.events.lock().push(SuiteEvent::Relocated {
            unit: unit.to_string(),
            location: location.clone(),
            kind,
        });
    }

    fn on_unit_end(&self, unit: &str, status: CaseStatus, duration: Duration) {
        self.events.lock().push(SuiteEvent::UnitEnd {
            unit: unit.to_string(),
            status,
            duration,
        });
    }
}

/// Tracer that forwards events to the `tracing` crate.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

#[cfg(feature = "tracing")]
impl Tracer for LogTracer {
    fn on_unit_start(&self, unit: &str) {
        tracing::debug!(unit, "test unit started");
    }

    fn on_subcase(&self, unit: &str, label: &str, status: CaseStatus) {
        match status {
            CaseStatus::Passed => tracing::debug!(unit, label, "sub-case passed"),
            CaseStatus::Failed(kind) => tracing::warn!(unit, label, ?kind, "sub-case failed"),
        }
    }

    fn on_relocated(&self, unit: &str, location: &SourceLocation, kind: FailureKind) {
        tracing::debug!(unit, %location, ?kind, "failure relocated to declaration site");
    }

    fn on_unit_end(&self, unit: &str, status: CaseStatus, duration: Duration) {
        match status {
            CaseStatus::Passed => tracing::info!(unit, ?duration, "test unit passed"),
            CaseStatus::Failed(kind) => tracing::warn!(unit, ?kind, ?duration, "test unit failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTracer {
        start_count: AtomicUsize,
        end_count: AtomicUsize,
    }

    impl Tracer for CountingTracer {
        fn on_unit_start(&self, _unit: &str) {
            self.start_count.fetch_add(1, Ordering::Relaxed);
        }

        fn on_unit_end(&self, _unit: &str, _status: CaseStatus, _duration: Duration) {
            self.end_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_counting_tracer() {
        let tracer = CountingTracer {
            start_count: AtomicUsize::new(0),
            end_count: AtomicUsize::new(0),
        };
        tracer.on_unit_start("test_a");
        tracer.on_unit_start("test_b");
        tracer.on_subcase("test_a", "x=1", CaseStatus::Passed);
        tracer.on_unit_end("test_a", CaseStatus::Passed, Duration::ZERO);

        assert_eq!(tracer.start_count.load(Ordering::Relaxed), 2);
        assert_eq!(tracer.end_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_collector_through_arc() {
        let collector = Arc::new(EventCollector::new());
        let tracer: Arc<EventCollector> = collector.clone();
        tracer.on_unit_start("test_a");
        tracer.on_unit_end("test_a", CaseStatus::Failed(FailureKind::Assertion), Duration::ZERO);
        assert_eq!(collector.len(), 2);
        let events = collector.take();
        assert!(matches!(events[0], SuiteEvent::UnitStart { ref unit } if unit == "test_a"));
        assert!(matches!(
            events[1],
            SuiteEvent::UnitEnd {
                status: CaseStatus::Failed(FailureKind::Assertion),
                ..
            }
        ));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_tracer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopTracer>();
        assert_send_sync::<Arc<EventCollector>>();
    }
}
