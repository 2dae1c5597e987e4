//! Adapter from synthesized test units to a unittest-style result.
//!
//! The [`Runner`] executes units in declaration order and feeds a [`Reporter`].
//! The bundled reporter, [`RunReport`], counts tests and collects failures
//! (assertion kind) and errors (every other kind), each carrying the relocated
//! diagnostic text.

use std::fmt;
use std::time::Instant;

use crate::config::Config;
use crate::error::{FailureKind, NotFoundError};
use crate::group::Group;
use crate::matrix::Combination;
use crate::relocate::{Relocated, Relocator, SourceLocation};
use crate::synth::TestUnit;
use crate::tracer::{CaseStatus, NoopTracer, Tracer};

/// Receives unit and sub-case outcomes from a [`Runner`].
pub trait Reporter {
    /// A unit is about to run.
    fn start_unit(&mut self, _unit: &str) {}

    /// One combination of a multi-combination unit finished.
    fn sub_case(&mut self, unit: &str, label: &str, outcome: &Result<(), Relocated>);

    /// A unit finished. For multi-combination units this is `Ok(())` unless the
    /// matrix itself could not be resolved.
    fn end_unit(&mut self, _unit: &str, _outcome: &Result<(), Relocated>) {}
}

fn status(outcome: &Result<(), Relocated>) -> CaseStatus {
    match outcome {
        Ok(()) => CaseStatus::Passed,
        Err(relocated) => CaseStatus::Failed(relocated.failure.kind()),
    }
}

/// Errors outrank assertion failures, which outrank a pass.
fn worse(current: CaseStatus, next: CaseStatus) -> CaseStatus {
    let rank = |status: CaseStatus| match status {
        CaseStatus::Passed => 0,
        CaseStatus::Failed(FailureKind::Assertion) => 1,
        CaseStatus::Failed(_) => 2,
    };
    if rank(next) > rank(current) {
        next
    } else {
        current
    }
}

/// One failed unit or sub-case.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CaseOutcome {
    /// Unit name.
    pub unit: String,
    /// Combination label, for sub-cases.
    pub subcase: Option<String>,
    /// Kind of the failure.
    pub kind: FailureKind,
    /// Declaration site the failure was relocated to.
    pub location: SourceLocation,
    /// Formatted relocated failure.
    pub message: String,
}

impl CaseOutcome {
    fn new(unit: &str, relocated: &Relocated) -> Self {
        Self {
            unit: unit.to_string(),
            subcase: relocated.subcase.clone(),
            kind: relocated.failure.kind(),
            location: relocated.location.clone(),
            message: relocated.to_string(),
        }
    }

    fn title(&self) -> String {
        match &self.subcase {
            Some(label) => format!("{} ({})", self.unit, label),
            None => self.unit.clone(),
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RunReport {
    /// Units started.
    pub tests_run: usize,
    /// Sub-cases reported by multi-combination units.
    pub subcases_run: usize,
    /// Assertion failures.
    pub failures: Vec<CaseOutcome>,
    /// Every other failure kind.
    pub errors: Vec<CaseOutcome>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, unit: &str, outcome: &Result<(), Relocated>) {
        if let Err(relocated) = outcome {
            let case = CaseOutcome::new(unit, relocated);
            if case.kind == FailureKind::Assertion {
                self.failures.push(case);
            } else {
                self.errors.push(case);
            }
        }
    }

    /// Returns `true` if nothing failed.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }

    /// Failures and errors, in the order they were recorded within each list.
    pub fn problems(&self) -> impl Iterator<Item = &CaseOutcome> + '_ {
        self.failures.iter().chain(self.errors.iter())
    }

    /// Panic with the formatted report unless every unit passed.
    #[track_caller]
    pub fn assert_ok(&self) {
        if !self.is_ok() {
            panic!("{}", self);
        }
    }

    /// Serialize the report as JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Reporter for RunReport {
    fn start_unit(&mut self, _unit: &str) {
        self.tests_run += 1;
    }

    fn sub_case(&mut self, unit: &str, _label: &str, outcome: &Result<(), Relocated>) {
        self.subcases_run += 1;
        self.record(unit, outcome);
    }

    fn end_unit(&mut self, unit: &str, outcome: &Result<(), Relocated>) {
        self.record(unit, outcome);
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, cases) in [("FAIL", &self.failures), ("ERROR", &self.errors)] {
            for case in cases {
                writeln!(f, "{}: {}", label, case.title())?;
                writeln!(f, "{}", case.message)?;
                writeln!(f)?;
            }
        }
        write!(f, "Ran {} tests", self.tests_run)?;
        if self.subcases_run > 0 {
            write!(f, " ({} sub-cases)", self.subcases_run)?;
        }
        writeln!(f)?;
        if self.is_ok() {
            write!(f, "OK")
        } else {
            write!(
                f,
                "FAILED (failures={}, errors={})",
                self.failures.len(),
                self.errors.len()
            )
        }
    }
}

/// Runs test units, reporting through a [`Reporter`] and a [`Tracer`].
///
/// # Example
///
/// ```
/// use fixture_matrix::{check_eq, values, Group, Runner, Signature, TestFn};
///
/// let double = TestFn::new(
///     "double",
///     Signature::new().positional("x").positional("expected"),
///     |args| check_eq(args.int("expected")?, args.int("x")? * 2),
/// );
/// let group = Group::builder("doubling")
///     .shared_test(double)
///     .fixture("two", values![1, 2])
///     .fixture("four", values![2, 4])
///     .build()
///     .unwrap();
///
/// let report = Runner::new().run_group(&group);
/// assert_eq!(report.tests_run, 2);
/// report.assert_ok();
/// ```
#[derive(Debug)]
pub struct Runner<T: Tracer = NoopTracer> {
    config: Config,
    relocator: Relocator,
    tracer: T,
}

impl Runner<NoopTracer> {
    /// Runner configured from the environment, without tracing.
    pub fn new() -> Self {
        Self::with_tracer(NoopTracer)
    }
}

impl Default for Runner<NoopTracer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tracer> Runner<T> {
    /// Runner configured from the environment, reporting to `tracer`.
    pub fn with_tracer(tracer: T) -> Self {
        let config = Config::from_env();
        Self {
            relocator: Relocator::new(&config),
            config,
            tracer,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(self, config: Config) -> Self {
        Self {
            relocator: Relocator::new(&config),
            config,
            tracer: self.tracer,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Relocator used for failures.
    pub fn relocator(&self) -> &Relocator {
        &self.relocator
    }

    /// Run a single unit, feeding `reporter`. Returns the unit's own outcome.
    pub fn execute(&self, unit: &TestUnit, reporter: &mut dyn Reporter) -> Result<(), Relocated> {
        let name = unit.name();
        let started = Instant::now();
        self.tracer.on_unit_start(name);
        reporter.start_unit(name);

        let mut worst = CaseStatus::Passed;
        let mut subcases = |combination: &Combination, outcome: Result<(), Relocated>| {
            let label = combination.label();
            if let Err(relocated) = &outcome {
                self.tracer.on_relocated(name, &relocated.location, relocated.failure.kind());
            }
            let sub_status = status(&outcome);
            worst = worse(worst, sub_status);
            self.tracer.on_subcase(name, &label, sub_status);
            reporter.sub_case(name, &label, &outcome);
        };
        let outcome = unit.run(&self.relocator, &mut subcases);

        if let Err(relocated) = &outcome {
            self.tracer.on_relocated(name, &relocated.location, relocated.failure.kind());
        }
        reporter.end_unit(name, &outcome);
        let end_status = worse(worst, status(&outcome));
        self.tracer.on_unit_end(name, end_status, started.elapsed());
        outcome
    }

    /// Run the unit named `name` of `group`.
    pub fn run_unit(&self, group: &Group, name: &str) -> Result<RunReport, NotFoundError> {
        let unit = group.unit(name)?;
        let mut report = RunReport::new();
        let _ = self.execute(&unit, &mut report);
        Ok(report)
    }

    /// Run every unit of `group` selected by the filter, in declaration order,
    /// feeding `reporter`. A group that is not runnable runs nothing.
    pub fn run_group_with(&self, group: &Group, reporter: &mut dyn Reporter) {
        let Some(units) = group.units() else {
            return;
        };
        for unit in units.iter().filter(|unit| self.config.selects(unit.name())) {
            let _ = self.execute(unit, reporter);
        }
    }

    /// Run every selected unit of `group` and collect a report.
    pub fn run_group(&self, group: &Group) -> RunReport {
        let mut report = RunReport::new();
        self.run_group_with(group, &mut report);
        report
    }
}
