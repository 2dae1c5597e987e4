//! Test synthesis: one runnable unit per fixture, bound to the shared function.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::Failure;
use crate::function::{panic_message, TestFn};
use crate::matrix::{resolve, Combination, OptionsMatrix};
use crate::registry::{Entry, Fixture, FixtureRegistry, PlainTest};
use crate::relocate::{Relocated, Relocator, SourceLocation};
use crate::value::{flatten_positional, split_into_args_kwargs, FixtureItem, Keywords};

/// Receives the outcome of every sub-case of a multi-combination unit.
///
/// This is the external sub-case mechanism: a failing sub-case is reported here
/// and the remaining sub-cases still run.
pub trait SubcaseSink {
    /// Called once per combination, in matrix order.
    fn report(&mut self, combination: &Combination, outcome: Result<(), Relocated>);
}

impl<F: FnMut(&Combination, Result<(), Relocated>)> SubcaseSink for F {
    fn report(&mut self, combination: &Combination, outcome: Result<(), Relocated>) {
        self(combination, outcome)
    }
}

/// What a test unit runs.
#[derive(Debug, Clone)]
pub enum UnitBody {
    /// A fixture expanded against the options matrix and the shared function.
    Fixture {
        /// The fixture.
        fixture: Fixture,
        /// Shared test function.
        function: TestFn,
        /// Effective options matrix of the group.
        matrix: Arc<OptionsMatrix>,
    },
    /// A hand-written test run as-is.
    Plain {
        /// The test body.
        test: PlainTest,
        /// Where it was declared.
        declared_at: Option<SourceLocation>,
    },
}

/// A uniquely named, independently runnable test unit.
#[derive(Debug, Clone)]
pub struct TestUnit {
    name: String,
    entry_name: String,
    container: SourceLocation,
    body: UnitBody,
}

impl TestUnit {
    /// Unit name, e.g. `test_a` for fixture `a`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the registry entry the unit was built from.
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// What the unit runs.
    pub fn body(&self) -> &UnitBody {
        &self.body
    }

    /// Declaration site failures of this unit are reported at.
    pub fn location(&self, relocator: &Relocator) -> SourceLocation {
        let declared = match &self.body {
            UnitBody::Fixture { fixture, .. } => fixture.declared_at(),
            UnitBody::Plain { declared_at, .. } => declared_at.as_ref(),
        };
        relocator.locate(&self.entry_name, declared, &self.container)
    }

    /// Run the unit.
    ///
    /// Returns normally, or propagates exactly one relocated failure. For a
    /// fixture whose matrix resolves to two or more combinations, every
    /// combination runs and reports through `subcases`; the unit itself then
    /// returns `Ok(())`.
    pub fn run(&self, relocator: &Relocator, subcases: &mut dyn SubcaseSink) -> Result<(), Relocated> {
        let relocate = |failure: Failure| relocator.relocate(failure, &self.location(relocator));
        match &self.body {
            UnitBody::Plain { test, .. } => panic::catch_unwind(AssertUnwindSafe(|| test.run()))
                .unwrap_or_else(|payload| Err(Failure::assertion(panic_message(payload.as_ref()))))
                .map_err(relocate),
            UnitBody::Fixture {
                fixture,
                function,
                matrix,
            } => {
                let (positional, literal) = split_into_args_kwargs(fixture.items());
                let combinations = resolve(matrix, literal.keys()).map_err(relocate)?;
                if let [only] = combinations.as_slice() {
                    return invoke(function, &positional, &literal, only).map_err(relocate);
                }
                for combination in &combinations {
                    let outcome = invoke(function, &positional, &literal, combination)
                        .map_err(|failure| relocate(failure).with_subcase(combination.label()));
                    subcases.report(combination, outcome);
                }
                Ok(())
            }
        }
    }
}

/// Call the shared function with `(*positional, **{**combination, **literal})`.
fn invoke(
    function: &TestFn,
    positional: &[FixtureItem],
    literal: &Keywords,
    combination: &Combination,
) -> Result<(), Failure> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut keywords = combination.keywords().clone();
        keywords.merge(literal);
        let values = flatten_positional(positional, &keywords)?;
        function.invoke(values, &keywords)
    }))
    .unwrap_or_else(|payload| Err(Failure::assertion(panic_message(payload.as_ref()))))
}

/// Build the test units of a registry, in declaration order.
///
/// Produces nothing when `function` is absent. Reserved entries and fixtures
/// whose name already carries the test prefix are skipped; plain tests are
/// passed through unchanged.
pub fn synthesize(
    registry: &FixtureRegistry,
    function: Option<&TestFn>,
    matrix: &Arc<OptionsMatrix>,
    container: &SourceLocation,
) -> Vec<TestUnit> {
    let Some(function) = function else {
        return Vec::new();
    };
    let config = registry.config();
    registry
        .iter()
        .filter_map(|(name, entry)| {
            let (unit_name, body) = match entry {
                Entry::Fixture(fixture) if !config.is_reserved(name) && !config.is_test_name(name) => (
                    config.test_name(name),
                    UnitBody::Fixture {
                        fixture: fixture.clone(),
                        function: function.clone(),
                        matrix: matrix.clone(),
                    },
                ),
                Entry::Plain { test, declared_at } => (
                    name.to_string(),
                    UnitBody::Plain {
                        test: test.clone(),
                        declared_at: declared_at.clone(),
                    },
                ),
                _ => return None,
            };
            Some(TestUnit {
                name: unit_name,
                entry_name: name.to_string(),
                container: container.clone(),
                body,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::FailureKind;
    use crate::function::check_eq;
    use crate::signature::Signature;
    use crate::{matrix, options, values};

    fn sum_fn() -> TestFn {
        TestFn::new(
            "sum_test",
            Signature::new().positional("total").variadic("terms").keyword_default("optional", 0),
            |args| {
                let terms: i64 = args.rest().iter().filter_map(|v| v.as_int()).sum();
                check_eq(args.int("total")?, terms + args.int("optional")?)
            },
        )
    }

    fn units(fixtures: Vec<(&str, Vec<FixtureItem>)>, m: OptionsMatrix, f: Option<TestFn>) -> Vec<TestUnit> {
        let mut registry = FixtureRegistry::new(Arc::new(Config::default()));
        for (name, items) in fixtures {
            let declared = SourceLocation::new("sums.rs", 10, "sums");
            registry
                .insert(name, Entry::Fixture(Fixture::new(name, items, Some(declared))))
                .unwrap();
        }
        let container = SourceLocation::new("sums.rs", 1, "sums");
        synthesize(&registry, f.as_ref(), &Arc::new(m), &container)
    }

    fn no_subcases() -> impl FnMut(&Combination, Result<(), Relocated>) {
        |c: &Combination, _: Result<(), Relocated>| panic!("unexpected sub-case {}", c)
    }

    #[test]
    fn test_one_unit_per_fixture_in_order() {
        let units = units(
            vec![("b", values![6, 3, 2, 1]), ("a", values![3, 2, 1])],
            OptionsMatrix::new(),
            Some(sum_fn()),
        );
        let names: Vec<_> = units.iter().map(TestUnit::name).collect();
        assert_eq!(names, vec!["test_b", "test_a"]);
        let relocator = Relocator::default();
        for unit in &units {
            unit.run(&relocator, &mut no_subcases()).unwrap();
        }
    }

    #[test]
    fn test_absent_function_yields_no_units() {
        assert!(units(vec![("a", values![3, 2, 1])], OptionsMatrix::new(), None).is_empty());
    }

    #[test]
    fn test_failure_is_relocated_to_declaration() {
        let units = units(vec![("c", values![15, 5, 3])], OptionsMatrix::new(), Some(sum_fn()));
        let err = units[0].run(&Relocator::default(), &mut no_subcases()).unwrap_err();
        assert_eq!(err.failure.kind(), FailureKind::Assertion);
        assert_eq!(err.location.line, 10);
    }

    #[test]
    fn test_literal_keywords_win_over_matrix() {
        let units = units(
            vec![("a", values![4, 3, options!(optional = 1)])],
            matrix!(optional = [100, 200]),
            Some(sum_fn()),
        );
        // `optional` is bound literally, so the matrix does not drive it: one plain run.
        units[0].run(&Relocator::default(), &mut no_subcases()).unwrap();
    }

    #[test]
    fn test_multi_combination_reports_every_subcase() {
        let units = units(
            vec![("a", values![3, 2])],
            matrix!(optional = [1, 0, 1]),
            Some(sum_fn()),
        );
        let mut seen = Vec::new();
        let mut sink = |c: &Combination, outcome: Result<(), Relocated>| seen.push((c.label(), outcome.is_ok()));
        units[0].run(&Relocator::default(), &mut sink).unwrap();
        assert_eq!(
            seen,
            vec![
                ("optional=1".to_string(), true),
                ("optional=0".to_string(), false),
                ("optional=1".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_empty_matrix_fails_before_invocation() {
        let f = TestFn::new("never", Signature::new().keyword("arg"), |_| panic!("must not run"));
        let units = units(
            vec![("a", values![])],
            OptionsMatrix::new().dimension("arg", Vec::<i64>::new()),
            Some(f),
        );
        let err = units[0].run(&Relocator::default(), &mut no_subcases()).unwrap_err();
        assert_eq!(err.failure.kind(), FailureKind::EmptyMatrix);
        assert!(err.to_string().contains("no values"));
    }
}
