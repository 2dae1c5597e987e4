//! Fixture groups: definition, derivation, and composition.
//!
//! A [`Group`] is an immutable snapshot of a fixture registry, an options matrix,
//! and an optional shared test function. Groups are defined with a
//! [`GroupBuilder`] and composed with [`Group::extend`], [`Group::rebind`] and
//! [`Group::derive`], none of which touch the group they start from.
//!
//! # Example
//!
//! ```
//! use fixture_matrix::{check_eq, values, Group, Signature, TestFn};
//!
//! let sum = TestFn::new(
//!     "sum_test",
//!     Signature::new().positional("total").variadic("terms"),
//!     |args| {
//!         let terms: i64 = args.rest().iter().filter_map(|v| v.as_int()).sum();
//!         check_eq(args.int("total")?, terms)
//!     },
//! );
//!
//! let group = Group::builder("sum_tests")
//!     .shared_test(sum)
//!     .fixture("a", values![3, 2, 1])
//!     .fixture("b", values![6, 3, 2, 1])
//!     .build()
//!     .unwrap();
//!
//! let names: Vec<_> = group.units().unwrap().iter().map(|u| u.name().to_string()).collect();
//! assert_eq!(names, ["test_a", "test_b"]);
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::error::{DefinitionError, Failure, NotFoundError};
use crate::function::TestFn;
use crate::matrix::OptionsMatrix;
use crate::registry::{Entry, Fixture, FixtureRegistry, PlainTest};
use crate::relocate::SourceLocation;
use crate::synth::{synthesize, TestUnit};
use crate::value::{tup, Callable, FixtureItem, Options, Value};

/// A named collection of fixtures sharing one test function and options matrix.
///
/// Cloning is cheap: the registry and matrix are shared by `Arc`.
#[derive(Debug, Clone)]
pub struct Group {
    name: Arc<str>,
    registry: Arc<FixtureRegistry>,
    function: Option<TestFn>,
    matrix: Arc<OptionsMatrix>,
    declared_at: SourceLocation,
}

impl Group {
    /// Start defining a group with the default naming rules.
    ///
    /// The caller's location is recorded as the group's declaration site.
    #[track_caller]
    pub fn builder(name: impl Into<Arc<str>>) -> GroupBuilder {
        let name = name.into();
        let declared_at = SourceLocation::caller(&*name);
        GroupBuilder::new(name, Arc::new(Config::default()), declared_at)
    }

    /// Start defining a group with custom naming rules.
    #[track_caller]
    pub fn builder_with_config(name: impl Into<Arc<str>>, config: Config) -> GroupBuilder {
        let name = name.into();
        let declared_at = SourceLocation::caller(&*name);
        GroupBuilder::new(name, Arc::new(config), declared_at)
    }

    /// Start defining a group on top of this one.
    ///
    /// The new group inherits every fixture first, in this group's order, then its
    /// shared test function and options matrix. A fixture added to the builder
    /// under an inherited name replaces the inherited one in place, but only once;
    /// matrices added to it override same-named dimensions.
    #[track_caller]
    pub fn derive(&self, name: impl Into<Arc<str>>) -> GroupBuilder {
        let name = name.into();
        let declared_at = SourceLocation::caller(&*name);
        GroupBuilder {
            name,
            registry: FixtureRegistry::inherit(&self.registry),
            function: self.function.clone(),
            slot_set: true,
            matrix: (*self.matrix).clone(),
            declared_at,
            error: None,
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the group was declared.
    pub fn declared_at(&self) -> &SourceLocation {
        &self.declared_at
    }

    /// Naming rules in effect.
    pub fn config(&self) -> &Config {
        self.registry.config()
    }

    /// The group's fixtures and other entries.
    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    /// Fixture registered under `name`.
    pub fn fixture(&self, name: &str) -> Result<&Fixture, NotFoundError> {
        self.registry.fixture(name)
    }

    /// The shared test function, if the group has one.
    pub fn shared_test(&self) -> Option<&TestFn> {
        self.function.as_ref()
    }

    /// The effective options matrix.
    pub fn options_matrix(&self) -> &OptionsMatrix {
        &self.matrix
    }

    /// Returns `true` if the group has a shared test function and can run.
    pub fn is_runnable(&self) -> bool {
        self.function.is_some()
    }

    /// Synthesized test units in declaration order, or `None` when the group is
    /// not runnable.
    pub fn units(&self) -> Option<Vec<TestUnit>> {
        self.function
            .as_ref()
            .map(|function| synthesize(&self.registry, Some(function), &self.matrix, &self.declared_at))
    }

    /// The test unit named `name`, e.g. `test_a`.
    pub fn unit(&self, name: &str) -> Result<TestUnit, NotFoundError> {
        self.units()
            .unwrap_or_default()
            .into_iter()
            .find(|unit| unit.name() == name)
            .ok_or_else(|| NotFoundError {
                name: name.to_string(),
            })
    }

    // === Composition ===

    /// A new group whose matrix is this group's matrix overridden by `overrides`.
    /// Fixtures and shared test function are unchanged.
    #[must_use]
    pub fn extend(&self, overrides: &OptionsMatrix) -> Group {
        Group {
            matrix: Arc::new(self.matrix.merged(overrides)),
            ..self.clone()
        }
    }

    /// A new group identical to this one except for its shared test function.
    ///
    /// Rebinding a group that had no shared test function makes it runnable.
    #[must_use]
    pub fn rebind(&self, function: TestFn) -> Group {
        Group {
            function: Some(function),
            ..self.clone()
        }
    }

    /// Same as [`Group::extend`].
    #[must_use]
    pub fn with_options_matrix(&self, matrix: OptionsMatrix) -> Group {
        self.extend(&matrix)
    }

    /// [`Group::extend`] with one single-valued dimension per option.
    #[must_use]
    pub fn with_options(&self, options: Options) -> Group {
        self.extend(&OptionsMatrix::from_options(&options))
    }

    /// Same as [`Group::rebind`].
    #[must_use]
    pub fn with_test(&self, function: TestFn) -> Group {
        self.rebind(function)
    }
}

/// Builder for [`Group`].
///
/// Definition errors are recorded as they happen and returned from
/// [`GroupBuilder::build`]; entries after the first error are ignored.
#[derive(Debug)]
pub struct GroupBuilder {
    name: Arc<str>,
    registry: FixtureRegistry,
    function: Option<TestFn>,
    slot_set: bool,
    matrix: OptionsMatrix,
    declared_at: SourceLocation,
    error: Option<DefinitionError>,
}

impl GroupBuilder {
    fn new(name: Arc<str>, config: Arc<Config>, declared_at: SourceLocation) -> Self {
        Self {
            name,
            registry: FixtureRegistry::new(config),
            function: None,
            slot_set: false,
            matrix: OptionsMatrix::new(),
            declared_at,
            error: None,
        }
    }

    fn record(mut self, result: Result<(), DefinitionError>) -> Self {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
        self
    }

    fn insert(mut self, name: Arc<str>, entry: Entry) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = self.registry.insert(name, entry);
        self.record(result)
    }

    fn claim_slot(mut self, function: Option<TestFn>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = self.registry.claim_shared_slot();
        if result.is_ok() {
            self.function = function;
            self.slot_set = true;
        }
        self.record(result)
    }

    // === Shared test function ===

    /// Set the shared test function. May be set once per group.
    pub fn shared_test(self, function: TestFn) -> Self {
        self.claim_slot(Some(function))
    }

    /// Declare the shared test function slot explicitly absent. The group is
    /// then a base for other groups and produces no test units itself.
    pub fn no_shared_test(self) -> Self {
        self.claim_slot(None)
    }

    // === Fixtures ===

    /// Add fixture `name`, recording the caller's location as its declaration site.
    #[track_caller]
    pub fn fixture<I, T>(self, name: impl Into<Arc<str>>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FixtureItem>,
    {
        let declared_at = SourceLocation::caller(&*self.name);
        let name = name.into();
        let items: Vec<FixtureItem> = items.into_iter().map(Into::into).collect();
        let fixture = Fixture::new(name.clone(), items, Some(declared_at));
        self.insert(name, Entry::Fixture(fixture))
    }

    /// Add fixture `name` whose first positional value is `callable`, followed by
    /// `extras`.
    #[track_caller]
    pub fn callable<I, T>(self, name: impl Into<Arc<str>>, callable: Callable, extras: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FixtureItem>,
    {
        self.fixture(name, tup(callable, extras))
    }

    /// Add fixtures supplied programmatically. They carry no declaration site,
    /// so failures are located by scanning the group's source file.
    pub fn fixtures<I, N, V, T>(mut self, fixtures: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<Arc<str>>,
        V: IntoIterator<Item = T>,
        T: Into<FixtureItem>,
    {
        for (name, items) in fixtures {
            let name = name.into();
            let items: Vec<FixtureItem> = items.into_iter().map(Into::into).collect();
            let fixture = Fixture::new(name.clone(), items, None);
            self = self.insert(name, Entry::Fixture(fixture));
        }
        self
    }

    /// Add a hand-written test unit. Its name must carry the test prefix to run.
    #[track_caller]
    pub fn plain_test<F>(self, name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn() -> Result<(), Failure> + Send + Sync + 'static,
    {
        let declared_at = Some(SourceLocation::caller(&*self.name));
        let test = PlainTest::new(body);
        self.insert(name.into(), Entry::Plain { test, declared_at })
    }

    /// Add a private entry. Names with the reserved prefix may be reassigned.
    pub fn reserved(self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.insert(name.into(), Entry::Reserved(value.into()))
    }

    // === Options ===

    /// Override-merge `matrix` into the group's options matrix.
    pub fn options_matrix(mut self, matrix: OptionsMatrix) -> Self {
        self.matrix = self.matrix.merged(&matrix);
        self
    }

    /// Override-merge one single-valued dimension per option.
    pub fn options(self, options: Options) -> Self {
        self.options_matrix(OptionsMatrix::from_options(&options))
    }

    /// Finish the group.
    ///
    /// Fails with the first definition error recorded, or with
    /// [`DefinitionError::MissingSharedFunction`] when the shared test function
    /// slot was never declared (derived groups inherit their base's).
    pub fn build(self) -> Result<Group, DefinitionError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.slot_set {
            return Err(DefinitionError::MissingSharedFunction {
                group: self.name.to_string(),
            });
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            group = %self.name,
            entries = self.registry.len(),
            dimensions = self.matrix.len(),
            runnable = self.function.is_some(),
            "fixture group defined"
        );
        Ok(Group {
            name: self.name,
            registry: Arc::new(self.registry),
            function: self.function,
            matrix: Arc::new(self.matrix),
            declared_at: self.declared_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictKind;
    use crate::function::check_eq;
    use crate::matrix::Combination;
    use crate::relocate::{Relocated, Relocator};
    use crate::signature::Signature;
    use crate::{matrix, options, values};

    fn noop() -> TestFn {
        TestFn::new("noop", Signature::new().variadic("args"), |_| Ok(()))
    }

    fn conflict_kind(result: Result<Group, DefinitionError>) -> ConflictKind {
        match result {
            Err(DefinitionError::Conflict { kind, .. }) => kind,
            other => panic!("expected conflict, got {:?}", other.map(|g| g.name().to_string())),
        }
    }

    #[test]
    fn test_builder_records_locations() {
        let group = Group::builder("g")
            .shared_test(noop())
            .fixture("a", values![1])
            .build()
            .unwrap();
        assert!(group.declared_at().file.ends_with("group.rs"));
        assert_eq!(group.declared_at().enclosing, "g");
        let declared = group.fixture("a").unwrap().declared_at().unwrap();
        assert!(declared.line >= group.declared_at().line);
    }

    #[test]
    fn test_duplicate_fixture_fails_build() {
        let result = Group::builder("g")
            .shared_test(noop())
            .fixture("a", values![1])
            .fixture("a", values![2])
            .build();
        assert_eq!(conflict_kind(result), ConflictKind::Duplicate);
    }

    #[test]
    fn test_missing_shared_function() {
        let err = Group::builder("g").fixture("a", values![1]).build().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::MissingSharedFunction {
                group: "g".to_string()
            }
        );
    }

    #[test]
    fn test_shared_test_set_twice() {
        let result = Group::builder("g").shared_test(noop()).no_shared_test().build();
        assert_eq!(conflict_kind(result), ConflictKind::SharedSlotReassigned);
    }

    #[test]
    fn test_absent_function_is_not_runnable() {
        let group = Group::builder("base")
            .no_shared_test()
            .fixture("a", values![1])
            .build()
            .unwrap();
        assert!(!group.is_runnable());
        assert!(group.units().is_none());
        assert!(group.unit("test_a").is_err());
        assert!(group.with_test(noop()).is_runnable());
        assert!(!group.is_runnable());
    }

    #[test]
    fn test_reserved_and_prefixed_entries_produce_no_units() {
        let group = Group::builder("g")
            .shared_test(noop())
            .reserved("_cache", 1)
            .reserved("_cache", 2)
            .fixture("test_literal", values![1])
            .fixture("a", values![1])
            .build()
            .unwrap();
        let names: Vec<_> = group.units().unwrap().iter().map(|u| u.name().to_string()).collect();
        assert_eq!(names, ["test_a"]);
    }

    #[test]
    fn test_extend_overrides_without_touching_base() {
        let base = Group::builder("g")
            .shared_test(noop())
            .options_matrix(matrix!(x = [1, 2], y = [3]))
            .fixture("a", values![1])
            .build()
            .unwrap();
        let extended = base.with_options(options!(x = 9));
        assert_eq!(extended.options_matrix().get("x"), Some(&[Value::Int(9)][..]));
        assert_eq!(extended.options_matrix().get("y"), Some(&[Value::Int(3)][..]));
        assert_eq!(base.options_matrix().get("x").map(<[Value]>::len), Some(2));
        assert!(extended.fixture("a").is_ok());
    }

    #[test]
    fn test_derive_inherits_and_override_merges() {
        let base = Group::builder("base")
            .no_shared_test()
            .options_matrix(matrix!(suffix1 = ["x", "x"]))
            .fixture("a", values![1])
            .build()
            .unwrap();
        let derived = base
            .derive("derived")
            .shared_test(noop())
            .options_matrix(matrix!(suffix2 = ["y", "y"]))
            .fixture("b", values![2])
            .build()
            .unwrap();
        let dims: Vec<_> = derived.options_matrix().names().collect();
        assert_eq!(dims, ["suffix1", "suffix2"]);
        let names: Vec<_> = derived.units().unwrap().iter().map(|u| u.name().to_string()).collect();
        assert_eq!(names, ["test_a", "test_b"]);
    }

    #[test]
    fn test_derived_fixture_overrides_inherited() {
        let check = TestFn::new("check", Signature::new().positional("x"), |args| {
            check_eq(args.int("x")?, 2)
        });
        let base = Group::builder("base")
            .shared_test(check)
            .fixture("a", values![1])
            .fixture("b", values![2])
            .build()
            .unwrap();
        let derived = base.derive("derived").fixture("a", values![2]).build().unwrap();
        let names: Vec<_> = derived.units().unwrap().iter().map(|u| u.name().to_string()).collect();
        assert_eq!(names, vec!["test_a", "test_b"]);
        let relocator = Relocator::default();
        let mut sink = |c: &Combination, _: Result<(), Relocated>| panic!("unexpected sub-case {}", c);
        derived.unit("test_a").unwrap().run(&relocator, &mut sink).unwrap();
        assert!(base.unit("test_a").unwrap().run(&relocator, &mut sink).is_err());
    }

    #[test]
    fn test_derived_fixture_declared_twice_conflicts() {
        let base = Group::builder("base")
            .shared_test(noop())
            .fixture("a", values![1])
            .build()
            .unwrap();
        let result = base
            .derive("derived")
            .fixture("a", values![2])
            .fixture("a", values![3])
            .build();
        assert_eq!(conflict_kind(result), ConflictKind::Duplicate);
    }

    #[test]
    fn test_derived_group_inherits_shared_function() {
        let check = TestFn::new("check", Signature::new().positional("x"), |args| {
            check_eq(args.int("x")?, 1)
        });
        let base = Group::builder("base").shared_test(check).build().unwrap();
        let derived = base.derive("derived").fixture("one", values![1]).build().unwrap();
        assert!(derived.is_runnable());
        assert_eq!(derived.shared_test().map(TestFn::name), Some("check"));
        assert!(derived.unit("test_one").is_ok());
    }

    #[test]
    fn test_first_error_wins() {
        let err = Group::builder("g")
            .fixture("a", values![1])
            .fixture("a", values![2])
            .plain_test("test_a", || Ok(()))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::Conflict {
                name: "a".to_string(),
                kind: ConflictKind::Duplicate
            }
        );
    }
}
