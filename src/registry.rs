//! Ordered fixture registry with conflict detection at insertion time.

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ConflictKind, DefinitionError, Failure, NotFoundError};
use crate::relocate::SourceLocation;
use crate::value::{FixtureItem, Value};

/// One named, declared set of input values.
#[derive(Debug, Clone)]
pub struct Fixture {
    name: Arc<str>,
    items: Arc<[FixtureItem]>,
    declared_at: Option<SourceLocation>,
}

impl Fixture {
    /// Create a fixture. `declared_at` is `None` for programmatically supplied values.
    pub fn new(
        name: impl Into<Arc<str>>,
        items: impl Into<Arc<[FixtureItem]>>,
        declared_at: Option<SourceLocation>,
    ) -> Self {
        Self {
            name: name.into(),
            items: items.into(),
            declared_at,
        }
    }

    /// Fixture name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value sequence, in declaration order.
    pub fn items(&self) -> &[FixtureItem] {
        &self.items
    }

    /// Where the fixture was declared, if captured.
    pub fn declared_at(&self) -> Option<&SourceLocation> {
        self.declared_at.as_ref()
    }
}

type PlainBody = dyn Fn() -> Result<(), Failure> + Send + Sync;

/// A hand-written test unit living beside the fixtures. It runs as-is and is
/// never expanded by the options matrix.
#[derive(Clone)]
pub struct PlainTest {
    body: Arc<PlainBody>,
}

impl PlainTest {
    /// Wrap a test body.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> Result<(), Failure> + Send + Sync + 'static,
    {
        Self { body: Arc::new(body) }
    }

    /// Run the body.
    pub fn run(&self) -> Result<(), Failure> {
        (self.body)()
    }
}

impl fmt::Debug for PlainTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlainTest(..)")
    }
}

/// What a registry name holds.
#[derive(Debug, Clone)]
pub enum Entry {
    /// A fixture's raw value sequence.
    Fixture(Fixture),
    /// A hand-written test unit.
    Plain {
        /// The test body.
        test: PlainTest,
        /// Where it was declared.
        declared_at: Option<SourceLocation>,
    },
    /// A private value under a reserved name.
    Reserved(Value),
    /// Marker for the shared test-function slot; the function itself lives on the group.
    SharedSlot,
}

#[derive(Debug, Clone)]
struct Slot {
    name: Arc<str>,
    entry: Entry,
    inherited: bool,
}

/// Ordered mapping from name to entry.
///
/// Iteration order equals insertion order. Cloning is cheap for the entries
/// themselves, which share their payloads by `Arc`.
///
/// Entries taken over from a base registry form a separate layer: a declaration
/// of the same name overrides them in place instead of conflicting.
#[derive(Debug, Clone)]
pub struct FixtureRegistry {
    config: Arc<Config>,
    entries: Vec<Slot>,
}

impl FixtureRegistry {
    /// Create an empty registry using the naming rules of `config`.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// A registry that starts with the entries of `base`, minus its shared slot.
    /// Every inherited entry may be overridden once by a new declaration.
    pub fn inherit(base: &FixtureRegistry) -> Self {
        Self {
            config: base.config.clone(),
            entries: base
                .entries
                .iter()
                .filter(|slot| !matches!(slot.entry, Entry::SharedSlot))
                .map(|slot| Slot {
                    inherited: true,
                    ..slot.clone()
                })
                .collect(),
        }
    }

    /// Naming rules in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|slot| &*slot.name == name)
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Register `entry` under `name`.
    ///
    /// Fails with a conflict when the name already holds a non-reassignable entry,
    /// when a plain test `test_x` would shadow fixture `x`, or the reverse.
    /// Reserved names other than the shared slot may be reassigned; the new value
    /// replaces the old one in place. An inherited entry is replaced in place by
    /// a declaration of the same name, and an inherited entry whose generated
    /// name collides with the new one is dropped.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, entry: Entry) -> Result<(), DefinitionError> {
        let name = name.into();
        let config = &self.config;
        let is_slot = *name == *config.shared_slot;

        if let Some(i) = self.position(&name) {
            let reassignable =
                self.entries[i].inherited || (config.is_reserved(&name) && !is_slot);
            if !reassignable {
                let kind = if is_slot {
                    ConflictKind::SharedSlotReassigned
                } else {
                    ConflictKind::Duplicate
                };
                return Err(conflict(&name, kind));
            }
        }

        let partner = if config.is_test_name(&name) {
            Some((
                name[config.test_prefix.len()..].to_string(),
                ConflictKind::PlainTestShadowsFixture,
            ))
        } else if !config.is_reserved(&name) {
            Some((config.test_name(&name), ConflictKind::FixtureShadowsPlainTest))
        } else {
            None
        };
        if let Some((partner, kind)) = partner {
            if let Some(j) = self.position(&partner) {
                if !self.entries[j].inherited {
                    return Err(conflict(&name, kind));
                }
                self.entries.remove(j);
            }
        }

        let slot = Slot {
            name,
            entry,
            inherited: false,
        };
        match self.position(&slot.name) {
            Some(i) => self.entries[i] = slot,
            None => self.entries.push(slot),
        }
        Ok(())
    }

    /// Claim the shared test-function slot. Succeeds exactly once per registry.
    pub fn claim_shared_slot(&mut self) -> Result<(), DefinitionError> {
        let slot: Arc<str> = self.config.shared_slot.as_str().into();
        self.insert(slot, Entry::SharedSlot)
    }

    /// Returns `true` if the shared test-function slot was claimed.
    pub fn has_shared_slot(&self) -> bool {
        self.contains(&self.config.shared_slot)
    }

    /// Entry registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&Entry, NotFoundError> {
        self.position(name)
            .map(|i| &self.entries[i].entry)
            .ok_or_else(|| NotFoundError {
                name: name.to_string(),
            })
    }

    /// Fixture registered under `name`.
    pub fn fixture(&self, name: &str) -> Result<&Fixture, NotFoundError> {
        match self.lookup(name)? {
            Entry::Fixture(fixture) => Ok(fixture),
            _ => Err(NotFoundError {
                name: name.to_string(),
            }),
        }
    }

    /// Every entry, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> + '_ {
        self.entries.iter().map(|slot| (&*slot.name, &slot.entry))
    }

    /// Fixtures that produce synthesized test units: neither reserved nor
    /// carrying the test prefix.
    pub fn runnable_fixtures(&self) -> impl Iterator<Item = &Fixture> + '_ {
        self.entries.iter().filter_map(move |slot| match &slot.entry {
            Entry::Fixture(fixture)
                if !self.config.is_reserved(&slot.name) && !self.config.is_test_name(&slot.name) =>
            {
                Some(fixture)
            }
            _ => None,
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn conflict(name: &str, kind: ConflictKind) -> DefinitionError {
    DefinitionError::Conflict {
        name: name.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    fn registry() -> FixtureRegistry {
        FixtureRegistry::new(Arc::new(Config::default()))
    }

    fn fixture(name: &str) -> Entry {
        Entry::Fixture(Fixture::new(name, values![1, 2], None))
    }

    fn plain() -> Entry {
        Entry::Plain {
            test: PlainTest::new(|| Ok(())),
            declared_at: None,
        }
    }

    fn conflict_kind(result: Result<(), DefinitionError>) -> ConflictKind {
        match result {
            Err(DefinitionError::Conflict { kind, .. }) => kind,
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut r = registry();
        for name in ["c", "a", "b"] {
            r.insert(name, fixture(name)).unwrap();
        }
        let names: Vec<_> = r.runnable_fixtures().map(Fixture::name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_fixture() {
        let mut r = registry();
        r.insert("a", fixture("a")).unwrap();
        assert_eq!(conflict_kind(r.insert("a", fixture("a"))), ConflictKind::Duplicate);
    }

    #[test]
    fn test_reserved_names_may_be_reassigned() {
        let mut r = registry();
        r.insert("_private", Entry::Reserved(1.into())).unwrap();
        r.insert("_private", Entry::Reserved(2.into())).unwrap();
        assert!(matches!(r.lookup("_private"), Ok(Entry::Reserved(Value::Int(2)))));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_shared_slot_claimed_once() {
        let mut r = registry();
        r.claim_shared_slot().unwrap();
        assert!(r.has_shared_slot());
        assert_eq!(conflict_kind(r.claim_shared_slot()), ConflictKind::SharedSlotReassigned);
    }

    #[test]
    fn test_plain_test_then_fixture() {
        let mut r = registry();
        r.insert("test_a", plain()).unwrap();
        assert_eq!(conflict_kind(r.insert("a", fixture("a"))), ConflictKind::FixtureShadowsPlainTest);
    }

    #[test]
    fn test_fixture_then_plain_test() {
        let mut r = registry();
        r.insert("a", fixture("a")).unwrap();
        assert_eq!(conflict_kind(r.insert("test_a", plain())), ConflictKind::PlainTestShadowsFixture);
    }

    #[test]
    fn test_duplicate_plain_test() {
        let mut r = registry();
        r.insert("test_1", plain()).unwrap();
        assert_eq!(conflict_kind(r.insert("test_1", plain())), ConflictKind::Duplicate);
    }

    #[test]
    fn test_reserved_names_skip_generated_name_check() {
        let mut r = registry();
        r.insert("test__x", plain()).unwrap();
        r.insert("_x", Entry::Reserved(Value::None)).unwrap();
        assert_eq!(r.runnable_fixtures().count(), 0);
    }

    #[test]
    fn test_lookup_missing() {
        let r = registry();
        assert_eq!(r.lookup("nope").unwrap_err().name, "nope");
        assert!(r.fixture("nope").is_err());
    }

    #[test]
    fn test_inherit_drops_shared_slot() {
        let mut base = registry();
        base.claim_shared_slot().unwrap();
        base.insert("a", fixture("a")).unwrap();
        let mut derived = FixtureRegistry::inherit(&base);
        assert!(!derived.has_shared_slot());
        derived.claim_shared_slot().unwrap();
        assert!(derived.fixture("a").is_ok());
    }

    #[test]
    fn test_inherited_entry_overridden_once() {
        let mut base = registry();
        base.insert("a", fixture("a")).unwrap();
        base.insert("b", fixture("b")).unwrap();
        let mut derived = FixtureRegistry::inherit(&base);
        derived
            .insert("a", Entry::Fixture(Fixture::new("a", values![9], None)))
            .unwrap();
        let names: Vec<_> = derived.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(derived.fixture("a").unwrap().items().len(), 1);
        assert_eq!(conflict_kind(derived.insert("a", fixture("a"))), ConflictKind::Duplicate);
        assert_eq!(base.fixture("a").unwrap().items().len(), 2);
    }

    #[test]
    fn test_inherited_partner_is_dropped() {
        let mut base = registry();
        base.insert("a", fixture("a")).unwrap();
        base.insert("test_b", plain()).unwrap();
        let mut derived = FixtureRegistry::inherit(&base);
        derived.insert("test_a", plain()).unwrap();
        derived.insert("b", fixture("b")).unwrap();
        let names: Vec<_> = derived.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["test_a", "b"]);
    }
}
