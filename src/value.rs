//! Dynamic values carried by fixtures, option bundles, and keyword mappings.

use std::fmt;
use std::sync::Arc;

use crate::error::Failure;

/// Signature of a callable under test.
pub type CallableFn = dyn Fn(&[Value]) -> Result<Value, Failure> + Send + Sync;

/// A named function value, typically the "callable under test" of a fixture.
///
/// Clone is cheap as the function is wrapped by `Arc`.
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<CallableFn>,
}

impl Callable {
    /// Wrap a function under a name.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Result<Value, Failure> {
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// A dynamically typed value passed to a shared test function.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    None,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(Arc<str>),
    /// Ordered, fixed-size group of values.
    Tuple(Arc<[Value]>),
    /// Function value.
    Func(Callable),
}

impl Value {
    /// Short name of the variant, used in type mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Func(_) => "function",
        }
    }

    /// Returns `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as `f64`, if this is an `Int` or a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string slice, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is a `Tuple`.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// The function, if this is a `Func`.
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Func(c) => Some(c),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Func(c) => write!(f, "{:?}", c),
        }
    }
}

macro_rules! impl_value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Int(n as i64)
                }
            }
        )*
    };
}

impl_value_from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x as f64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Func(c)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(Arc::from(vec![a.into(), b.into()]))
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(Arc::from(vec![a.into(), b.into(), c.into()]))
    }
}

// ============================================================================
// Keyword mappings
// ============================================================================

/// Insertion-ordered mapping from keyword name to value.
///
/// Re-inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords(Vec<(Arc<str>, Value)>);

impl Keywords {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Merge `other` into `self`; keys of `other` win.
    pub fn merge(&mut self, other: &Keywords) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| &**k == name).map(|(_, v)| v)
    }

    /// Returns `true` if `name` is present.
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(k, _)| &**k)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> FromIterator<(K, V)> for Keywords {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut keywords = Keywords::new();
        for (k, v) in iter {
            keywords.insert(k, v);
        }
        keywords
    }
}

// ============================================================================
// Options
// ============================================================================

/// An immutable named bundle of keyword overrides, embedded among a fixture's
/// positional values.
///
/// # Example
///
/// ```
/// use fixture_matrix::{options, Options};
///
/// let opts = options!(a = 1, b = 2);
/// assert_eq!(opts, Options::new().set("a", 1).set("b", 2));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    keywords: Keywords,
}

impl Options {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a bundle with `name` set to `value`.
    #[must_use]
    pub fn set(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name, value);
        self
    }

    /// The overrides carried by this bundle.
    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }
}

// ============================================================================
// Fixture items
// ============================================================================

type EvaluatedFn = dyn Fn(&Keywords) -> Result<Vec<FixtureItem>, Failure> + Send + Sync;

/// A fixture item whose positional values are computed at invocation time from
/// the merged keyword mapping of the running combination.
#[derive(Clone)]
pub struct Evaluated(Arc<EvaluatedFn>);

impl fmt::Debug for Evaluated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Evaluated(..)")
    }
}

/// Mark `func` to be evaluated before the shared function is called. Its output is
/// spliced in place of the marker, recursively.
pub fn evaluated<F>(func: F) -> Evaluated
where
    F: Fn(&Keywords) -> Result<Vec<FixtureItem>, Failure> + Send + Sync + 'static,
{
    Evaluated(Arc::new(func))
}

/// One element of a fixture's raw value sequence.
#[derive(Debug, Clone)]
pub enum FixtureItem {
    /// Positional value.
    Value(Value),
    /// Keyword overrides.
    Options(Options),
    /// Positional values computed at invocation time.
    Evaluated(Evaluated),
}

impl From<Value> for FixtureItem {
    fn from(v: Value) -> Self {
        FixtureItem::Value(v)
    }
}

impl From<Options> for FixtureItem {
    fn from(o: Options) -> Self {
        FixtureItem::Options(o)
    }
}

impl From<Evaluated> for FixtureItem {
    fn from(e: Evaluated) -> Self {
        FixtureItem::Evaluated(e)
    }
}

macro_rules! impl_item_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FixtureItem {
                fn from(v: $t) -> Self {
                    FixtureItem::Value(v.into())
                }
            }
        )*
    };
}

impl_item_from_value!(
    bool, i8, i16, i32, i64, u8, u16, u32, usize, f32, f64, &str, String, (), Callable
);

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for FixtureItem {
    fn from(pair: (A, B)) -> Self {
        FixtureItem::Value(pair.into())
    }
}

/// Split a raw fixture sequence into positional items and merged keyword overrides.
///
/// Options bundles merge left to right with later keys winning; everything else
/// stays positional, in order.
pub fn split_into_args_kwargs(items: &[FixtureItem]) -> (Vec<FixtureItem>, Keywords) {
    let mut positional = Vec::new();
    let mut keywords = Keywords::new();
    for item in items {
        match item {
            FixtureItem::Options(options) => keywords.merge(options.keywords()),
            other => positional.push(other.clone()),
        }
    }
    (positional, keywords)
}

/// Resolve positional items into concrete values, running evaluated items against
/// `keywords`.
pub fn flatten_positional(items: &[FixtureItem], keywords: &Keywords) -> Result<Vec<Value>, Failure> {
    let mut out = Vec::with_capacity(items.len());
    flatten_into(items, keywords, &mut out)?;
    Ok(out)
}

fn flatten_into(items: &[FixtureItem], keywords: &Keywords, out: &mut Vec<Value>) -> Result<(), Failure> {
    for item in items {
        match item {
            FixtureItem::Value(v) => out.push(v.clone()),
            FixtureItem::Evaluated(Evaluated(func)) => {
                let produced = func(keywords)?;
                flatten_into(&produced, keywords, out)?;
            }
            FixtureItem::Options(_) => {
                return Err(anyhow::anyhow!("evaluated items cannot produce options").into())
            }
        }
    }
    Ok(())
}

/// Build a fixture sequence whose first positional value is `func`, followed by
/// `extra`.
pub fn tup<I, T>(func: Callable, extra: I) -> Vec<FixtureItem>
where
    I: IntoIterator<Item = T>,
    T: Into<FixtureItem>,
{
    std::iter::once(FixtureItem::Value(Value::Func(func)))
        .chain(extra.into_iter().map(Into::into))
        .collect()
}

/// Build an [`Options`] bundle from `name = value` pairs.
#[macro_export]
macro_rules! options {
    ($($name:ident = $value:expr),* $(,)?) => {
        $crate::Options::new()$(.set(stringify!($name), $value))*
    };
}

/// Build a fixture value sequence, converting each element into a
/// [`FixtureItem`](crate::FixtureItem).
#[macro_export]
macro_rules! values {
    ($($item:expr),* $(,)?) => {
        ::std::vec::Vec::<$crate::FixtureItem>::from([$($crate::FixtureItem::from($item)),*])
    };
}
