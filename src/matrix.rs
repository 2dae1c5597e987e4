//! Options matrices and their cartesian expansion.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::Failure;
use crate::value::{Keywords, Options, Value};

/// Mapping from option name to an ordered list of candidate values.
///
/// Dimension order is declaration order and is the dimension order of the product:
/// the first dimension varies slowest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsMatrix {
    dimensions: Vec<(Arc<str>, Arc<[Value]>)>,
}

impl OptionsMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a matrix with `name` set to `candidates`, replacing any previous list.
    #[must_use]
    pub fn dimension<I, T>(mut self, name: impl Into<Arc<str>>, candidates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.insert(name.into(), candidates.into_iter().map(Into::into).collect());
        self
    }

    /// Matrix whose every dimension has exactly the one value given in `options`.
    pub fn from_options(options: &Options) -> Self {
        let mut matrix = Self::new();
        for (name, value) in options.keywords().iter() {
            matrix.insert(name.into(), Arc::from(vec![value.clone()]));
        }
        matrix
    }

    fn insert(&mut self, name: Arc<str>, candidates: Arc<[Value]>) {
        match self.dimensions.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = candidates,
            None => self.dimensions.push((name, candidates)),
        }
    }

    /// Shallow override-merge: entries of `overrides` replace same-named entries
    /// (keeping their position); new names are appended.
    #[must_use]
    pub fn merged(&self, overrides: &OptionsMatrix) -> Self {
        let mut matrix = self.clone();
        for (name, candidates) in &overrides.dimensions {
            matrix.insert(name.clone(), candidates.clone());
        }
        matrix
    }

    /// Candidate list of a dimension.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.dimensions
            .iter()
            .find(|(k, _)| &**k == name)
            .map(|(_, v)| &**v)
    }

    /// Dimension names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions.iter().map(|(k, _)| &**k)
    }

    /// Dimensions in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> + '_ {
        self.dimensions.iter().map(|(k, v)| (&**k, &**v))
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns `true` if there are no dimensions.
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// One element of a resolved matrix: a chosen value per driven option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Combination(Keywords);

impl Combination {
    /// Chosen values, in dimension order.
    pub fn keywords(&self) -> &Keywords {
        &self.0
    }

    /// Consume into the chosen values.
    pub fn into_keywords(self) -> Keywords {
        self.0
    }

    /// `name=value` pairs joined with `, `; empty for the implicit combination.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Compute the combinations to run for a fixture.
///
/// Dimensions whose name is in `bound` are supplied literally by the fixture and
/// are not driven by the matrix. An empty (or fully bound) matrix resolves to a
/// single empty combination. Any driven dimension with no candidates fails the
/// whole resolution with [`Failure::EmptyMatrix`].
pub fn resolve<I, S>(matrix: &OptionsMatrix, bound: I) -> Result<Vec<Combination>, Failure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let bound: HashSet<String> = bound.into_iter().map(|s| s.as_ref().to_string()).collect();
    let driven: Vec<(&str, &[Value])> = matrix
        .iter()
        .filter(|(name, _)| !bound.contains(*name))
        .collect();

    let empty: Vec<String> = driven
        .iter()
        .filter(|(_, candidates)| candidates.is_empty())
        .map(|(name, _)| name.to_string())
        .collect();
    if !empty.is_empty() {
        return Err(Failure::EmptyMatrix { options: empty });
    }

    let mut combinations = vec![Keywords::new()];
    for (name, candidates) in driven {
        let mut next = Vec::with_capacity(combinations.len() * candidates.len());
        for combination in &combinations {
            for value in candidates {
                let mut extended = combination.clone();
                extended.insert(name, value.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }
    Ok(combinations.into_iter().map(Combination).collect())
}

/// Build an [`OptionsMatrix`](crate::OptionsMatrix) from `name = [values..]` pairs.
#[macro_export]
macro_rules! matrix {
    ($($name:ident = [$($value:expr),* $(,)?]),* $(,)?) => {
        $crate::OptionsMatrix::new()$(
            .dimension(
                stringify!($name),
                ::std::vec::Vec::<$crate::Value>::from([$($crate::Value::from($value)),*]),
            )
        )*
    };
}
