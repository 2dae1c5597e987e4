//! Parameter contracts of shared test functions and argument binding.
//!
//! Closures carry no introspectable parameter list, so every shared test function
//! declares a [`Signature`]. Binding merged positional and keyword values against
//! it reproduces ordinary call-binding rules, and reports violations as
//! [`BindingError`]s before the function body runs.

use std::sync::Arc;

use crate::error::{BindingError, Failure, ParamKind};
use crate::value::{Callable, Keywords, Value};

#[derive(Debug, Clone)]
struct Param {
    name: Arc<str>,
    default: Option<Value>,
}

/// Declared parameters of a shared test function.
///
/// # Example
///
/// ```
/// use fixture_matrix::Signature;
///
/// // (total, *terms, optional=0)
/// let sig = Signature::new()
///     .positional("total")
///     .variadic("terms")
///     .keyword_default("optional", 0);
/// assert_eq!(sig.positional_names().collect::<Vec<_>>(), vec!["total"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signature {
    positional: Vec<Param>,
    variadic: Option<Arc<str>>,
    keyword_only: Vec<Param>,
}

impl Signature {
    /// A signature with no parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required positional-or-keyword parameter.
    #[must_use]
    pub fn positional(mut self, name: impl Into<Arc<str>>) -> Self {
        self.positional.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Add a positional-or-keyword parameter with a default.
    #[must_use]
    pub fn positional_default(mut self, name: impl Into<Arc<str>>, default: impl Into<Value>) -> Self {
        self.positional.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Collect surplus positional values under `name`.
    #[must_use]
    pub fn variadic(mut self, name: impl Into<Arc<str>>) -> Self {
        self.variadic = Some(name.into());
        self
    }

    /// Add a required keyword-only parameter.
    #[must_use]
    pub fn keyword(mut self, name: impl Into<Arc<str>>) -> Self {
        self.keyword_only.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Add a keyword-only parameter with a default.
    #[must_use]
    pub fn keyword_default(mut self, name: impl Into<Arc<str>>, default: impl Into<Value>) -> Self {
        self.keyword_only.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Names of the positional-or-keyword parameters, in order.
    pub fn positional_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.positional.iter().map(|p| &*p.name)
    }

    /// Names of the keyword-only parameters, in order.
    pub fn keyword_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.keyword_only.iter().map(|p| &*p.name)
    }

    /// Bind values to parameters.
    pub fn bind(&self, function: &str, positional: Vec<Value>, keywords: &Keywords) -> Result<Args, BindingError> {
        let mut slots: Vec<Option<Value>> = vec![None; self.positional.len()];
        let mut rest = Vec::new();

        let given = positional.len();
        for (i, value) in positional.into_iter().enumerate() {
            if i < slots.len() {
                slots[i] = Some(value);
            } else if self.variadic.is_some() {
                rest.push(value);
            } else {
                return Err(BindingError::TooManyPositional {
                    function: function.to_string(),
                    expected: self.positional.len(),
                    given,
                });
            }
        }

        let mut keyword_slots: Vec<Option<Value>> = vec![None; self.keyword_only.len()];
        for (name, value) in keywords.iter() {
            if let Some(i) = self.positional.iter().position(|p| &*p.name == name) {
                if slots[i].is_some() {
                    return Err(BindingError::MultipleValues {
                        function: function.to_string(),
                        name: name.to_string(),
                    });
                }
                slots[i] = Some(value.clone());
            } else if let Some(i) = self.keyword_only.iter().position(|p| &*p.name == name) {
                keyword_slots[i] = Some(value.clone());
            } else {
                return Err(BindingError::UnexpectedKeyword {
                    function: function.to_string(),
                    name: name.to_string(),
                });
            }
        }

        let mut bound = Keywords::new();
        for (param, slot) in self.positional.iter().zip(slots) {
            let value = fill(function, param, slot, ParamKind::Positional)?;
            bound.insert(param.name.clone(), value);
        }
        for (param, slot) in self.keyword_only.iter().zip(keyword_slots) {
            let value = fill(function, param, slot, ParamKind::KeywordOnly)?;
            bound.insert(param.name.clone(), value);
        }

        Ok(Args {
            function: function.into(),
            bound,
            rest,
        })
    }
}

fn fill(function: &str, param: &Param, slot: Option<Value>, kind: ParamKind) -> Result<Value, BindingError> {
    slot.or_else(|| param.default.clone())
        .ok_or_else(|| BindingError::Missing {
            function: function.to_string(),
            name: param.name.to_string(),
            kind,
        })
}

/// Arguments bound to a shared test function's parameters.
///
/// Typed accessors return [`Failure::User`] on a missing name or a type mismatch,
/// so test bodies can use `?`.
#[derive(Debug, Clone)]
pub struct Args {
    function: Arc<str>,
    bound: Keywords,
    rest: Vec<Value>,
}

impl Args {
    /// Value bound to `name`.
    pub fn value(&self, name: &str) -> Result<&Value, Failure> {
        self.bound
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("{}() has no parameter '{}'", self.function, name).into())
    }

    fn typed<'a, T>(&'a self, name: &str, expected: &str, get: impl FnOnce(&'a Value) -> Option<T>) -> Result<T, Failure> {
        let value = self.value(name)?;
        get(value).ok_or_else(|| {
            anyhow::anyhow!(
                "argument '{}' of {}() is {}, expected {}",
                name,
                self.function,
                value.type_name(),
                expected
            )
            .into()
        })
    }

    /// Integer bound to `name`.
    pub fn int(&self, name: &str) -> Result<i64, Failure> {
        self.typed(name, "int", Value::as_int)
    }

    /// Number bound to `name`, as `f64`.
    pub fn float(&self, name: &str) -> Result<f64, Failure> {
        self.typed(name, "float", Value::as_float)
    }

    /// Boolean bound to `name`.
    pub fn bool(&self, name: &str) -> Result<bool, Failure> {
        self.typed(name, "bool", Value::as_bool)
    }

    /// String bound to `name`.
    pub fn str(&self, name: &str) -> Result<&str, Failure> {
        self.typed(name, "str", Value::as_str)
    }

    /// Tuple bound to `name`.
    pub fn tuple(&self, name: &str) -> Result<&[Value], Failure> {
        self.typed(name, "tuple", Value::as_tuple)
    }

    /// Function bound to `name`.
    pub fn callable(&self, name: &str) -> Result<&Callable, Failure> {
        self.typed(name, "function", Value::as_callable)
    }

    /// Call the function bound to `name`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Failure> {
        self.callable(name)?.call(args)
    }

    /// Surplus positional values collected by the variadic parameter.
    pub fn rest(&self) -> &[Value] {
        &self.rest
    }

    /// Every named parameter with its bound value, in declaration order.
    pub fn named(&self) -> &Keywords {
        &self.bound
    }
}
