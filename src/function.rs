//! The shared test function and assertion helpers.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::Failure;
use crate::signature::{Args, Signature};
use crate::value::{Keywords, Value};

type Body = dyn Fn(&Args) -> Result<(), Failure> + Send + Sync;

/// The one procedure invoked, with each fixture's values, to perform the check.
///
/// Clone is cheap as the body is wrapped by `Arc`.
///
/// # Example
///
/// ```
/// use fixture_matrix::{check_eq, Signature, TestFn};
///
/// let sum = TestFn::new(
///     "sum_test",
///     Signature::new().positional("total").variadic("terms"),
///     |args| {
///         let terms: i64 = args.rest().iter().filter_map(|v| v.as_int()).sum();
///         check_eq(args.int("total")?, terms)
///     },
/// );
/// assert_eq!(sum.name(), "sum_test");
/// ```
#[derive(Clone)]
pub struct TestFn {
    name: Arc<str>,
    signature: Signature,
    body: Arc<Body>,
}

impl TestFn {
    /// Create a shared test function.
    pub fn new<F>(name: impl Into<Arc<str>>, signature: Signature, body: F) -> Self
    where
        F: Fn(&Args) -> Result<(), Failure> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    /// Function name, used in binding error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Bind `positional` and `keywords`, then run the body.
    ///
    /// Binding problems surface as [`Failure::Binding`] without entering the body.
    /// A panic inside the body (e.g. from `assert_eq!`) becomes
    /// [`Failure::Assertion`] carrying the panic message.
    pub fn invoke(&self, positional: Vec<Value>, keywords: &Keywords) -> Result<(), Failure> {
        let args = self
            .signature
            .bind(&self.name, positional, keywords)
            .map_err(Failure::Binding)?;
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(&args))) {
            Ok(result) => result,
            Err(payload) => Err(Failure::assertion(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for TestFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFn")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fail with an assertion failure unless `expected == actual`.
pub fn check_eq<A, B>(expected: A, actual: B) -> Result<(), Failure>
where
    A: PartialEq<B> + fmt::Debug,
    B: fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(Failure::assertion(format!("{:?} != {:?}", expected, actual)))
    }
}

/// Fail with an assertion failure carrying `message` unless `condition` holds.
pub fn check(condition: bool, message: impl Into<String>) -> Result<(), Failure> {
    if condition {
        Ok(())
    } else {
        Err(Failure::assertion(message))
    }
}
