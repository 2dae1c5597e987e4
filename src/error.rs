//! Error types for group definition and fixture execution.
//!
//! Two families exist:
//!
//! - [`DefinitionError`] is raised synchronously while a group is being built
//!   (duplicate fixtures, colliding generated names, missing shared slot).
//! - [`Failure`] is produced while a synthesized test unit runs. It always leaves
//!   the crate wrapped in a [`Relocated`](crate::Relocated), never converted into
//!   another kind.

use std::fmt;
use std::sync::Arc;

/// Why a name could not be registered in a fixture registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// The exact name is already registered and is not reassignable.
    Duplicate,
    /// A plain test `test_x` was added while fixture `x` exists.
    PlainTestShadowsFixture,
    /// Fixture `x` was added while plain test `test_x` exists.
    FixtureShadowsPlainTest,
    /// The shared test-function slot was assigned twice.
    SharedSlotReassigned,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Duplicate => write!(f, "fixture already present"),
            ConflictKind::PlainTestShadowsFixture => write!(f, "plain test conflicts with fixture"),
            ConflictKind::FixtureShadowsPlainTest => write!(f, "fixture conflicts with plain test"),
            ConflictKind::SharedSlotReassigned => write!(f, "shared test function already set"),
        }
    }
}

/// Errors raised while defining a group. These are fatal to group construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// Duplicate or colliding fixture name.
    #[error("{kind}: {name}")]
    Conflict {
        /// The name that was being inserted.
        name: String,
        /// What it collided with.
        kind: ConflictKind,
    },

    /// The group never declared its shared test-function slot, not even as absent.
    #[error("shared test function missing from group `{group}`")]
    MissingSharedFunction {
        /// Name of the group under construction.
        group: String,
    },
}

impl DefinitionError {
    /// Returns `true` for [`DefinitionError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, DefinitionError::Conflict { .. })
    }
}

/// A fixture or test unit was looked up by a name that is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no entry named `{name}`")]
pub struct NotFoundError {
    /// The name that was looked up.
    pub name: String,
}

/// Which kind of parameter a binding error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positional-or-keyword parameter.
    Positional,
    /// Keyword-only parameter.
    KeywordOnly,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Positional => write!(f, "positional"),
            ParamKind::KeywordOnly => write!(f, "keyword-only"),
        }
    }
}

/// The fixture's values do not satisfy the shared function's parameter contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// More positional values than parameters, and no variadic tail.
    #[error("{function}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        /// Shared function name.
        function: String,
        /// Number of positional parameters.
        expected: usize,
        /// Number of positional values supplied.
        given: usize,
    },

    /// One parameter was bound both positionally and by keyword.
    #[error("{function}() got multiple values for argument '{name}'")]
    MultipleValues {
        /// Shared function name.
        function: String,
        /// Parameter name.
        name: String,
    },

    /// A keyword that matches no parameter.
    #[error("{function}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword {
        /// Shared function name.
        function: String,
        /// Offending keyword.
        name: String,
    },

    /// A required parameter was left unbound.
    #[error("{function}() missing required {kind} argument: '{name}'")]
    Missing {
        /// Shared function name.
        function: String,
        /// Parameter name.
        name: String,
        /// Whether the parameter is positional or keyword-only.
        kind: ParamKind,
    },
}

/// Classification of a [`Failure`], used by reporters to split failures from errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FailureKind {
    /// A matrix dimension had no candidate values.
    EmptyMatrix,
    /// Argument binding failed before the shared function ran.
    ArgumentBinding,
    /// The shared function reported a mismatch.
    Assertion,
    /// Any other error raised by user code.
    User,
}

/// A run-time failure of a synthesized test unit.
///
/// User errors can be propagated from a test body using the `?` operator, which
/// converts any `Into<anyhow::Error>` type into `Failure::User`.
#[derive(Debug, Clone)]
pub enum Failure {
    /// Some options have no values. Raised before the shared function is invoked.
    EmptyMatrix {
        /// Names of the empty dimensions, in matrix order.
        options: Vec<String>,
    },

    /// The merged positional/keyword values could not be bound.
    Binding(BindingError),

    /// The shared function's own reported mismatch.
    Assertion {
        /// Human readable description of the mismatch.
        message: String,
    },

    /// Arbitrary error raised by the shared function or a callable under test.
    User(Arc<anyhow::Error>),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::EmptyMatrix { options } => {
                write!(f, "some options have no values: {}", options.join(", "))
            }
            Failure::Binding(e) => write!(f, "argument binding error: {}", e),
            Failure::Assertion { message } => write!(f, "assertion failed: {}", message),
            Failure::User(e) => write!(f, "error: {}", e),
        }
    }
}

impl<T: Into<anyhow::Error>> From<T> for Failure {
    fn from(err: T) -> Self {
        Failure::User(Arc::new(err.into()))
    }
}

impl Failure {
    /// Build an assertion failure from a message.
    pub fn assertion(message: impl Into<String>) -> Self {
        Failure::Assertion {
            message: message.into(),
        }
    }

    /// The kind of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::EmptyMatrix { .. } => FailureKind::EmptyMatrix,
            Failure::Binding(_) => FailureKind::ArgumentBinding,
            Failure::Assertion { .. } => FailureKind::Assertion,
            Failure::User(_) => FailureKind::User,
        }
    }

    /// Returns `true` if this is an assertion failure.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Failure::Assertion { .. })
    }

    /// Returns the binding error, if this is one.
    pub fn binding_error(&self) -> Option<&BindingError> {
        match self {
            Failure::Binding(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to downcast a user error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        match self {
            Failure::User(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_mark_wraps_user_error() {
        fn parse(s: &str) -> Result<i64, Failure> {
            Ok(s.parse::<i64>()?)
        }
        let err = parse("nope").unwrap_err();
        assert_eq!(err.kind(), FailureKind::User);
        assert!(err.downcast_ref::<std::num::ParseIntError>().is_some());
    }

    #[test]
    fn test_empty_matrix_message_names_condition() {
        let err = Failure::EmptyMatrix {
            options: vec!["arg".to_string()],
        };
        assert!(err.to_string().contains("no values"));
        assert!(err.to_string().contains("arg"));
    }

    #[test]
    fn test_binding_error_messages() {
        let err = BindingError::Missing {
            function: "check".into(),
            name: "expected".into(),
            kind: ParamKind::KeywordOnly,
        };
        assert_eq!(
            err.to_string(),
            "check() missing required keyword-only argument: 'expected'"
        );
        let failure = Failure::Binding(err.clone());
        assert_eq!(failure.binding_error(), Some(&err));
        assert!(!failure.is_assertion());
    }

    #[test]
    fn test_conflict_display() {
        let err = DefinitionError::Conflict {
            name: "a".into(),
            kind: ConflictKind::Duplicate,
        };
        assert_eq!(err.to_string(), "fixture already present: a");
        assert!(err.is_conflict());
    }
}
