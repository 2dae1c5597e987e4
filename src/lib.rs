#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod function;
mod group;
mod matrix;
mod registry;
mod relocate;
mod runner;
mod signature;
mod synth;
pub mod tracer;
mod value;

pub use config::{Config, FILTER_ENV, NO_SOURCE_ENV};
pub use error::{BindingError, ConflictKind, DefinitionError, Failure, FailureKind, NotFoundError, ParamKind};
pub use function::{check, check_eq, TestFn};
pub use group::{Group, GroupBuilder};
pub use matrix::{resolve, Combination, OptionsMatrix};
pub use registry::{Entry, Fixture, FixtureRegistry, PlainTest};
pub use relocate::{Relocated, Relocator, SourceLocation};
pub use runner::{CaseOutcome, Reporter, RunReport, Runner};
pub use signature::{Args, Signature};
pub use synth::{synthesize, SubcaseSink, TestUnit, UnitBody};
#[cfg(feature = "tracing")]
pub use tracer::LogTracer;
pub use tracer::{CaseStatus, EventCollector, NoopTracer, SuiteEvent, Tracer};
pub use value::{
    evaluated, flatten_positional, split_into_args_kwargs, tup, Callable, CallableFn, Evaluated, FixtureItem,
    Keywords, Options, Value,
};
