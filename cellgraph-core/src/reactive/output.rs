//! Cell bodies, their arguments and their results.
//!
//! A body receives the resolved values of its dependencies positionally, in
//! declaration order, and returns one of three result kinds:
//!
//! - an immediate value, committed at once;
//! - a deferred value (a future), committed when it settles;
//! - a sequence of values over time (a generator or a stream), each committed
//!   as it arrives.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};

use super::value::Value;
use crate::error::CellError;

/// Synchronous sequence of outcomes produced by a generator body.
pub type Generator = Box<dyn Iterator<Item = Result<Value, CellError>> + Send>;

/// What a body returned.
pub enum CellOutput {
    Immediate(Value),
    Deferred(BoxFuture<'static, Result<Value, CellError>>),
    /// Pulled synchronously for the first value, then in the background.
    Generator(Generator),
    Stream(BoxStream<'static, Result<Value, CellError>>),
}

impl CellOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        CellOutput::Immediate(value.into())
    }

    /// Wrap a future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<Value, CellError>> + Send + 'static,
    {
        CellOutput::Deferred(future.boxed())
    }

    /// Wrap a fallible iterator.
    pub fn generator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<Value, CellError>>,
        I::IntoIter: Send + 'static,
    {
        CellOutput::Generator(Box::new(iter.into_iter()))
    }

    /// Wrap an infallible iterator of plain values.
    pub fn values<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::generator(iter.into_iter().map(Ok))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Value, CellError>> + Send + 'static,
    {
        CellOutput::Stream(stream.boxed())
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CellOutput::Immediate(_) => "immediate",
            CellOutput::Deferred(_) => "deferred",
            CellOutput::Generator(_) => "generator",
            CellOutput::Stream(_) => "stream",
        }
    }
}

impl From<Value> for CellOutput {
    fn from(value: Value) -> Self {
        CellOutput::Immediate(value)
    }
}

impl fmt::Debug for CellOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellOutput::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            other => f.debug_tuple(other.kind()).finish(),
        }
    }
}

/// Resolved dependency outcomes, in declaration order.
///
/// A rejected dependency is passed through as its error. [`Args::get`] turns
/// it into an early return with `?`; [`Args::raw`] lets a body special-case
/// it instead.
#[derive(Debug, Clone, Default)]
pub struct Args {
    inputs: Vec<Result<Value, CellError>>,
}

impl Args {
    pub fn new(inputs: Vec<Result<Value, CellError>>) -> Self {
        Self { inputs }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// The value at `index`, or the dependency's rejection.
    pub fn get(&self, index: usize) -> Result<&Value, CellError> {
        match self.inputs.get(index) {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(error.clone()),
            None => Err(CellError::thrown(format!(
                "argument {index} out of range ({} dependencies)",
                self.inputs.len()
            ))),
        }
    }

    /// The outcome at `index`, untouched.
    pub fn raw(&self, index: usize) -> Option<&Result<Value, CellError>> {
        self.inputs.get(index)
    }

    /// The value at `index` as an integer.
    pub fn i64(&self, index: usize) -> Result<i64, CellError> {
        let value = self.get(index)?;
        value
            .as_i64()
            .ok_or_else(|| CellError::thrown(format!("expected an integer, got {value}")))
    }

    /// The value at `index` as a float.
    pub fn f64(&self, index: usize) -> Result<f64, CellError> {
        let value = self.get(index)?;
        value
            .as_f64()
            .ok_or_else(|| CellError::thrown(format!("expected a number, got {value}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Result<Value, CellError>> {
        self.inputs.iter()
    }
}

type BodyFn = dyn Fn(&Args) -> Result<CellOutput, CellError> + Send + Sync;

/// A cell's computation. Cheap to clone.
#[derive(Clone)]
pub struct Body(Arc<BodyFn>);

impl Body {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Result<CellOutput, CellError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A body that always produces `value`.
    pub fn constant(value: Value) -> Self {
        Self::new(move |_| Ok(CellOutput::Immediate(value.clone())))
    }

    /// A body that always fails with `error`.
    pub fn failing(error: CellError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn call(&self, args: &Args) -> Result<CellOutput, CellError> {
        (self.0)(args)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body")
    }
}
