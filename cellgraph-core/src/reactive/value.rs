//! Value Box
//!
//! A value box holds a cell's last committed outcome together with the
//! generation that produced it.
//!
//! # Staleness
//!
//! Every computation attempt is stamped with a fresh generation from the
//! runtime's [`GenerationClock`]. A transition is applied only when its stamp
//! equals the box's current generation. Results of superseded attempts are
//! dropped without notice; this is the only cancellation mechanism for
//! futures, and the point at which generators stop being pulled.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CellError;

/// Dynamic value flowing between cells.
pub type Value = serde_json::Value;

/// Stamp of one computation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Get the raw stamp.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Monotonic source of generations, one per runtime.
#[derive(Debug, Default)]
pub struct GenerationClock {
    counter: AtomicU64,
}

impl GenerationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock and return the new generation.
    pub fn tick(&self) -> Generation {
        Generation(self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently issued generation.
    pub fn current(&self) -> Generation {
        Generation(self.counter.load(Ordering::Relaxed))
    }
}

/// Observable state of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Pending,
    Fulfilled(Value),
    Rejected(CellError),
}

impl Status {
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }

    /// The fulfilled value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Status::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection, if any.
    pub fn error(&self) -> Option<&CellError> {
        match self {
            Status::Rejected(error) => Some(error),
            _ => None,
        }
    }

    /// The settled outcome, or `None` while pending.
    pub fn settled(&self) -> Option<Result<Value, CellError>> {
        match self {
            Status::Pending => None,
            Status::Fulfilled(value) => Some(Ok(value.clone())),
            Status::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

impl From<Result<Value, CellError>> for Status {
    fn from(outcome: Result<Value, CellError>) -> Self {
        match outcome {
            Ok(value) => Status::Fulfilled(value),
            Err(error) => Status::Rejected(error),
        }
    }
}

/// A status stamped with the generation it belongs to.
#[derive(Debug, Clone)]
pub struct ValueBox {
    status: Status,
    generation: Generation,
}

impl ValueBox {
    /// An empty box: pending, generation zero.
    pub fn new() -> Self {
        Self {
            status: Status::Pending,
            generation: Generation::default(),
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Start a new attempt. Always applies and supersedes every older stamp.
    pub fn set_pending(&mut self, generation: Generation) {
        self.generation = generation;
        self.status = Status::Pending;
    }

    /// Commit a value. Returns `false` and changes nothing when stale.
    pub fn set_fulfilled(&mut self, generation: Generation, value: Value) -> bool {
        self.settle(generation, Ok(value))
    }

    /// Commit a rejection. Returns `false` and changes nothing when stale.
    pub fn set_rejected(&mut self, generation: Generation, error: CellError) -> bool {
        self.settle(generation, Err(error))
    }

    pub fn settle(&mut self, generation: Generation, outcome: Result<Value, CellError>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = outcome.into();
        true
    }
}

impl Default for ValueBox {
    fn default() -> Self {
        Self::new()
    }
}
