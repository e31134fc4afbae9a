//! Observer types for the reactive system.
//!
//! An Observer is an external subscriber to one cell's status transitions.
//! It is the only surface through which a UI learns about cell values; the
//! runtime never refers to any UI type.

use std::sync::atomic::{AtomicU64, Ordering};

use super::cell::Cell;
use super::value::{Status, Value};
use crate::error::CellError;

/// Handle returned by [`Cell::include_observer`], used to detach again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver of a cell's status transitions.
///
/// Callbacks run with no runtime lock held, so they may call back into the
/// runtime (including redefining cells).
pub trait Observer: Send + Sync {
    /// The cell started a new computation attempt.
    fn pending(&self) {}

    /// The cell committed a value.
    fn fulfilled(&self, cell: &Cell, value: &Value) {
        let _ = (cell, value);
    }

    /// The cell committed a rejection.
    fn rejected(&self, cell: &Cell, error: &CellError) {
        let _ = (cell, error);
    }
}

/// One status transition, as seen by a [`FnObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellEvent {
    Pending,
    Fulfilled(Value),
    Rejected(CellError),
}

impl From<&Status> for CellEvent {
    fn from(status: &Status) -> Self {
        match status {
            Status::Pending => CellEvent::Pending,
            Status::Fulfilled(value) => CellEvent::Fulfilled(value.clone()),
            Status::Rejected(error) => CellEvent::Rejected(error.clone()),
        }
    }
}

/// Observer backed by a single closure receiving [`CellEvent`]s.
pub struct FnObserver<F> {
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(CellEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Observer for FnObserver<F>
where
    F: Fn(CellEvent) + Send + Sync,
{
    fn pending(&self) {
        (self.callback)(CellEvent::Pending);
    }

    fn fulfilled(&self, _cell: &Cell, value: &Value) {
        (self.callback)(CellEvent::Fulfilled(value.clone()));
    }

    fn rejected(&self, _cell: &Cell, error: &CellError) {
        (self.callback)(CellEvent::Rejected(error.clone()));
    }
}
