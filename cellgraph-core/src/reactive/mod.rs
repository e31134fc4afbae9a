//! Reactive Primitives
//!
//! This module implements the notebook's dataflow runtime: value boxes,
//! observers, cells, modules and the runtime that schedules them.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a named (or anonymous) computation. It declares the names it
//! depends on; its body receives their current values positionally and
//! returns a value, a future, or a sequence of values over time.
//!
//! ## Modules
//!
//! A Module is a namespace of cells. Names it does not define are looked up
//! in its builtins module, one hop only.
//!
//! ## Runtime
//!
//! The Runtime owns the modules of one notebook session. After every
//! definition or removal it recomputes the affected cells in dependency order,
//! each exactly once.
//!
//! ## Observers
//!
//! Observers receive a cell's `pending`, `fulfilled` and `rejected`
//! transitions. They are the only link between the runtime and a UI.
//!
//! # Implementation Notes
//!
//! Every computation attempt is stamped with a generation. Results that
//! arrive for an older generation are dropped, which is how superseded futures
//! are ignored and superseded generators stop being pulled.

mod cell;
mod module;
mod observer;
mod output;
mod policy;
mod runtime;
mod value;

pub use cell::Cell;
pub use module::Module;
pub use observer::{CellEvent, FnObserver, Observer, ObserverId};
pub use output::{Args, Body, CellOutput, Generator};
pub use policy::Policy;
pub use runtime::Runtime;
pub use value::{Generation, GenerationClock, Status, Value, ValueBox};
