//! Cellgraph Core
//!
//! This crate provides the reactive dataflow runtime behind the Cellgraph
//! notebook. It implements:
//!
//! - Cells: named computations over the values of other cells
//! - Modules with a one-hop builtins fallback
//! - Dependency-ordered, deduplicated recomputation
//! - Generation stamping, which drops stale asynchronous and streaming results
//! - A notebook binding from ordered document entries to cells
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Cell storage, name resolution and update scheduling
//! - `reactive`: Runtime, modules, cells, observers and value boxes
//! - `notebook`: Document model and the parser/compiler/renderer boundaries
//!
//! # Example
//!
//! ```rust
//! use cellgraph_core::reactive::{CellOutput, Policy, Runtime};
//! use serde_json::json;
//!
//! let runtime = Runtime::new();
//! let module = runtime.new_module();
//!
//! let a = module.cell("a", Policy::Eager);
//! a.define_constant(json!(2)).unwrap();
//!
//! let b = module.cell("b", Policy::Eager);
//! b.define(["a"], |args| Ok(CellOutput::value(args.i64(0)? + 1))).unwrap();
//! assert_eq!(b.value(), Some(json!(3)));
//!
//! // Redefining `a` recomputes `b`.
//! a.define_constant(json!(5)).unwrap();
//! assert_eq!(b.value(), Some(json!(6)));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod notebook;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{CellError, DefineError};
pub use reactive::{Cell, CellOutput, Module, Observer, Policy, Runtime, Status, Value};
