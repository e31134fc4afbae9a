//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between cells.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent cells, grouped into modules
//! - Edges represent dependencies: if B reads A, there is an edge from A to B
//!
//! Edges are not declared directly. Cells declare dependency *names*, and the
//! graph resolves each name in the cell's module, then in that module's
//! builtins. Whenever a name gains or loses its cell, the cells reading that
//! name are resolved again, so a cell that referred to a missing name picks
//! it up as soon as it is defined.
//!
//! # Design Decisions
//!
//! 1. One centralized graph per runtime rather than per-cell subscriber lists:
//!    - It gives a single place to order a batch of updates
//!    - Cycle detection sees every module at once
//!
//! 2. Cycles are refused at definition time, before any state changes.
//!
//! 3. We maintain both forward (inputs) and reverse (dependents) edges to
//!    traverse in both directions.

mod node;
mod scheduler;

pub use node::{CellId, CellNode, Dependencies, ModuleId, ModuleNode};
pub(crate) use scheduler::Step;
pub use scheduler::UpdateScheduler;
