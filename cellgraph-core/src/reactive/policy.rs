//! Calculation policies.
//!
//! A policy decides when a cell's body first runs. Once a cell has started
//! computing it keeps reacting to upstream changes regardless of policy.

use serde::{Deserialize, Serialize};

/// When a cell's body is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Runs on definition and on every upstream change.
    #[default]
    Eager,

    /// Deferred until an observer attaches or a computing cell depends on it.
    Lazy,

    /// Runs only when a computing cell depends on it. Observers alone never
    /// wake it.
    Dormant,
}

impl Policy {
    /// Whether a freshly created cell with this policy starts active.
    pub fn starts_active(self) -> bool {
        matches!(self, Policy::Eager)
    }

    /// Whether attaching an observer activates the cell.
    pub fn wakes_on_observe(self) -> bool {
        matches!(self, Policy::Eager | Policy::Lazy)
    }
}
