//! Error Types
//!
//! Errors fall into two families:
//!
//! - [`DefineError`] is structural. It is returned to the caller of
//!   `define`/`redefine` before anything is scheduled and never reaches an
//!   observer.
//! - [`CellError`] is computational. It is captured in a cell's value box as a
//!   rejection, delivered to observers and handed to dependents as input. It
//!   never aborts sibling cells.

use thiserror::Error;

/// A definition was refused. The graph is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefineError {
    /// The new dependency set would make the cell reachable from itself.
    #[error("cyclic definition of {cell}: {}", path.join(" -> "))]
    CyclicDependency {
        /// Display name of the cell being defined.
        cell: String,
        /// Names along the cycle, starting and ending at `cell`.
        path: Vec<String>,
    },

    /// Another live cell of the same module already owns the name.
    #[error("{name} is already defined")]
    DuplicateName { name: String },

    /// The cell was removed from its module.
    #[error("cell has been removed")]
    Removed,
}

/// A computation failed. Contained per cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// A dependency name resolved neither locally nor in the builtins.
    #[error("{name} is not defined")]
    MissingDependency { name: String },

    /// The body failed synchronously (including parse failures and panics).
    #[error("{message}")]
    BodyThrow { message: String },

    /// A future or generator produced by the body failed.
    #[error("{message}")]
    AsyncRejection { message: String },
}

impl CellError {
    /// A synchronous failure with the given message.
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::BodyThrow {
            message: message.into(),
        }
    }

    /// An asynchronous failure with the given message.
    pub fn rejection(message: impl Into<String>) -> Self {
        Self::AsyncRejection {
            message: message.into(),
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingDependency { name: name.into() }
    }

    /// Whether this is a `MissingDependency` naming `name`.
    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self, Self::MissingDependency { name: n } if n == name)
    }
}

impl From<DefineError> for CellError {
    fn from(error: DefineError) -> Self {
        Self::thrown(error.to_string())
    }
}
