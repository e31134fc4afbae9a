//! Parser and compiler boundaries.
//!
//! The runtime never reads source text. A host language plugs in a
//! [`Parser`] that extracts the declared name and referenced identifiers of a
//! code entry, and a [`Compiler`] that turns the parsed entry into a [`Body`].

use thiserror::Error;

use crate::error::CellError;
use crate::reactive::Body;

/// The parts of a code entry the runtime cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCell {
    /// Name the entry defines, if any.
    pub declared_name: Option<String>,

    /// Free identifiers, without duplicates, in first-use order. This is the
    /// argument order of the compiled body.
    pub referenced_names: Vec<String>,

    /// The expression or block to evaluate.
    pub body_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl From<ParseError> for CellError {
    fn from(error: ParseError) -> Self {
        CellError::thrown(error.to_string())
    }
}

pub trait Parser: Send + Sync {
    fn parse(&self, source: &str) -> Result<ParsedCell, ParseError>;
}

pub trait Compiler: Send + Sync {
    /// Build the body. Its arguments arrive in `referenced_names` order.
    fn compile(&self, cell: &ParsedCell) -> Result<Body, CellError>;
}
