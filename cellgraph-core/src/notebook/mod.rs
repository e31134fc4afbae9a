//! Notebook Binding
//!
//! Connects a [`Document`] to one runtime [`Module`]: every entry owns one
//! cell, keyed by entry id. The binding is the only place that knows about
//! document order; the runtime only sees cells.
//!
//! Markup entries (Markdown, HTML, TeX) become constants holding their text.
//! Code entries are parsed, compiled and redefined under their declared
//! name. A parse error or a refused definition (duplicate name, cycle) is
//! surfaced as the entry's rejection instead. Refused entries are retried on
//! every sync, so they recover once the conflicting entry changes or goes.

mod document;
mod parse;
mod render;

pub use document::{Document, DocumentError, Entry, EntryId, EntryKind};
pub use parse::{Compiler, ParseError, ParsedCell, Parser};
pub use render::{RenderState, Rendered, Renderer, TextRenderer};

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::CellError;
use crate::graph::Dependencies;
use crate::reactive::{Body, Cell, Module, Policy, Runtime, Value};

/// A document bound to a module of a runtime.
pub struct Notebook<P, C, R = TextRenderer> {
    module: Module,
    parser: P,
    compiler: C,
    renderer: R,
    document: Document,
    cells: HashMap<EntryId, Cell>,

    /// Entries whose last definition was refused.
    refused: HashSet<EntryId>,
}

impl<P, C> Notebook<P, C, TextRenderer>
where
    P: Parser,
    C: Compiler,
{
    pub fn new(runtime: &Runtime, parser: P, compiler: C) -> Self {
        Self::with_renderer(runtime, parser, compiler, TextRenderer)
    }
}

impl<P, C, R> Notebook<P, C, R>
where
    P: Parser,
    C: Compiler,
    R: Renderer,
{
    /// Bind an empty document to a fresh module of `runtime`.
    pub fn with_renderer(runtime: &Runtime, parser: P, compiler: C, renderer: R) -> Self {
        Self {
            module: runtime.new_module(),
            parser,
            compiler,
            renderer,
            document: Document::new(),
            cells: HashMap::new(),
            refused: HashSet::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The cell backing an entry.
    pub fn cell(&self, id: EntryId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    /// Bring the module in line with `document`.
    ///
    /// Entries that disappeared lose their cell; new, edited or previously
    /// refused entries are (re)defined in document order; everything else is
    /// left alone.
    pub fn sync(&mut self, document: Document) {
        let stale: Vec<EntryId> = self
            .cells
            .keys()
            .filter(|id| document.get(**id).is_none())
            .copied()
            .collect();
        for id in stale {
            self.refused.remove(&id);
            if let Some(cell) = self.cells.remove(&id) {
                debug!(entry = id.0, "entry deleted");
                cell.remove();
            }
        }

        for entry in document.entries() {
            let unchanged = self.cells.contains_key(&entry.id)
                && !self.refused.contains(&entry.id)
                && self
                    .document
                    .get(entry.id)
                    .is_some_and(|old| old.kind == entry.kind && old.text == entry.text);
            if !unchanged {
                self.install(entry);
            }
        }

        // A later entry may have released the name an earlier one wanted.
        loop {
            let before = self.refused.len();
            let retry: Vec<&Entry> = document
                .entries()
                .iter()
                .filter(|entry| self.refused.contains(&entry.id))
                .collect();
            for entry in retry {
                self.install(entry);
            }
            if before == 0 || self.refused.len() == before {
                break;
            }
        }
        self.document = document;
    }

    fn install(&mut self, entry: &Entry) {
        let module = &self.module;
        let cell = self
            .cells
            .entry(entry.id)
            .or_insert_with(|| module.anonymous_cell(Policy::Eager))
            .clone();

        let (name, dependencies, body) = if entry.kind.is_markup() {
            (
                None,
                Dependencies::new(),
                Body::constant(Value::String(entry.text.clone())),
            )
        } else {
            match self.compile(&entry.text) {
                Ok((parsed, body)) => (
                    parsed.declared_name,
                    parsed.referenced_names.into_iter().collect(),
                    body,
                ),
                Err(error) => (None, Dependencies::new(), Body::failing(error)),
            }
        };

        debug!(entry = entry.id.0, name = ?name, "defining entry");
        match cell.redefine_body(name.as_deref(), dependencies, body) {
            Ok(()) => {
                self.refused.remove(&entry.id);
            }
            Err(error) => {
                debug!(entry = entry.id.0, %error, "definition refused");
                self.refused.insert(entry.id);
                let failing = Body::failing(error.into());
                if let Err(error) = cell.redefine_body(None, Dependencies::new(), failing) {
                    warn!(entry = entry.id.0, %error, "could not record refused definition");
                }
            }
        }
    }

    fn compile(&self, source: &str) -> Result<(ParsedCell, Body), CellError> {
        let parsed = self.parser.parse(source)?;
        let body = self.compiler.compile(&parsed)?;
        Ok((parsed, body))
    }

    /// Render an entry's current result.
    pub fn render(&self, id: EntryId) -> Option<Rendered> {
        let status = self.cells.get(&id)?.status()?;
        Some(self.renderer.render(&status))
    }
}
