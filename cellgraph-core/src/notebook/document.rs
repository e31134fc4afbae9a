//! Notebook Document
//!
//! An ordered list of entries. Every edit returns a new [`Document`]; the
//! original is left untouched so a host can keep history or diff versions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a notebook entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry {}", self.0)
    }
}

/// What an entry's text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Source code evaluated by the runtime.
    Code,
    Markdown,
    Html,
    Tex,
}

impl EntryKind {
    /// Markup is shown as written rather than evaluated.
    pub fn is_markup(self) -> bool {
        !matches!(self, EntryKind::Code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub text: String,
    /// Pinned entries keep their source visible.
    pub pinned: bool,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("no such entry: {0}")]
    UnknownEntry(EntryId),

    #[error("failed to encode document: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode document: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Ordered notebook entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from existing entries; new ids continue after the
    /// largest one present.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let next_id = entries.iter().map(|e| e.id.0 + 1).max().unwrap_or(0);
        Self { entries, next_id }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: EntryId) -> Result<usize, DocumentError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(DocumentError::UnknownEntry(id))
    }

    fn with_inserted(&self, index: usize, kind: EntryKind, text: String) -> (Document, EntryId) {
        let id = EntryId(self.next_id);
        let mut next = self.clone();
        next.next_id += 1;
        next.entries.insert(
            index,
            Entry {
                id,
                kind,
                text,
                pinned: false,
            },
        );
        (next, id)
    }

    /// Add an entry at the end.
    pub fn append(&self, kind: EntryKind, text: impl Into<String>) -> (Document, EntryId) {
        self.with_inserted(self.entries.len(), kind, text.into())
    }

    pub fn insert_before(
        &self,
        anchor: EntryId,
        kind: EntryKind,
        text: impl Into<String>,
    ) -> Result<(Document, EntryId), DocumentError> {
        let index = self.position(anchor)?;
        Ok(self.with_inserted(index, kind, text.into()))
    }

    pub fn insert_after(
        &self,
        anchor: EntryId,
        kind: EntryKind,
        text: impl Into<String>,
    ) -> Result<(Document, EntryId), DocumentError> {
        let index = self.position(anchor)?;
        Ok(self.with_inserted(index + 1, kind, text.into()))
    }

    /// Swap with the previous entry. The first entry stays put.
    pub fn move_up(&self, id: EntryId) -> Result<Document, DocumentError> {
        let index = self.position(id)?;
        let mut next = self.clone();
        if index > 0 {
            next.entries.swap(index - 1, index);
        }
        Ok(next)
    }

    /// Swap with the following entry. The last entry stays put.
    pub fn move_down(&self, id: EntryId) -> Result<Document, DocumentError> {
        let index = self.position(id)?;
        let mut next = self.clone();
        if index + 1 < next.entries.len() {
            next.entries.swap(index, index + 1);
        }
        Ok(next)
    }

    pub fn delete(&self, id: EntryId) -> Result<Document, DocumentError> {
        let index = self.position(id)?;
        let mut next = self.clone();
        next.entries.remove(index);
        Ok(next)
    }

    pub fn toggle_pin(&self, id: EntryId) -> Result<Document, DocumentError> {
        let index = self.position(id)?;
        let mut next = self.clone();
        next.entries[index].pinned = !next.entries[index].pinned;
        Ok(next)
    }

    pub fn set_text(&self, id: EntryId, text: impl Into<String>) -> Result<Document, DocumentError> {
        let index = self.position(id)?;
        let mut next = self.clone();
        next.entries[index].text = text.into();
        Ok(next)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
