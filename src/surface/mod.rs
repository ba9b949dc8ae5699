//! Editing surface contract.
//!
//! An editing surface is the buffer a user types into. The sync session, the
//! heading guard and the editor commands only talk to it through
//! [`EditingSurface`], so any host editor can be plugged in.
//!
//! Positions are `(line, ch)` pairs where `ch` counts chars, not bytes.
//! Positions at or after the end of an edited range shift with the edit.

mod buffer;

pub use buffer::BufferSurface;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The kind of view a surface presents, used by active-view lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Markdown,
    Other(String),
}

/// A line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// A selection. `anchor` stays put while `head` follows the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    pub fn from(&self) -> Position {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> Position {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}

/// One replacement inside a [`EditingSurface::transaction`].
///
/// Positions refer to the buffer as it was before the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub from: Position,
    pub to: Position,
    pub text: String,
}

impl Edit {
    pub fn new(from: Position, to: Position, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::new(at, at, text)
    }
}

/// A change notification: some edit touched `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceChange {
    pub line: usize,
}

/// The buffer operations every host editor has to provide.
pub trait EditingSurface {
    fn id(&self) -> SurfaceId;

    fn kind(&self) -> ViewKind {
        ViewKind::Markdown
    }

    /// Whole buffer contents.
    fn text(&self) -> String;

    /// Replace the whole buffer. The cursor is clamped into the new text.
    fn set_text(&mut self, text: &str);

    fn line_count(&self) -> usize;

    fn line(&self, index: usize) -> Option<String>;

    fn cursor(&self) -> Position;

    /// Move the cursor, collapsing any selection.
    fn set_cursor(&mut self, pos: Position);

    /// Current selection, `None` when it is collapsed to the cursor.
    fn selection(&self) -> Option<Selection>;

    fn set_selection(&mut self, anchor: Position, head: Position);

    fn selected_text(&self) -> String;

    /// Replace the selection (or insert at the cursor) and place the cursor
    /// after the inserted text.
    fn replace_selection(&mut self, text: &str);

    fn replace_range(&mut self, text: &str, from: Position, to: Position);

    /// Apply several non-overlapping edits as one change, then optionally move
    /// the cursor (in post-transaction coordinates).
    fn transaction(&mut self, edits: &[Edit], cursor: Option<Position>);

    /// Drain pending change notifications.
    fn take_changes(&mut self) -> Vec<SurfaceChange>;

    /// The file the host considers this buffer to be, if any.
    fn file(&self) -> Option<&Path>;

    /// Stop the host from treating the buffer as a file of its own.
    fn detach_file(&mut self);

    /// Length of a line in chars, 0 for lines that do not exist.
    fn line_len(&self, index: usize) -> usize {
        self.line(index).map_or(0, |l| l.chars().count())
    }

    /// Position just past the last char of a line.
    fn line_end(&self, index: usize) -> Position {
        Position::new(index, self.line_len(index))
    }
}
