//! In-memory editing surface.
//!
//! Used for headless sessions (the CLI `watch` command) and as the reference
//! implementation in tests. Text lives in a [`Rope`] with `\n` as the only
//! line break, so `\r` stays part of a line the same way it does for section
//! splicing. Rope indices are chars, which is also what `Position::ch` counts.

use super::{Edit, EditingSurface, Position, Selection, SurfaceChange, SurfaceId};
use ropey::Rope;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BufferSurface {
    id: SurfaceId,
    rope: Rope,
    anchor: Position,
    head: Position,
    changes: Vec<SurfaceChange>,
    file: Option<PathBuf>,
}

impl BufferSurface {
    pub fn new() -> Self {
        Self::with_id(SurfaceId::next())
    }

    pub fn with_id(id: SurfaceId) -> Self {
        Self {
            id,
            rope: Rope::new(),
            anchor: Position::default(),
            head: Position::default(),
            changes: Vec::new(),
            file: None,
        }
    }

    /// Surface the host has bound to `path`, as it would for a regular file view.
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        let mut surface = Self::new();
        surface.file = Some(path.into());
        surface
    }

    /// Simulate typing at the cursor.
    pub fn type_text(&mut self, text: &str) {
        self.replace_selection(text);
    }

    /// Simulate a backspace at the cursor (or deletion of the selection).
    pub fn backspace(&mut self) {
        if let Some(sel) = self.selection() {
            self.replace_range("", sel.from(), sel.to());
            return;
        }
        let head = self.char_of(self.head);
        if head == 0 {
            return;
        }
        let from = self.position_of(head - 1);
        let to = self.head;
        self.replace_range("", from, to);
    }

    fn last_line(&self) -> usize {
        self.rope.len_lines().saturating_sub(1)
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.last_line());
        Position::new(line, pos.ch.min(self.line_len(line)))
    }

    fn char_of(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        self.rope.line_to_char(pos.line) + pos.ch
    }

    fn position_of(&self, idx: usize) -> Position {
        let idx = idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(idx).min(self.last_line());
        Position::new(line, idx - self.rope.line_to_char(line))
    }

    /// Apply one char-range replacement, mapping cursor and anchor through it.
    fn apply(&mut self, from: usize, to: usize, text: &str) {
        let inserted = text.chars().count();
        let map = |idx: usize| -> usize {
            if idx < from || (idx == from && from < to) {
                idx
            } else if idx >= to {
                idx - (to - from) + inserted
            } else {
                from + inserted
            }
        };
        let anchor = map(self.char_of(self.anchor));
        let head = map(self.char_of(self.head));

        self.rope.remove(from..to);
        self.rope.insert(from, text);

        self.anchor = self.position_of(anchor);
        self.head = self.position_of(head);
    }

    /// Record every line covered by `text` once inserted at char `from`.
    fn record(&mut self, from: usize, text: &str) {
        let first = self.rope.char_to_line(from).min(self.last_line());
        let last = first + text.matches('\n').count();
        self.changes
            .extend((first..=last).map(|line| SurfaceChange { line }));
    }

    fn char_range(&self, from: Position, to: Position) -> (usize, usize) {
        let a = self.char_of(from);
        let b = self.char_of(to);
        (a.min(b), a.max(b))
    }
}

impl Default for BufferSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl EditingSurface for BufferSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.anchor = self.clamp(self.anchor);
        self.head = self.clamp(self.head);
        self.changes.push(SurfaceChange { line: 0 });
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line(&self, index: usize) -> Option<String> {
        if index >= self.rope.len_lines() {
            return None;
        }
        let mut line = self.rope.line(index).to_string();
        if line.ends_with('\n') {
            line.pop();
        }
        Some(line)
    }

    fn line_len(&self, index: usize) -> usize {
        if index >= self.rope.len_lines() {
            return 0;
        }
        let line = self.rope.line(index);
        let len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    fn cursor(&self) -> Position {
        self.head
    }

    fn set_cursor(&mut self, pos: Position) {
        let pos = self.clamp(pos);
        self.anchor = pos;
        self.head = pos;
    }

    fn selection(&self) -> Option<Selection> {
        let sel = Selection::new(self.anchor, self.head);
        (!sel.is_empty()).then_some(sel)
    }

    fn set_selection(&mut self, anchor: Position, head: Position) {
        self.anchor = self.clamp(anchor);
        self.head = self.clamp(head);
    }

    fn selected_text(&self) -> String {
        let (from, to) = self.char_range(self.anchor, self.head);
        self.rope.slice(from..to).to_string()
    }

    fn replace_selection(&mut self, text: &str) {
        let (from, to) = self.char_range(self.anchor, self.head);
        self.apply(from, to, text);
        let end = self.position_of(from + text.chars().count());
        self.anchor = end;
        self.head = end;
        self.record(from, text);
    }

    fn replace_range(&mut self, text: &str, from: Position, to: Position) {
        let (start, end) = self.char_range(from, to);
        self.apply(start, end, text);
        self.record(start, text);
    }

    fn transaction(&mut self, edits: &[Edit], cursor: Option<Position>) {
        let mut ranges: Vec<(usize, usize, &str)> = edits
            .iter()
            .map(|edit| {
                let (from, to) = self.char_range(edit.from, edit.to);
                (from, to, edit.text.as_str())
            })
            .collect();
        ranges.sort_by(|a, b| b.0.cmp(&a.0));

        let mut lines: Vec<usize> = Vec::with_capacity(ranges.len());
        for (from, to, text) in ranges {
            let first = self.position_of(from).line;
            lines.extend(first..=first + text.matches('\n').count());
            self.apply(from, to, text);
        }

        if let Some(pos) = cursor {
            self.set_cursor(pos);
        }

        lines.sort_unstable();
        lines.dedup();
        self.changes
            .extend(lines.into_iter().map(|line| SurfaceChange { line }));
    }

    fn take_changes(&mut self) -> Vec<SurfaceChange> {
        std::mem::take(&mut self.changes)
    }

    fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn detach_file(&mut self) {
        self.file = None;
    }
}
