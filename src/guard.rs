//! Heading guard for embedded section editors.
//!
//! The first line of a projected section is its own heading and stays
//! read-only. Headings typed in the body are pushed one level below the
//! section's depth so they cannot end the section early.
//!
//! Text that lands on line 0 through a deleted line break or a moved line is
//! kept: the heading is put back and the text stays in the body.
//!
//! The guard edits the surface directly. Callers are expected to run
//! [`HeadingGuard::react`] with change handling suppressed and to discard the
//! change notifications it produces.

use crate::section::heading_depth;
use crate::surface::{EditingSurface, Position};

/// What a single reaction did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Nothing to fix.
    None,
    /// Line 0 was edited and has been put back.
    HeadingRestored,
    /// Body text joined onto the heading line was moved back below it.
    BodySplitOff,
    /// The heading line was deleted or moved down and is back on line 0.
    HeadingReinserted,
    /// A body heading at or above the section depth was pushed down.
    Promoted { line: usize, from: usize, to: usize },
    /// A marker inserted by the previous correction was being backspaced and
    /// has been removed entirely.
    MarkerRemoved { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingGuard {
    original_heading: String,
    depth: usize,
    last_corrected: Option<usize>,
    line_count: usize,
}

impl HeadingGuard {
    /// Seed the guard from a projected section.
    pub fn new(section: &str) -> Self {
        let mut guard = Self {
            original_heading: String::new(),
            depth: 1,
            last_corrected: None,
            line_count: 1,
        };
        guard.reset(section);
        guard
    }

    /// Re-seed after the section has been reloaded.
    pub fn reset(&mut self, section: &str) {
        let heading = section.split('\n').next().unwrap_or_default();
        self.depth = heading_depth(heading)
            .unwrap_or_else(|| heading.chars().take_while(|c| *c == '#').count())
            .max(1);
        self.original_heading = heading.to_string();
        self.last_corrected = None;
        self.line_count = section.split('\n').count();
    }

    pub fn original_heading(&self) -> &str {
        &self.original_heading
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Level every heading typed in the body is normalized to.
    pub fn required_level(&self) -> usize {
        self.depth + 1
    }

    pub fn last_corrected(&self) -> Option<usize> {
        self.last_corrected
    }

    /// React to a change on `line`.
    ///
    /// Changes from one batch of edits should be fed in ascending line order:
    /// the guard compares the buffer's line count with the count it saw last
    /// to tell a joined or deleted line from an in-place edit of the heading.
    pub fn react(&mut self, surface: &mut dyn EditingSurface, line: usize) -> Correction {
        let correction = match surface.line(line) {
            None => {
                self.last_corrected = None;
                Correction::None
            }
            Some(text) if line == 0 => self.guard_heading(surface, &text),
            Some(text) => self.normalize(surface, line, &text),
        };
        self.line_count = surface.line_count();
        correction
    }

    fn guard_heading(&mut self, surface: &mut dyn EditingSurface, text: &str) -> Correction {
        self.last_corrected = None;
        if text == self.original_heading {
            return Correction::None;
        }

        let heading = self.original_heading.clone();
        let shrunk = surface.line_count() < self.line_count;

        if surface.line(1).as_deref() == Some(heading.as_str()) {
            // Swapped with the first body line.
            let end = surface.line_end(1);
            surface.replace_range(&format!("{heading}\n{text}"), Position::new(0, 0), end);
            tracing::trace!(heading = %heading, "moved section heading back to the top");
            return Correction::HeadingReinserted;
        }

        if shrunk && text.starts_with(&heading) {
            let at = Position::new(0, heading.chars().count());
            surface.replace_range("\n", at, at);
            self.normalize_moved(surface);
            tracing::trace!(heading = %heading, "split body text off the section heading");
            return Correction::BodySplitOff;
        }

        if shrunk {
            let top = Position::new(0, 0);
            surface.replace_range(&format!("{heading}\n"), top, top);
            self.normalize_moved(surface);
            tracing::trace!(heading = %heading, "reinserted deleted section heading");
            return Correction::HeadingReinserted;
        }

        let end = surface.line_end(0);
        surface.replace_range(&heading, Position::new(0, 0), end);
        tracing::trace!(heading = %heading, "restored section heading");
        Correction::HeadingRestored
    }

    /// Line 1 now holds text that used to sit elsewhere; keep it below the section depth.
    fn normalize_moved(&mut self, surface: &mut dyn EditingSurface) {
        if let Some(text) = surface.line(1) {
            self.normalize(surface, 1, &text);
        }
    }

    fn normalize(&mut self, surface: &mut dyn EditingSurface, line: usize, text: &str) -> Correction {
        let trimmed = text.trim();
        if !trimmed.starts_with('#') {
            self.last_corrected = None;
            return Correction::None;
        }

        let indent = text.chars().take_while(|c| c.is_whitespace()).count();
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let required = self.required_level();
        let marker_start = Position::new(line, indent);
        let marker_end = Position::new(line, indent + level);

        if self.last_corrected == Some(line) && level < required {
            surface.replace_range("", marker_start, marker_end);
            self.last_corrected = None;
            tracing::trace!(line, "removed backspaced heading marker");
            Correction::MarkerRemoved { line }
        } else if level <= self.depth {
            surface.replace_range(&"#".repeat(required), marker_start, marker_end);
            self.last_corrected = Some(line);
            tracing::trace!(line, from = level, to = required, "normalized heading level");
            Correction::Promoted {
                line,
                from: level,
                to: required,
            }
        } else {
            self.last_corrected = None;
            Correction::None
        }
    }
}
