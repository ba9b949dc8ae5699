//! Section sync sessions.
//!
//! A session binds one editing surface to one `(document, section)` pair. It
//! projects the section into the surface, polices edits with a
//! [`HeadingGuard`], writes edits back through a leading-edge debounce and
//! reloads the surface when the document changes elsewhere.
//!
//! Everything runs on the host's event loop. The host calls [`SectionSession::poll`]
//! whenever something may have happened (keystroke, store notification,
//! timer); no method blocks beyond a single store read or write.
//!
//! Two flags stand in for locks:
//! - `suppressed` is set while the session edits the surface itself, so those
//!   edits are never mistaken for user input.
//! - `save_in_flight` is set for the duration of a write-back; a second save
//!   is dropped rather than queued, and store notifications observed during
//!   the write are consumed without reloading.

use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::guard::{Correction, HeadingGuard};
use crate::section::{extract_section, replace_section};
use crate::store::{DocumentHandle, DocumentStore, StoreError, Subscription};
use crate::surface::EditingSurface;
use std::rc::Rc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Active,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The document was rewritten.
    Written,
    /// The spliced document was identical to the stored one.
    Unchanged,
    /// Another save was in flight, or the session is not active.
    Skipped,
    /// Reading or writing failed; the buffer is kept as is.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The surface now shows the stored section.
    Reloaded,
    /// The stored section already matched the buffer.
    Unchanged,
    /// Unsaved edits are pending; the pending save will win.
    Deferred,
    /// A save was in flight.
    Ignored,
    /// Reading failed; the buffer is kept as is.
    Failed,
}

/// What a single [`SectionSession::poll`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub corrections: usize,
    pub save: Option<SaveOutcome>,
    pub reload: Option<ReloadOutcome>,
}

pub struct SectionSession<E: EditingSurface> {
    document: DocumentHandle,
    section: String,
    store: Rc<dyn DocumentStore>,
    surface: Option<E>,
    guard: HeadingGuard,
    subscription: Option<Subscription>,
    debouncer: Debouncer,
    suppressed: bool,
    save_in_flight: bool,
    state: SessionState,
}

impl<E: EditingSurface> SectionSession<E> {
    /// Load `section` of `document` into `surface` and start syncing.
    ///
    /// On failure the surface is released and the error is meant to be shown
    /// in place of the editor.
    pub fn open(
        document: DocumentHandle,
        section: impl Into<String>,
        store: Rc<dyn DocumentStore>,
        surface: E,
        sync: &SyncConfig,
    ) -> Result<Self, StoreError> {
        let mut session = Self {
            document,
            section: section.into(),
            store,
            surface: Some(surface),
            guard: HeadingGuard::new(""),
            subscription: None,
            debouncer: Debouncer::new(sync.debounce()),
            suppressed: false,
            save_in_flight: false,
            state: SessionState::Loading,
        };
        session.load()?;
        Ok(session)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let content = self.store.read(&self.document)?;
        let section = extract_section(&content, &self.section);
        let subscription = self.store.subscribe(&self.document)?;

        if let Some(surface) = self.surface.as_mut() {
            surface.detach_file();
        }
        self.with_suppressed(|surface, guard| {
            guard.reset(&section);
            surface.set_text(&section);
        });

        self.subscription = Some(subscription);
        self.state = SessionState::Active;
        tracing::debug!(
            document = %self.document,
            section = %self.section,
            lines = section.split('\n').count(),
            "section session active"
        );
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn surface(&self) -> Option<&E> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut E> {
        self.surface.as_mut()
    }

    pub fn guard(&self) -> &HeadingGuard {
        &self.guard
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn is_save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// Whether edits are waiting for the trailing save.
    pub fn has_pending_save(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// When the host should poll again to flush the pending save.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Run `f` on the surface with change handling suppressed, discarding the
    /// change notifications it produces.
    fn with_suppressed<R>(&mut self, f: impl FnOnce(&mut E, &mut HeadingGuard) -> R) -> Option<R> {
        let surface = self.surface.as_mut()?;
        self.suppressed = true;
        let result = f(surface, &mut self.guard);
        surface.take_changes();
        self.suppressed = false;
        Some(result)
    }

    /// Handle everything that may have happened since the last call: user
    /// edits, store notifications and a due trailing save, in that order.
    pub fn poll(&mut self, now: Instant) -> PollReport {
        let mut report = PollReport::default();
        if self.state != SessionState::Active {
            return report;
        }

        let (corrections, save) = self.handle_surface_changes(now);
        report.corrections = corrections;
        report.save = save;
        report.reload = self.handle_document_changes();
        if let Some(outcome) = self.flush_due(now) {
            report.save = Some(outcome);
        }
        report
    }

    /// Run the heading guard over user edits and schedule a save.
    ///
    /// Returns the number of corrections applied and the outcome of the save
    /// if the debounce fired on the leading edge.
    pub fn handle_surface_changes(&mut self, now: Instant) -> (usize, Option<SaveOutcome>) {
        if self.state != SessionState::Active || self.suppressed {
            return (0, None);
        }
        let Some(surface) = self.surface.as_mut() else {
            return (0, None);
        };

        let mut lines: Vec<usize> = surface.take_changes().iter().map(|c| c.line).collect();
        if lines.is_empty() {
            return (0, None);
        }
        lines.sort_unstable();
        lines.dedup();

        let mut corrections = 0;
        for line in lines {
            let correction = self.with_suppressed(|surface, guard| guard.react(surface, line));
            if correction.is_some_and(|c| c != Correction::None) {
                corrections += 1;
            }
        }

        let save = self.debouncer.trigger(now).then(|| self.save());
        (corrections, save)
    }

    /// React to store notifications for the bound document.
    pub fn handle_document_changes(&mut self) -> Option<ReloadOutcome> {
        let count = self.subscription.as_ref().map_or(0, Subscription::drain);
        if count == 0 {
            return None;
        }

        if self.save_in_flight {
            return Some(ReloadOutcome::Ignored);
        }
        if self.debouncer.is_pending() {
            tracing::debug!(document = %self.document, "external change deferred, unsaved edits pending");
            return Some(ReloadOutcome::Deferred);
        }
        Some(self.reload())
    }

    /// Fire the trailing save if it is due.
    pub fn flush_due(&mut self, now: Instant) -> Option<SaveOutcome> {
        if self.state != SessionState::Active {
            return None;
        }
        self.debouncer.poll(now).then(|| self.save())
    }

    /// Save pending edits right away instead of waiting for the debounce.
    pub fn flush_pending(&mut self) -> Option<SaveOutcome> {
        if !self.debouncer.is_pending() {
            return None;
        }
        self.debouncer.cancel();
        Some(self.save())
    }

    /// Re-project the section from the store into the surface.
    pub fn reload(&mut self) -> ReloadOutcome {
        if self.state != SessionState::Active {
            return ReloadOutcome::Ignored;
        }

        let content = match self.store.read(&self.document) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(document = %self.document, error = %e, "failed to reload section");
                return ReloadOutcome::Failed;
            }
        };
        let section = extract_section(&content, &self.section);

        let Some(surface) = self.surface.as_ref() else {
            return ReloadOutcome::Ignored;
        };
        if surface.text() == section {
            return ReloadOutcome::Unchanged;
        }
        let cursor = surface.cursor();

        self.with_suppressed(|surface, guard| {
            guard.reset(&section);
            surface.set_text(&section);
            if cursor.line < surface.line_count() && cursor.ch <= surface.line_len(cursor.line) {
                surface.set_cursor(cursor);
            }
        });

        tracing::debug!(document = %self.document, section = %self.section, "reloaded section");
        ReloadOutcome::Reloaded
    }

    /// Write the buffer back into the document.
    ///
    /// The document is re-read first so changes elsewhere in it are kept, and
    /// it is only written when the spliced result differs.
    pub fn save(&mut self) -> SaveOutcome {
        if self.state != SessionState::Active {
            return SaveOutcome::Skipped;
        }
        if self.save_in_flight {
            tracing::debug!(document = %self.document, "save already in flight, skipping");
            return SaveOutcome::Skipped;
        }

        self.save_in_flight = true;
        let outcome = self.write_back();
        if outcome == SaveOutcome::Written {
            // Notifications for our own write are consumed while the flag is set.
            if let Some(subscription) = &self.subscription {
                subscription.drain();
            }
        }
        self.save_in_flight = false;
        outcome
    }

    fn write_back(&mut self) -> SaveOutcome {
        let Some(surface) = self.surface.as_ref() else {
            return SaveOutcome::Skipped;
        };
        let buffer = surface.text();

        let current = match self.store.read(&self.document) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(document = %self.document, error = %e, "failed to read document for save");
                return SaveOutcome::Failed;
            }
        };

        let updated = replace_section(&current, &self.section, &buffer);
        if updated == current {
            return SaveOutcome::Unchanged;
        }

        match self.store.write(&self.document, &updated) {
            Ok(()) => {
                tracing::debug!(document = %self.document, section = %self.section, "saved section");
                SaveOutcome::Written
            }
            Err(e) => {
                tracing::warn!(document = %self.document, error = %e, "failed to save section");
                SaveOutcome::Failed
            }
        }
    }

    /// Stop syncing: cancel any pending save, unsubscribe and hand the surface
    /// back to the host. Calling it again returns `None`.
    pub fn teardown(&mut self) -> Option<E> {
        if self.state == SessionState::TornDown {
            return None;
        }
        self.debouncer.cancel();
        self.subscription = None;
        self.state = SessionState::TornDown;
        tracing::debug!(document = %self.document, section = %self.section, "section session torn down");
        self.surface.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EditorCommand;
    use crate::config::EditingConfig;
    use crate::store::MemoryStore;
    use crate::surface::{BufferSurface, Position};
    use std::time::Duration;

    const DOC: &str = "# Root\n## A\nbody1\n## B\nbody2";

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn setup(content: &str, section: &str) -> (Rc<MemoryStore>, DocumentHandle, SectionSession<BufferSurface>) {
        let store = Rc::new(MemoryStore::new());
        let doc = DocumentHandle::new("notes/root.md");
        store.insert(&doc, content);
        let session = SectionSession::open(
            doc.clone(),
            section,
            store.clone(),
            BufferSurface::for_file("notes/embed-host.md"),
            &SyncConfig::default(),
        )
        .unwrap();
        (store, doc, session)
    }

    fn type_at(session: &mut SectionSession<BufferSurface>, pos: Position, text: &str) {
        let surface = session.surface_mut().unwrap();
        surface.set_cursor(pos);
        surface.type_text(text);
    }

    #[test]
    fn test_open_projects_section() {
        let (_store, _doc, session) = setup(DOC, "A");
        let surface = session.surface().unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(surface.text(), "## A\nbody1");
        assert_eq!(surface.file(), None);
        assert_eq!(session.guard().depth(), 2);
    }

    #[test]
    fn test_open_missing_document_fails() {
        let store: Rc<dyn DocumentStore> = Rc::new(MemoryStore::new());
        let result = SectionSession::open(
            DocumentHandle::new("missing.md"),
            "A",
            store,
            BufferSurface::new(),
            &SyncConfig::default(),
        );
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_open_missing_section_shows_placeholder() {
        let (_store, _doc, session) = setup(DOC, "Nope");
        let text = session.surface().unwrap().text();
        assert!(text.starts_with("# Nope"));
        assert!(text.contains("Section not found"));
    }

    #[test]
    fn test_initial_load_is_not_treated_as_user_edit() {
        let (store, doc, mut session) = setup(DOC, "A");
        let report = session.poll(Instant::now());
        assert_eq!(report, PollReport::default());
        assert_eq!(store.write_count(&doc), 0);
    }

    #[test]
    fn test_first_edit_saves_immediately() {
        let (store, doc, mut session) = setup(DOC, "A");
        type_at(&mut session, Position::new(1, 5), "-edited");

        let report = session.poll(Instant::now());
        assert_eq!(report.save, Some(SaveOutcome::Written));
        assert_eq!(store.write_count(&doc), 1);
        assert_eq!(
            store.get(&doc).unwrap(),
            "# Root\n## A\nbody1-edited\n## B\nbody2"
        );
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_trailing_write() {
        let (store, doc, mut session) = setup(DOC, "A");
        let t0 = Instant::now();

        type_at(&mut session, Position::new(1, 5), "x");
        assert_eq!(session.poll(t0).save, Some(SaveOutcome::Written));

        type_at(&mut session, Position::new(1, 6), "y");
        assert_eq!(session.poll(t0 + ms(100)).save, None);
        type_at(&mut session, Position::new(1, 7), "z");
        assert_eq!(session.poll(t0 + ms(200)).save, None);
        assert_eq!(store.write_count(&doc), 1);
        assert!(session.has_pending_save());

        assert_eq!(session.poll(t0 + ms(500)).save, None);
        assert_eq!(session.poll(t0 + ms(950)).save, Some(SaveOutcome::Written));
        assert_eq!(session.poll(t0 + ms(3000)).save, None);

        assert_eq!(store.write_count(&doc), 2);
        assert!(store.get(&doc).unwrap().contains("body1xyz"));
    }

    #[test]
    fn test_heading_edit_is_reverted_without_writing() {
        let (store, doc, mut session) = setup(DOC, "A");
        type_at(&mut session, Position::new(0, 4), " renamed");

        let report = session.poll(Instant::now());
        assert_eq!(report.corrections, 1);
        assert_eq!(report.save, Some(SaveOutcome::Unchanged));
        assert_eq!(session.surface().unwrap().text(), "## A\nbody1");
        assert_eq!(store.write_count(&doc), 0);
    }

    #[test]
    fn test_backspace_into_heading_keeps_body_on_disk() {
        let (store, doc, mut session) = setup("# Root\n## A\nbody1\nbody2\n## B\nx", "A");
        let surface = session.surface_mut().unwrap();
        surface.set_cursor(Position::new(1, 0));
        surface.backspace();

        let report = session.poll(Instant::now());
        assert_eq!(report.corrections, 1);
        assert_eq!(report.save, Some(SaveOutcome::Unchanged));
        assert_eq!(session.surface().unwrap().text(), "## A\nbody1\nbody2");
        assert_eq!(store.get(&doc).unwrap(), "# Root\n## A\nbody1\nbody2\n## B\nx");
    }

    #[test]
    fn test_delete_line_on_heading_keeps_body_on_disk() {
        let (store, doc, mut session) = setup("# Root\n## A\nbody1\nbody2\n## B\nx", "A");
        let surface = session.surface_mut().unwrap();
        surface.set_cursor(Position::new(0, 0));
        EditorCommand::DeleteLine.execute(surface, &EditingConfig::default());
        assert_eq!(surface.text(), "body1\nbody2");

        session.poll(Instant::now());
        assert_eq!(session.surface().unwrap().text(), "## A\nbody1\nbody2");
        assert_eq!(store.get(&doc).unwrap(), "# Root\n## A\nbody1\nbody2\n## B\nx");
        assert_eq!(store.write_count(&doc), 0);
    }

    #[test]
    fn test_swap_line_up_under_heading_is_undone() {
        let (store, doc, mut session) = setup(DOC, "A");
        let surface = session.surface_mut().unwrap();
        surface.set_cursor(Position::new(1, 0));
        EditorCommand::SwapLineUp.execute(surface, &EditingConfig::default());

        session.poll(Instant::now());
        assert_eq!(session.surface().unwrap().text(), "## A\nbody1");
        assert_eq!(store.get(&doc).unwrap(), DOC);
    }

    #[test]
    fn test_typed_heading_is_normalized_before_saving() {
        let (store, doc, mut session) = setup(DOC, "A");
        let surface = session.surface_mut().unwrap();
        let end = surface.line_end(1);
        surface.replace_range("\n## foo", end, end);

        let report = session.poll(Instant::now());
        assert_eq!(report.corrections, 1);
        assert_eq!(
            store.get(&doc).unwrap(),
            "# Root\n## A\nbody1\n### foo\n## B\nbody2"
        );
    }

    #[test]
    fn test_guard_edits_do_not_retrigger() {
        let (_store, _doc, mut session) = setup(DOC, "A");
        type_at(&mut session, Position::new(1, 0), "# ");
        let t0 = Instant::now();
        assert_eq!(session.poll(t0).corrections, 1);
        assert!(session.surface_mut().unwrap().take_changes().is_empty());
        assert_eq!(session.poll(t0 + ms(10)), PollReport::default());
    }

    #[test]
    fn test_external_change_reloads_surface() {
        let (store, doc, mut session) = setup(DOC, "A");
        session
            .surface_mut()
            .unwrap()
            .set_cursor(Position::new(1, 2));

        store.edit_externally(&doc, "# Root\n## A\nchanged elsewhere\n## B\nbody2");
        let report = session.poll(Instant::now());

        assert_eq!(report.reload, Some(ReloadOutcome::Reloaded));
        assert_eq!(report.save, None);
        let surface = session.surface().unwrap();
        assert_eq!(surface.text(), "## A\nchanged elsewhere");
        assert_eq!(surface.cursor(), Position::new(1, 2));
        assert_eq!(store.write_count(&doc), 0);
    }

    #[test]
    fn test_reload_resets_guard_to_new_heading_depth() {
        let (store, doc, mut session) = setup(DOC, "A");
        store.edit_externally(&doc, "# Root\n### A\nbody1");
        session.poll(Instant::now());
        assert_eq!(session.guard().depth(), 3);
        assert_eq!(session.guard().original_heading(), "### A");
    }

    #[test]
    fn test_unrelated_external_change_leaves_surface_alone() {
        let (store, doc, mut session) = setup(DOC, "A");
        store.edit_externally(&doc, "# Root\n## A\nbody1\n## B\nbody2 changed");
        assert_eq!(
            session.poll(Instant::now()).reload,
            Some(ReloadOutcome::Unchanged)
        );
    }

    #[test]
    fn test_own_save_does_not_reload() {
        let (store, doc, mut session) = setup(DOC, "A");
        type_at(&mut session, Position::new(1, 5), "!");
        let report = session.poll(Instant::now());
        assert_eq!(report.save, Some(SaveOutcome::Written));
        assert_eq!(report.reload, None);
        assert_eq!(store.write_count(&doc), 1);
    }

    #[test]
    fn test_late_echo_of_own_save_keeps_newer_keystrokes() {
        let (store, doc, mut session) = setup(DOC, "A");
        let t0 = Instant::now();

        type_at(&mut session, Position::new(1, 5), "1");
        session.poll(t0);
        let written = store.get(&doc).unwrap();

        // Keystroke typed while the echo of the first save is still on its way.
        type_at(&mut session, Position::new(1, 6), "2");
        store.edit_externally(&doc, written);

        let report = session.poll(t0 + ms(50));
        assert_eq!(report.reload, Some(ReloadOutcome::Deferred));
        assert_eq!(session.surface().unwrap().text(), "## A\nbody112");

        session.poll(t0 + ms(900));
        assert!(store.get(&doc).unwrap().contains("body112"));
    }

    #[test]
    fn test_save_keeps_concurrent_changes_elsewhere() {
        let (store, doc, mut session) = setup(DOC, "A");
        // Changed behind the session's back, no notification yet.
        store.insert(&doc, "# Root\n## A\nbody1\n## B\nbody2 from elsewhere");

        type_at(&mut session, Position::new(1, 5), "+");
        session.poll(Instant::now());
        assert_eq!(
            store.get(&doc).unwrap(),
            "# Root\n## A\nbody1+\n## B\nbody2 from elsewhere"
        );
    }

    #[test]
    fn test_concurrent_save_is_skipped() {
        let (store, doc, mut session) = setup(DOC, "A");
        type_at(&mut session, Position::new(1, 5), "x");
        session.save_in_flight = true;
        assert_eq!(session.save(), SaveOutcome::Skipped);
        assert_eq!(store.write_count(&doc), 0);
    }

    #[test]
    fn test_write_failure_keeps_buffer_and_recovers() {
        let (store, doc, mut session) = setup(DOC, "A");
        store.set_fail_writes(true);
        type_at(&mut session, Position::new(1, 5), "x");

        let t0 = Instant::now();
        assert_eq!(session.poll(t0).save, Some(SaveOutcome::Failed));
        assert!(!session.is_save_in_flight());
        assert_eq!(session.surface().unwrap().text(), "## A\nbody1x");

        store.set_fail_writes(false);
        assert_eq!(session.save(), SaveOutcome::Written);
        assert!(store.get(&doc).unwrap().contains("body1x"));
    }

    #[test]
    fn test_teardown_cancels_pending_save() {
        let (store, doc, mut session) = setup(DOC, "A");
        let t0 = Instant::now();

        type_at(&mut session, Position::new(1, 5), "a");
        session.poll(t0);
        type_at(&mut session, Position::new(1, 6), "b");
        session.poll(t0 + ms(10));
        assert!(session.has_pending_save());

        let surface = session.teardown();
        assert!(surface.is_some());
        assert_eq!(session.state(), SessionState::TornDown);
        assert!(session.teardown().is_none());

        assert_eq!(session.poll(t0 + ms(5000)), PollReport::default());
        assert_eq!(session.save(), SaveOutcome::Skipped);
        assert_eq!(store.write_count(&doc), 1);
    }

    #[test]
    fn test_flush_pending_saves_now() {
        let (store, doc, mut session) = setup(DOC, "A");
        let t0 = Instant::now();
        type_at(&mut session, Position::new(1, 5), "a");
        session.poll(t0);
        type_at(&mut session, Position::new(1, 6), "b");
        session.poll(t0 + ms(10));

        assert_eq!(session.flush_pending(), Some(SaveOutcome::Written));
        assert_eq!(session.flush_pending(), None);
        assert!(store.get(&doc).unwrap().contains("body1ab"));
    }

    #[test]
    fn test_editing_placeholder_appends_section() {
        let (store, doc, mut session) = setup("# Root\ntext", "New");
        let surface = session.surface_mut().unwrap();
        surface.set_text("# New\n\nfresh");

        session.poll(Instant::now());
        assert_eq!(store.get(&doc).unwrap(), "# Root\ntext\n\n# New\n\nfresh");
    }
}
