//! Disk-backed document store.
//!
//! Writes go through a temporary file in the same directory and are renamed
//! into place. Change notification watches the document's parent directory
//! (so atomic replacements by other editors are still seen) and forwards
//! events for subscribed files only.

use super::{DocumentHandle, DocumentStore, StoreError, Subscribers, Subscription};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{AccessKind, AccessMode, ModifyKind},
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct FsStore {
    watcher: RefCell<RecommendedWatcher>,
    subscribers: Arc<Mutex<Subscribers>>,
    watched_dirs: RefCell<HashSet<PathBuf>>,
}

impl FsStore {
    pub fn new() -> Result<Self, notify::Error> {
        let subscribers = Arc::new(Mutex::new(Subscribers::default()));
        let handler_subscribers = Arc::clone(&subscribers);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                // Watch error, ignore
                return;
            };
            if !is_relevant_event(&event) {
                return;
            }
            if let Ok(mut subs) = handler_subscribers.lock() {
                for path in &event.paths {
                    tracing::trace!(path = %path.display(), "document changed on disk");
                    subs.notify(path);
                }
            }
        })?;

        Ok(Self {
            watcher: RefCell::new(watcher),
            subscribers,
            watched_dirs: RefCell::new(HashSet::new()),
        })
    }

    /// Absolute path with a canonical parent directory, the form the watcher
    /// reports events in.
    fn watch_key(path: &Path) -> Result<PathBuf, StoreError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = parent
            .canonicalize()
            .map_err(|e| StoreError::io(parent, e))?;
        let name = path
            .file_name()
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        Ok(dir.join(name))
    }
}

/// Replace `path` with `text` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, text: &str) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = text.len(), "wrote document");
    Ok(())
}

/// Check if an event is relevant for triggering a reload.
fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Create(_)
    )
}

impl DocumentStore for FsStore {
    fn read(&self, doc: &DocumentHandle) -> Result<String, StoreError> {
        fs::read_to_string(doc.path()).map_err(|e| StoreError::io(doc.path(), e))
    }

    fn write(&self, doc: &DocumentHandle, text: &str) -> Result<(), StoreError> {
        write_atomic(doc.path(), text)
    }

    fn subscribe(&self, doc: &DocumentHandle) -> Result<Subscription, StoreError> {
        let key = Self::watch_key(doc.path())?;

        if let Some(dir) = key.parent() {
            let mut watched = self.watched_dirs.borrow_mut();
            if !watched.contains(dir) {
                self.watcher
                    .borrow_mut()
                    .watch(dir, RecursiveMode::NonRecursive)
                    .map_err(|source| StoreError::Watch {
                        path: dir.to_path_buf(),
                        source,
                    })?;
                watched.insert(dir.to_path_buf());
            }
        }

        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(subs.add(&key))
    }
}
