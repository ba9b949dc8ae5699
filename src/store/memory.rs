//! In-memory document store.
//!
//! Notifications are sent synchronously from inside `write`, before it
//! returns, which is what a host with an in-process vault does.

use super::{DocumentHandle, DocumentStore, StoreError, Subscribers, Subscription};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<HashMap<PathBuf, String>>,
    subscribers: RefCell<Subscribers>,
    writes: RefCell<HashMap<PathBuf, usize>>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document without counting a write or notifying anyone.
    pub fn insert(&self, doc: &DocumentHandle, text: impl Into<String>) {
        self.documents
            .borrow_mut()
            .insert(doc.path().to_path_buf(), text.into());
    }

    /// Change a document the way another editor would: content is replaced
    /// and subscribers are notified, but it does not count as a store write.
    pub fn edit_externally(&self, doc: &DocumentHandle, text: impl Into<String>) {
        self.insert(doc, text);
        self.subscribers.borrow_mut().notify(doc.path());
    }

    /// Current content, if the document exists.
    pub fn get(&self, doc: &DocumentHandle) -> Option<String> {
        self.documents.borrow().get(doc.path()).cloned()
    }

    /// Number of writes issued through [`DocumentStore::write`].
    pub fn write_count(&self, doc: &DocumentHandle) -> usize {
        self.writes.borrow().get(doc.path()).copied().unwrap_or(0)
    }

    /// Make every following write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, doc: &DocumentHandle) -> Result<String, StoreError> {
        self.get(doc)
            .ok_or_else(|| StoreError::NotFound(doc.path().to_path_buf()))
    }

    fn write(&self, doc: &DocumentHandle, text: &str) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::io(
                doc.path(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store is read-only"),
            ));
        }

        self.insert(doc, text);
        *self
            .writes
            .borrow_mut()
            .entry(doc.path().to_path_buf())
            .or_default() += 1;
        self.subscribers.borrow_mut().notify(doc.path());
        Ok(())
    }

    fn subscribe(&self, doc: &DocumentHandle) -> Result<Subscription, StoreError> {
        Ok(self.subscribers.borrow_mut().add(doc.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_document() {
        let store = MemoryStore::new();
        let err = store.read(&DocumentHandle::new("nope.md")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_write_notifies_and_counts() {
        let store = MemoryStore::new();
        let doc = DocumentHandle::new("a.md");
        store.insert(&doc, "old");
        let sub = store.subscribe(&doc).unwrap();

        store.write(&doc, "new").unwrap();
        assert_eq!(store.read(&doc).unwrap(), "new");
        assert_eq!(store.write_count(&doc), 1);
        assert_eq!(sub.drain(), 1);
    }

    #[test]
    fn test_external_edit_notifies_without_counting() {
        let store = MemoryStore::new();
        let doc = DocumentHandle::new("a.md");
        let sub = store.subscribe(&doc).unwrap();
        store.edit_externally(&doc, "x");
        assert_eq!(store.write_count(&doc), 0);
        assert_eq!(sub.drain(), 1);
    }

    #[test]
    fn test_failing_writes() {
        let store = MemoryStore::new();
        let doc = DocumentHandle::new("a.md");
        store.insert(&doc, "keep");
        store.set_fail_writes(true);
        assert!(matches!(
            store.write(&doc, "lost"),
            Err(StoreError::Io { .. })
        ));
        assert_eq!(store.get(&doc).as_deref(), Some("keep"));
    }
}
