//! Document store contract.
//!
//! Documents are read and written whole. Change notifications are delivered
//! through a [`Subscription`], a channel the owner drains from its own event
//! loop; dropping the subscription unsubscribes.

mod fs;
mod memory;

pub use fs::{FsStore, write_atomic};
pub use memory::MemoryStore;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use thiserror::Error;

/// A concrete document, addressed by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    path: PathBuf,
}

impl DocumentHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }

    /// File stem, used as the display name of the document.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string()
    }
}

impl std::fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A document changed on the store side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Receiving end of a change subscription for one document.
#[derive(Debug)]
pub struct Subscription {
    path: PathBuf,
    receiver: Receiver<DocumentChange>,
}

impl Subscription {
    pub(crate) fn new(path: PathBuf, receiver: Receiver<DocumentChange>) -> Self {
        Self { path, receiver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain all pending notifications, returning how many there were.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(_) => count += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }
}

/// Fan-out list shared by the stores. Subscribers whose receiver has been
/// dropped are pruned on the next notification.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    entries: Vec<(PathBuf, Sender<DocumentChange>)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, path: &Path) -> Subscription {
        let (tx, rx) = std::sync::mpsc::channel();
        self.entries.push((path.to_path_buf(), tx));
        Subscription::new(path.to_path_buf(), rx)
    }

    pub(crate) fn notify(&mut self, path: &Path) {
        self.entries.retain(|(watched, tx)| {
            if watched != path {
                return true;
            }
            tx.send(DocumentChange {
                path: path.to_path_buf(),
            })
            .is_ok()
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Whole-document storage with change notification.
pub trait DocumentStore {
    fn read(&self, doc: &DocumentHandle) -> Result<String, StoreError>;

    fn write(&self, doc: &DocumentHandle, text: &str) -> Result<(), StoreError>;

    fn subscribe(&self, doc: &DocumentHandle) -> Result<Subscription, StoreError>;
}
