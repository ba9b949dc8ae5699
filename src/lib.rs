//! # mdpanes
//!
//! Live, editable section embeds for markdown notes.
//!
//! An embed `![[plan#Goals]]` shows the `Goals` section of `plan.md` inside
//! another note. This library turns such an embed into an editor bound to that
//! section: edits are spliced back into the source document, changes made
//! elsewhere are reloaded, and the section's own heading cannot be broken by
//! typing in the embedded editor.
//!
//! ## Features
//!
//! - Locate, extract and splice heading sections
//! - Heading guard keeping the embedded section well formed
//! - Debounced save-back and reload-on-change sync sessions
//! - Embed link parsing and vault-relative resolution
//! - Focus routing of host editor commands to the focused embed
//! - Content-derived panel-set ids and persisted layout overrides
//!
//! ## Example
//!
//! ```rust
//! use mdpanes::{extract_section, replace_section};
//!
//! let doc = "# Root\n## A\nbody1\n## B\nbody2";
//! assert_eq!(extract_section(doc, "A"), "## A\nbody1");
//!
//! let updated = replace_section(doc, "A", "## A\nbody1-edited");
//! assert_eq!(updated, "# Root\n## A\nbody1-edited\n## B\nbody2");
//! ```
//!
//! A sync session over an in-memory store:
//!
//! ```rust
//! use mdpanes::{BufferSurface, Config, DocumentHandle, EditingSurface, MemoryStore, SectionSession};
//! use std::rc::Rc;
//! use std::time::Instant;
//!
//! let store = Rc::new(MemoryStore::new());
//! let doc = DocumentHandle::new("plan.md");
//! store.insert(&doc, "# Plan\n## Goals\nship it");
//!
//! let config = Config::default();
//! let mut session =
//!     SectionSession::open(doc.clone(), "Goals", store.clone(), BufferSurface::new(), &config.sync)?;
//!
//! session.surface_mut().unwrap().set_text("## Goals\nship it today");
//! session.poll(Instant::now());
//! assert_eq!(store.get(&doc).unwrap(), "# Plan\n## Goals\nship it today");
//! # Ok::<(), mdpanes::StoreError>(())
//! ```

/// Configuration module for persisting user preferences.
pub mod config;

/// Section locating, extraction and splicing.
pub mod section;

/// Heading guard for embedded section editors.
pub mod guard;

/// Editing surface contract and the in-memory surface.
pub mod surface;

/// Document store contract, in-memory and disk-backed stores.
pub mod store;

/// Leading-edge debouncer.
pub mod debounce;

/// Section sync sessions.
pub mod session;

/// Embed link parsing, resolution and mounting.
pub mod embed;

/// Editor commands redirected to embedded editors.
pub mod commands;

/// Focus routing of host commands and view lookups.
pub mod focus;

/// Panel-set ids and layout overrides.
pub mod layout;

// Re-export commonly used types for convenience
pub use commands::EditorCommand;
pub use config::Config;
pub use embed::{
    EmbedError, EmbedTarget, EmbedView, LinkResolver, ResolveError, VaultResolver, find_embeds,
    parse_link, resolve_embed,
};
pub use focus::{FocusRouter, HostControls, SurfaceProvider};
pub use guard::HeadingGuard;
pub use layout::{LayoutOverrides, panel_set_id};
pub use section::{MISSING_SECTION_NOTICE, extract_section, replace_section};
pub use session::{PollReport, ReloadOutcome, SaveOutcome, SectionSession, SessionState};
pub use store::{DocumentHandle, DocumentStore, FsStore, MemoryStore, StoreError};
pub use surface::{BufferSurface, EditingSurface, Position};
