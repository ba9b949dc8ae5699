//! Embed links: parsing, resolution and mounting.
//!
//! An embed is written `![[path#Section|alias]]`. The alias is display-only
//! and dropped. A section turns the embed into an editable section session;
//! without one the whole document is embedded read-only.
//!
//! Every failure is turned into a message shown in place of the embed by
//! [`EmbedView::mount`]; nothing here panics or propagates past it.

use crate::config::{Config, EmbedConfig};
use crate::section::heading_depth;
use crate::session::SectionSession;
use crate::store::{DocumentHandle, DocumentStore, StoreError};
use crate::surface::EditingSurface;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::OnceLock;
use thiserror::Error;

/// An embed link found in markdown content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedLink {
    /// The full token, including `![[` and `]]`
    pub raw: String,
    /// Byte offset in the source content where the token starts
    pub offset: usize,
}

/// Components of a link token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkToken {
    pub path: String,
    pub section: Option<String>,
    pub alias: Option<String>,
}

/// Split a raw token into path, section and alias.
///
/// Accepts the token with or without its `![[ ]]` wrapping. Everything after
/// the first `|` is the alias; the path is split on the first `#`, and an
/// empty section counts as none.
pub fn parse_link(raw: &str) -> LinkToken {
    let inner = raw.trim();
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    let inner = inner.strip_prefix("[[").unwrap_or(inner);
    let inner = inner.strip_suffix("]]").unwrap_or(inner);

    let (target, alias) = match inner.split_once('|') {
        Some((target, alias)) => (target, Some(alias.trim().to_string())),
        None => (inner, None),
    };
    let (path, section) = match target.split_once('#') {
        Some((path, section)) => (path, Some(section.trim())),
        None => (target, None),
    };

    LinkToken {
        path: path.trim().to_string(),
        section: section.filter(|s| !s.is_empty()).map(str::to_string),
        alias: alias.filter(|a| !a.is_empty()),
    }
}

fn embed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[\[([^\[\]\n]+)\]\]").expect("valid embed regex"))
}

/// Find every `![[...]]` embed in `content`, skipping fenced code blocks and
/// inline code spans.
pub fn find_embeds(content: &str) -> Vec<EmbedLink> {
    let mut embeds = Vec::new();
    let mut fence: Option<&str> = None;
    let mut offset = 0;

    for line in content.split('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None => {
                for m in embed_regex().find_iter(line) {
                    let ticks = line[..m.start()].matches('`').count();
                    if ticks % 2 == 1 {
                        continue;
                    }
                    embeds.push(EmbedLink {
                        raw: m.as_str().to_string(),
                        offset: offset + m.start(),
                    });
                }
            }
        }
        offset += line.len() + 1;
    }

    embeds
}

/// Host collaborator turning a link path into a concrete document.
pub trait LinkResolver {
    /// Resolve `path` as written in the document at `from`.
    fn resolve(&self, path: &str, from: &Path) -> Option<DocumentHandle>;
}

/// Resolves links against files on disk.
///
/// Paths are looked up next to the source document first, then from the
/// vault root. Absolute paths, `..` components and symlinks are refused.
#[derive(Debug, Clone)]
pub struct VaultResolver {
    root: PathBuf,
}

impl VaultResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(path: &str) -> [String; 3] {
        [format!("{}.md", path), format!("{}.markdown", path), path.to_string()]
    }
}

impl LinkResolver for VaultResolver {
    fn resolve(&self, path: &str, from: &Path) -> Option<DocumentHandle> {
        let relative = Path::new(path);
        if path.is_empty() || relative.is_absolute() {
            return None;
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            tracing::debug!(path, "refusing link outside the vault");
            return None;
        }

        let source_dir = from.parent().filter(|p| !p.as_os_str().is_empty());
        let bases = source_dir.into_iter().chain(std::iter::once(self.root.as_path()));

        for base in bases {
            for candidate in Self::candidates(path) {
                let full = base.join(&candidate);
                // Skip symlinks
                if full.is_symlink() {
                    continue;
                }
                if full.is_file() {
                    return Some(DocumentHandle::new(full));
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Unable to find \"{0}\"")]
    NotFound(String),

    #[error("Block references are not supported: \"#{0}\"")]
    BlockReference(String),

    #[error("\"{document}\" is not an editable markdown document")]
    NotApplicable { document: String },

    #[error("A document cannot embed itself")]
    SelfEmbed,
}

impl ResolveError {
    /// Stable identifier for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotFound(_) => "not-found",
            ResolveError::BlockReference(_) => "block-reference",
            ResolveError::NotApplicable { .. } => "not-applicable",
            ResolveError::SelfEmbed => "self-embed",
        }
    }
}

/// What an embed points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTarget {
    pub document: DocumentHandle,
    pub section: Option<String>,
}

impl EmbedTarget {
    /// Whether the target is a single section rather than a whole document.
    pub fn is_section(&self) -> bool {
        self.section.is_some()
    }
}

/// Resolve a raw embed token written in `source`.
pub fn resolve_embed(
    raw: &str,
    source: &DocumentHandle,
    resolver: &dyn LinkResolver,
    config: &EmbedConfig,
) -> Result<EmbedTarget, ResolveError> {
    let token = parse_link(raw);

    if let Some(block) = token.section.as_deref().and_then(|s| s.strip_prefix('^')) {
        return Err(ResolveError::BlockReference(format!("^{}", block)));
    }

    let document = if token.path.is_empty() {
        source.clone()
    } else {
        resolver
            .resolve(&token.path, source.path())
            .ok_or_else(|| ResolveError::NotFound(token.path.clone()))?
    };

    if token.section.is_none() && same_document(&document, source) {
        return Err(ResolveError::SelfEmbed);
    }

    if !config.is_editable(document.extension().as_deref()) {
        return Err(ResolveError::NotApplicable {
            document: document.to_string(),
        });
    }

    // A section name written with its heading marker still names the heading.
    let section = token.section.map(|s| match heading_depth(&s) {
        Some(depth) => s[depth..].trim().to_string(),
        None => s,
    });

    Ok(EmbedTarget { document, section })
}

fn same_document(a: &DocumentHandle, b: &DocumentHandle) -> bool {
    if a.path() == b.path() {
        return true;
    }
    match (a.path().canonicalize(), b.path().canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Unable to open an editor for \"{0}\"")]
    Render(String),

    #[error(transparent)]
    Load(#[from] StoreError),
}

/// A mounted embed.
pub enum EmbedView<E: EditingSurface> {
    /// An editable section bound to a live session.
    Editor(SectionSession<E>),
    /// A whole document, shown read-only by the host.
    Document(DocumentHandle),
    /// A message shown in place of the embed.
    Error(String),
}

impl<E: EditingSurface> EmbedView<E> {
    /// Resolve `raw` and mount whatever it points at.
    ///
    /// `make_surface` is asked for an editing surface only when the target is
    /// a section; returning `None` is reported as a render failure.
    pub fn mount(
        raw: &str,
        source: &DocumentHandle,
        resolver: &dyn LinkResolver,
        store: Rc<dyn DocumentStore>,
        make_surface: impl FnOnce(&EmbedTarget) -> Option<E>,
        config: &Config,
    ) -> Self {
        match Self::try_mount(raw, source, resolver, store, make_surface, config) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(link = raw, source = %source, error = %e, "failed to mount embed");
                EmbedView::Error(e.to_string())
            }
        }
    }

    fn try_mount(
        raw: &str,
        source: &DocumentHandle,
        resolver: &dyn LinkResolver,
        store: Rc<dyn DocumentStore>,
        make_surface: impl FnOnce(&EmbedTarget) -> Option<E>,
        config: &Config,
    ) -> Result<Self, EmbedError> {
        let target = resolve_embed(raw, source, resolver, &config.embeds)?;
        let Some(section) = target.section.clone() else {
            return Ok(EmbedView::Document(target.document));
        };

        let surface =
            make_surface(&target).ok_or_else(|| EmbedError::Render(target.document.to_string()))?;
        let session = SectionSession::open(target.document, section, store, surface, &config.sync)?;
        Ok(EmbedView::Editor(session))
    }

    pub fn session(&self) -> Option<&SectionSession<E>> {
        match self {
            EmbedView::Editor(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut SectionSession<E>> {
        match self {
            EmbedView::Editor(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EmbedView::Error(message) => Some(message),
            _ => None,
        }
    }
}
