//! Per-panel layout overrides.
//!
//! A panel set is identified by a hash of its source text, so overrides
//! follow the panels wherever the block is moved and are dropped naturally
//! once the block is edited into something else.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Hex chars of the SHA-256 digest kept in a panel-set id
const ID_LEN: usize = 16;

/// Stable identifier of a panel set, derived from its source text.
///
/// Trailing whitespace on each line and surrounding blank lines are ignored,
/// so reformatting that does not change the panels keeps the id.
pub fn panel_set_id(source: &str) -> String {
    let normalized = source
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    let mut hasher = Sha256::new();
    hasher.update(normalized.trim_matches('\n').as_bytes());
    let digest = hasher.finalize();

    let mut id = String::with_capacity(ID_LEN);
    for byte in digest.iter().take(ID_LEN / 2) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Overrides for a single panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStyle {
    /// Width as a percentage of the panel set (5-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
}

impl PanelStyle {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.background.is_none() && self.foreground.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSetLayout {
    /// Keyed by panel index
    #[serde(default)]
    pub panels: BTreeMap<String, PanelStyle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutOverrides {
    /// Keyed by panel-set id
    #[serde(default)]
    pub sets: BTreeMap<String, PanelSetLayout>,
}

impl LayoutOverrides {
    /// - macOS: ~/Library/Application Support/mdpanes/layout.toml
    /// - Linux: ~/.local/share/mdpanes/layout.toml
    /// - Windows: %APPDATA%/mdpanes/layout.toml
    pub fn layout_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("mdpanes").join("layout.toml"))
    }

    pub fn load() -> Self {
        Self::layout_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load overrides from a file, falling back to none
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| match toml::from_str(&contents) {
                Ok(layout) => Some(layout),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring malformed layout overrides");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::layout_path().ok_or("Could not determine data directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn style(&self, set: &str, panel: usize) -> Option<&PanelStyle> {
        self.sets.get(set)?.panels.get(&panel.to_string())
    }

    fn style_mut(&mut self, set: &str, panel: usize) -> &mut PanelStyle {
        self.sets
            .entry(set.to_string())
            .or_default()
            .panels
            .entry(panel.to_string())
            .or_default()
    }

    pub fn set_width(&mut self, set: &str, panel: usize, width: u16) {
        self.style_mut(set, panel).width = Some(width.clamp(5, 100));
    }

    pub fn set_colors(
        &mut self,
        set: &str,
        panel: usize,
        background: Option<String>,
        foreground: Option<String>,
    ) {
        let style = self.style_mut(set, panel);
        style.background = background;
        style.foreground = foreground;
        if style.is_empty() {
            self.clear(set, panel);
        }
    }

    /// Drop every override of one panel.
    pub fn clear(&mut self, set: &str, panel: usize) {
        if let Some(layout) = self.sets.get_mut(set) {
            layout.panels.remove(&panel.to_string());
            if layout.panels.is_empty() {
                self.sets.remove(set);
            }
        }
    }

    /// Drop every override of a panel set.
    pub fn forget(&mut self, set: &str) -> bool {
        self.sets.remove(set).is_some()
    }
}
