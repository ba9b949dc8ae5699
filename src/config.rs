use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub embeds: EmbedConfig,

    #[serde(default)]
    pub editing: EditingConfig,
}

/// Save-back behaviour of embedded section editors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Debounce window for writing edits back to the host document, in
    /// milliseconds (default: 750)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    750
}

/// Which resolved documents can be opened as editable section embeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// File extensions (without dot, case-insensitive) treated as editable
    /// markdown documents (default: ["md"])
    #[serde(default = "default_editable_extensions")]
    pub editable_extensions: Vec<String>,
}

impl EmbedConfig {
    pub fn is_editable(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| {
            self.editable_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            editable_extensions: default_editable_extensions(),
        }
    }
}

fn default_editable_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

/// Line editing commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditingConfig {
    /// Text inserted by indent (default: a tab)
    #[serde(default = "default_indent")]
    pub indent: String,

    /// Spaces removed by unindent on space-indented lines (default: 4)
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            indent_width: default_indent_width(),
        }
    }
}

fn default_indent() -> String {
    "\t".to_string()
}

fn default_indent_width() -> usize {
    4
}

impl Config {
    /// Get the platform-specific config file path
    /// - macOS: ~/Library/Application Support/mdpanes/config.toml
    /// - Linux: ~/.config/mdpanes/config.toml
    /// - Windows: %APPDATA%/mdpanes/config.toml
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mdpanes").join("config.toml"))
    }

    /// Load config from the default location, or return defaults if the file
    /// doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load config from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| match toml::from_str(&contents) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("Could not determine config directory")?;
        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }
}
