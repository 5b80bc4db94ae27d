//! Configuration management for wlframe
//!
//! Settings are read from a TOML file. Every section and field has a
//! default, so an empty file (or none at all) is a valid configuration.

use crate::display::RegistryOptions;
use crate::keyboard::modifiers::{HostModifiers, ModifierPreferences, ModifierSymbol};
use crate::logging::LogConfig;
use crate::redisplay::DEFAULT_FONT_CANDIDATES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WlFrameConfig {
    /// Compositor connection settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Modifier key handling
    #[serde(default)]
    pub keyboard: KeyboardConfig,

    /// Defaults for new frames
    #[serde(default)]
    pub frame: FrameConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display to open when none is given; `None` uses `WAYLAND_DISPLAY`
    pub name: Option<String>,

    /// X11-style `rgb.txt` used for named colors
    pub color_file: Option<PathBuf>,

    /// Bit planes reported for every display
    pub planes: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            name: None,
            color_file: default_color_file(),
            planes: 16,
        }
    }
}

fn default_color_file() -> Option<PathBuf> {
    ["/usr/share/X11/rgb.txt", "/etc/X11/rgb.txt"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Host modifier produced by the Alt keys
    pub alt: Option<ModifierSymbol>,
    pub meta: Option<ModifierSymbol>,
    pub hyper: Option<ModifierSymbol>,
    #[serde(rename = "super")]
    pub super_: Option<ModifierSymbol>,

    /// Modifiers added to every key event
    pub extra_modifiers: Vec<ModifierSymbol>,
}

impl KeyboardConfig {
    pub fn preferences(&self) -> ModifierPreferences {
        ModifierPreferences {
            alt_keysym: self.alt,
            meta_keysym: self.meta,
            hyper_keysym: self.hyper,
            super_keysym: self.super_,
        }
    }

    pub fn extra_host_modifiers(&self) -> HostModifiers {
        self.extra_modifiers
            .iter()
            .fold(HostModifiers::NONE, |acc, m| acc | m.host_bit())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    /// Title used when a frame has neither a title nor a name
    pub title: String,

    /// Width in columns
    pub width: u32,

    /// Height in lines
    pub height: u32,

    /// Fonts tried in order when a frame names none
    pub fonts: Vec<String>,

    /// Size of the placeholder buffer attached to new surfaces
    pub buffer_width: i32,
    pub buffer_height: i32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            title: "wlframe".to_string(),
            width: 80,
            height: 36,
            fonts: DEFAULT_FONT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            buffer_width: 640,
            buffer_height: 480,
        }
    }
}

impl WlFrameConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: WlFrameConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.display.planes == 0 || self.display.planes > 32 {
            anyhow::bail!("Invalid planes: must be between 1 and 32");
        }

        if let Some(name) = &self.display.name {
            if name.is_empty() {
                anyhow::bail!("Invalid display name: must not be empty");
            }
        }

        if self.frame.width == 0 || self.frame.height == 0 {
            anyhow::bail!("Invalid frame size: width and height must be positive");
        }

        if self.frame.buffer_width <= 0 || self.frame.buffer_height <= 0 {
            anyhow::bail!("Invalid buffer size: must be positive");
        }

        if self.frame.fonts.iter().any(|f| f.trim().is_empty()) {
            anyhow::bail!("Invalid font list: entries must not be empty");
        }

        for filter in &self.logging.filters {
            if !filter.contains('=') {
                anyhow::bail!("Invalid log filter '{}': expected target=level", filter);
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Options for a [`crate::display::ConnectionRegistry`].
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            buffer_size: (self.frame.buffer_width, self.frame.buffer_height),
            planes: self.display.planes,
            color_file: self.display.color_file.clone(),
            default_title: self.frame.title.clone(),
            default_cols: self.frame.width,
            default_lines: self.frame.height,
            font_candidates: self.frame.fonts.clone(),
        }
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests;
