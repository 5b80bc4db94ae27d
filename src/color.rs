//! Color name resolution.
//!
//! Numeric specs (`#rgb` forms, `rgb:` and `rgbi:`) are parsed directly;
//! anything else is looked up case-insensitively in a color map read from an
//! X11-style `rgb.txt`.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 16 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb16 {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Rgb16 {
    /// Packed 0xRRGGBB pixel from the high byte of each channel.
    pub fn pixel(&self) -> u32 {
        ((self.red as u32 >> 8) << 16) | ((self.green as u32 >> 8) << 8) | (self.blue as u32 >> 8)
    }
}

/// Scale a hex field of one to four digits to 16 bits.
fn scale_hex(field: &str) -> Option<u16> {
    if field.is_empty() || field.len() > 4 || !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(field, 16).ok()?;
    let max = (1u32 << (4 * field.len())) - 1;
    Some((value * 0xffff / max) as u16)
}

fn scale_intensity(field: &str) -> Option<u16> {
    let value: f64 = field.parse().ok()?;
    if !(0.0..=1.0).contains(&value) {
        return None;
    }
    Some((value * 65535.0).round() as u16)
}

/// Parse `#RGB`, `#RRGGBB`, `#RRRGGGBBB`, `#RRRRGGGGBBBB`, `rgb:R/G/B` and
/// `rgbi:R/G/B` color specs.
pub fn parse_color_spec(spec: &str) -> Option<Rgb16> {
    if let Some(hex) = spec.strip_prefix('#') {
        let n = hex.len();
        if n == 0 || n % 3 != 0 || n > 12 {
            return None;
        }
        let w = n / 3;
        return Some(Rgb16 {
            red: scale_hex(&hex[..w])?,
            green: scale_hex(&hex[w..2 * w])?,
            blue: scale_hex(&hex[2 * w..])?,
        });
    }

    let (rest, intensity) = if let Some(rest) = spec.strip_prefix("rgbi:") {
        (rest, true)
    } else if let Some(rest) = spec.strip_prefix("rgb:") {
        (rest, false)
    } else {
        return None;
    };
    let scale = |field: &str| {
        if intensity {
            scale_intensity(field)
        } else {
            scale_hex(field)
        }
    };

    let mut fields = rest.split('/');
    let rgb = Rgb16 {
        red: scale(fields.next()?)?,
        green: scale(fields.next()?)?,
        blue: scale(fields.next()?)?,
    };
    fields.next().is_none().then_some(rgb)
}

/// Named colors, keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    colors: HashMap<String, u32>,
}

impl ColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `rgb.txt` content: `R G B name` per line, `!` starts a comment.
    pub fn parse(contents: &str) -> Self {
        let mut colors = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let channels: Option<Vec<u32>> = (0..3)
                .map(|_| parts.next().and_then(|p| p.parse::<u32>().ok()).filter(|v| *v < 256))
                .collect();
            let Some(channels) = channels else {
                debug!("skipping color line '{}'", line);
                continue;
            };
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                continue;
            }
            let packed = (channels[0] << 16) | (channels[1] << 8) | channels[2];
            colors.insert(name.to_lowercase(), packed);
        }
        Self { colors }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read color file: {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    /// Load `path`, falling back to an empty map with a warning.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(map) => map,
            Err(e) => {
                warn!("🎨 {:#}; named colors unavailable", e);
                Self::new()
            }
        }
    }

    pub fn insert(&mut self, name: &str, r: u8, g: u8, b: u8) {
        self.colors
            .insert(name.to_lowercase(), ((r as u32) << 16) | ((g as u32) << 8) | b as u32);
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Rgb16> {
        let packed = *self.colors.get(&name.to_lowercase())?;
        let channel = |shift: u32| ((packed >> shift) & 0xff) as u16 * 257;
        Some(Rgb16 {
            red: channel(16),
            green: channel(8),
            blue: channel(0),
        })
    }

    /// Resolve a color spec or name.
    pub fn lookup(&self, name: &str) -> Option<Rgb16> {
        parse_color_spec(name).or_else(|| self.get(name))
    }
}
