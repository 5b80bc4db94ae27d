//! Unit tests for configuration module
//!
//! Tests parsing, validation, serialization and the mapping onto runtime
//! options.

use super::*;
use crate::logging::LogLevel;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = WlFrameConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.display.planes, 16);
    assert_eq!(config.frame.width, 80);
    assert_eq!(config.frame.height, 36);
    assert_eq!(config.frame.fonts.len(), 3);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let mut original_config = WlFrameConfig::default();
    original_config.display.name = Some("wayland-1".into());
    original_config.keyboard.meta = Some(ModifierSymbol::Super);
    original_config.keyboard.extra_modifiers = vec![ModifierSymbol::Hyper];

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: WlFrameConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config, deserialized_config);
    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("wlframe.toml");

    let test_config = r#"
[display]
name = "wayland-7"
planes = 24

[keyboard]
alt = "meta"
super = "hyper"
extra_modifiers = ["ctrl"]

[frame]
title = "scratch"
width = 100
height = 40
fonts = ["Iosevka-11"]

[logging]
level = "debug"
timestamps = false
filters = ["wlframe::display=trace"]
"#;

    fs::write(&file_path, test_config)?;

    let config = WlFrameConfig::load(&file_path)?;

    assert_eq!(config.display.name.as_deref(), Some("wayland-7"));
    assert_eq!(config.display.planes, 24);
    assert_eq!(config.keyboard.alt, Some(ModifierSymbol::Meta));
    assert_eq!(config.keyboard.super_, Some(ModifierSymbol::Hyper));
    assert_eq!(config.keyboard.extra_host_modifiers(), HostModifiers::CTRL);
    assert_eq!(config.frame.title, "scratch");
    assert_eq!(config.frame.fonts, vec!["Iosevka-11".to_string()]);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(!config.logging.timestamps);

    Ok(())
}

#[test]
fn test_partial_configuration_uses_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("partial.toml");

    fs::write(&file_path, "[frame]\nwidth = 120\n")?;

    let config = WlFrameConfig::load(&file_path)?;

    assert_eq!(config.frame.width, 120);
    assert_eq!(config.frame.height, 36);
    assert_eq!(config.frame.title, "wlframe");
    assert_eq!(config.display.planes, 16);
    assert_eq!(config.keyboard, KeyboardConfig::default());

    Ok(())
}

#[test]
fn test_malformed_toml_handling() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("malformed.toml");

    let malformed_config = r#"
[frame
width = "wide"
"#;

    fs::write(&file_path, malformed_config).unwrap();

    assert!(WlFrameConfig::load(&file_path).is_err());
}

#[test]
fn test_unknown_modifier_rejected() {
    let result: std::result::Result<WlFrameConfig, _> = toml::from_str("[keyboard]\nalt = \"shift\"\n");
    assert!(result.is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = WlFrameConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_configuration_validation() {
    let config = WlFrameConfig::default();

    let mut invalid = config.clone();
    invalid.display.planes = 0;
    assert!(invalid.validate().is_err());
    invalid.display.planes = 33;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.display.name = Some(String::new());
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.frame.height = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.frame.fonts.push("  ".into());
    assert!(invalid.validate().is_err());

    let mut invalid = config;
    invalid.logging.filters.push("verbose".into());
    assert!(invalid.validate().is_err());
}

#[test]
fn test_save_then_load() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = WlFrameConfig::default();
    config.frame.title = "saved".into();
    config.save(&file_path)?;

    assert_eq!(WlFrameConfig::load(&file_path)?, config);
    Ok(())
}

#[test]
fn test_registry_options_mirror_config() {
    let mut config = WlFrameConfig::default();
    config.display.planes = 8;
    config.frame.width = 132;
    config.frame.buffer_width = 320;

    let options = config.registry_options();
    assert_eq!(options.planes, 8);
    assert_eq!(options.default_cols, 132);
    assert_eq!(options.default_lines, 36);
    assert_eq!(options.buffer_size, (320, 480));
    assert_eq!(options.font_candidates, config.frame.fonts);
}

#[test]
fn test_keyboard_preferences() {
    let keyboard = KeyboardConfig {
        alt: Some(ModifierSymbol::Meta),
        extra_modifiers: vec![ModifierSymbol::Hyper, ModifierSymbol::Super],
        ..Default::default()
    };
    let prefs = keyboard.preferences();
    assert_eq!(prefs.alt_keysym, Some(ModifierSymbol::Meta));
    assert_eq!(prefs.meta_keysym, None);
    assert_eq!(
        keyboard.extra_host_modifiers(),
        HostModifiers::HYPER | HostModifiers::SUPER
    );
}

#[test]
fn test_tilde_expansion() -> Result<()> {
    let home = std::env::var("HOME")?;
    assert_eq!(expand_home(Path::new("~/x.toml"))?, Path::new(&home).join("x.toml"));
    assert_eq!(expand_home(Path::new("/etc/x.toml"))?, PathBuf::from("/etc/x.toml"));
    Ok(())
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_planes_bounds(planes in 0u32..64u32) {
            let mut config = WlFrameConfig::default();
            config.display.planes = planes;

            let result = config.validate();
            if (1..=32).contains(&planes) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn test_frame_size_roundtrip(width in 1u32..1000, height in 1u32..1000) {
            let mut config = WlFrameConfig::default();
            config.frame.width = width;
            config.frame.height = height;

            let text = toml::to_string(&config).unwrap();
            let back: WlFrameConfig = toml::from_str(&text).unwrap();
            prop_assert_eq!(back.frame.width, width);
            prop_assert_eq!(back.frame.height, height);
        }
    }
}
