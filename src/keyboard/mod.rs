//! Keymap handling for `wl_keyboard`.
//!
//! The compositor ships its keymap as an fd; [`KeyboardTranslator`] compiles
//! it with xkbcommon, tracks the live modifier state and turns key presses
//! into host keystroke events.

pub mod keysym;
pub mod modifiers;

use crate::error::{BridgeError, BridgeResult};
use crate::event_queue::EventKind;
use keysym::{classify_keysym, KeyClass};
use log::{debug, info, warn};
use memmap2::MmapOptions;
use modifiers::{to_host_modifiers, to_protocol_modifiers, HostModifiers, ModifierMasks, ModifierPreferences};
use std::fs::File;
use std::os::fd::OwnedFd;
use xkbcommon::xkb;

/// Offset between evdev scancodes and xkb keycodes.
const EVDEV_OFFSET: u32 = 8;

/// Key repeat parameters announced by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInfo {
    /// Keys per second; zero disables repeat.
    pub rate: i32,
    /// Delay in milliseconds before repeating starts.
    pub delay: i32,
}

/// A translated key press.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub kind: EventKind,
    pub modifiers: HostModifiers,
    pub keysym: u32,
}

/// Compiled keymap, live state and the derived modifier masks.
pub struct KeyboardTranslator {
    context: xkb::Context,
    keymap: Option<xkb::Keymap>,
    state: Option<xkb::State>,
    masks: ModifierMasks,
    repeat: Option<RepeatInfo>,
}

impl std::fmt::Debug for KeyboardTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardTranslator")
            .field("has_keymap", &self.keymap.is_some())
            .field("masks", &self.masks)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl Default for KeyboardTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardTranslator {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            keymap: None,
            state: None,
            masks: ModifierMasks::default(),
            repeat: None,
        }
    }

    pub fn has_keymap(&self) -> bool {
        self.state.is_some()
    }

    pub fn masks(&self) -> &ModifierMasks {
        &self.masks
    }

    pub fn repeat_info(&self) -> Option<RepeatInfo> {
        self.repeat
    }

    pub fn set_repeat_info(&mut self, rate: i32, delay: i32) {
        debug!("keyboard repeat: rate={} delay={}ms", rate, delay);
        self.repeat = Some(RepeatInfo { rate, delay });
    }

    /// Compile the keymap delivered over `fd`.
    ///
    /// Newer seats send the fd read-only and require a private mapping.
    pub fn load_keymap_fd(&mut self, fd: OwnedFd, size: u32) -> BridgeResult<()> {
        let file = File::from(fd);
        let map = unsafe {
            MmapOptions::new()
                .len(size as usize)
                .map_copy_read_only(&file)?
        };
        let text = String::from_utf8_lossy(&map);
        let text = text.trim_end_matches('\0').to_string();
        drop(map);
        self.load_keymap_str(text)
    }

    /// Compile an xkb text keymap and replace the current keymap and state.
    pub fn load_keymap_str(&mut self, text: String) -> BridgeResult<()> {
        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text,
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| BridgeError::Protocol("failed to compile keymap".into()))?;
        self.install(keymap);
        Ok(())
    }

    /// Compile a keymap from RMLVO names (empty strings pick the defaults).
    pub fn load_keymap_names(&mut self, layout: &str, variant: &str) -> BridgeResult<()> {
        let keymap = xkb::Keymap::new_from_names(
            &self.context,
            "",
            "",
            layout,
            variant,
            None,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| BridgeError::Protocol(format!("no keymap for layout '{}'", layout)))?;
        self.install(keymap);
        Ok(())
    }

    fn install(&mut self, keymap: xkb::Keymap) {
        let state = xkb::State::new(&keymap);
        self.masks = ModifierMasks::from_lookup(|name| {
            let index = keymap.mod_get_index(name);
            (index != xkb::MOD_INVALID).then_some(index)
        });
        info!("⌨️ keymap installed, modifier masks {:?}", self.masks);
        self.keymap = Some(keymap);
        self.state = Some(state);
    }

    /// Apply a `wl_keyboard.modifiers` update.
    pub fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        match self.state.as_mut() {
            Some(state) => {
                state.update_mask(depressed, latched, locked, 0, 0, group);
            }
            None => warn!("modifiers event before any keymap"),
        }
    }

    /// Currently held modifiers in host bits, used for pointer events.
    pub fn host_modifiers(&self, prefs: &ModifierPreferences) -> HostModifiers {
        match self.state.as_ref() {
            Some(state) => {
                let wire =
                    state.serialize_mods(xkb::STATE_MODS_DEPRESSED | xkb::STATE_MODS_LATCHED);
                to_host_modifiers(&self.masks, prefs, wire)
            }
            None => HostModifiers::NONE,
        }
    }

    /// Translate a pressed evdev key into a host keystroke.
    ///
    /// Returns `None` when no keymap is loaded, the code has no xkb keycode,
    /// or the keysym has no host keystroke (modifier keys, for instance).
    pub fn key_press(
        &self,
        key: u32,
        prefs: &ModifierPreferences,
        extra: HostModifiers,
    ) -> Option<KeyPress> {
        let state = self.state.as_ref()?;
        let keycode = key.checked_add(EVDEV_OFFSET)?;
        let keysym = state.key_get_one_sym(xkb::Keycode::new(keycode)).raw();

        let mut wire = state.serialize_mods(xkb::STATE_MODS_DEPRESSED | xkb::STATE_MODS_LATCHED);
        wire |= to_protocol_modifiers(&self.masks, prefs, extra);
        let modifiers = to_host_modifiers(&self.masks, prefs, wire);

        let kind = match classify_keysym(keysym) {
            KeyClass::Ascii(code) => EventKind::AsciiKeystroke { code },
            KeyClass::Multibyte(code) => EventKind::MultibyteKeystroke { code },
            KeyClass::NonAscii(keysym) => EventKind::NonAsciiKeystroke { keysym },
            KeyClass::Ignored => return None,
        };
        Some(KeyPress {
            kind,
            modifiers,
            keysym,
        })
    }
}

/// Name of a keysym, or an empty string when xkbcommon has none.
pub fn keysym_name(keysym: u32) -> String {
    // xkbcommon rejects values outside the 29-bit keysym space
    if keysym == 0 || keysym > 0x1fff_ffff {
        return String::new();
    }
    xkb::keysym_get_name(xkb::Keysym::new(keysym))
}
