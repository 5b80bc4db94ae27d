//! Boundary between the bridge and the host application.
//!
//! The host owns the event loop, the selected frame and the user-visible
//! keyboard preferences. Everything the bridge needs from it goes through the
//! [`Host`] trait so that listener callbacks, which run inside protocol
//! dispatch, never reach into host internals directly.

use crate::keyboard::modifiers::{HostModifiers, ModifierPreferences};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identifier of a frame realized on this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Identifier of a display connection inside a [`ConnectionRegistry`](crate::display::ConnectionRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Keyboard group shared by terminals on the same logical server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KboardId(pub u64);

/// Window-system kind a terminal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Wayland,
    Other(&'static str),
}

/// A terminal handle as the host passes it around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalHandle {
    pub id: u64,
    pub kind: BackendKind,
}

/// Font resolved by the host for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    pub name: String,
    pub average_width: u32,
    pub line_height: u32,
}

/// Services the host application provides to the bridge.
pub trait Host: Send + Sync {
    /// Name of this machine, used when comparing display names.
    fn system_name(&self) -> String;

    /// The frame currently selected by the host, if any.
    fn selected_frame(&self) -> Option<FrameId>;

    /// Modifiers the user asked to add to every keystroke.
    fn extra_keyboard_modifiers(&self) -> HostModifiers;

    /// Which host modifier the alt/meta/hyper/super key families produce.
    fn modifier_preferences(&self) -> ModifierPreferences;

    /// Add a descriptor to the set the host waits on.
    fn add_wait_descriptor(&self, fd: RawFd);

    fn remove_wait_descriptor(&self, fd: RawFd);

    /// Wake a blocked wait loop because input was queued.
    fn notify_input_pending(&self);

    /// Open a font by name for a frame; `None` when the name does not resolve.
    fn open_font(&self, frame: FrameId, name: &str) -> Option<FontInfo>;
}

/// Minimal host used by the command line driver and the tests.
#[derive(Debug, Default)]
pub struct StandaloneHost {
    system_name: String,
    selected: RwLock<Option<FrameId>>,
    extra_modifiers: RwLock<HostModifiers>,
    preferences: RwLock<ModifierPreferences>,
    wait_set: RwLock<BTreeSet<RawFd>>,
    wakeups: AtomicUsize,
    fonts: RwLock<Option<Vec<String>>>,
}

impl StandaloneHost {
    pub fn new() -> Self {
        Self {
            system_name: local_system_name(),
            ..Default::default()
        }
    }

    pub fn with_system_name(name: &str) -> Self {
        Self {
            system_name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn select_frame(&self, frame: Option<FrameId>) {
        *self.selected.write() = frame;
    }

    pub fn set_extra_keyboard_modifiers(&self, mods: HostModifiers) {
        *self.extra_modifiers.write() = mods;
    }

    pub fn set_modifier_preferences(&self, prefs: ModifierPreferences) {
        *self.preferences.write() = prefs;
    }

    /// Restrict the fonts `open_font` accepts. `None` accepts any name.
    pub fn set_available_fonts(&self, fonts: Option<Vec<String>>) {
        *self.fonts.write() = fonts;
    }

    pub fn wait_descriptors(&self) -> Vec<RawFd> {
        self.wait_set.read().iter().copied().collect()
    }

    /// Number of input-pending notifications received so far.
    pub fn wakeup_count(&self) -> usize {
        self.wakeups.load(Ordering::Relaxed)
    }
}

impl Host for StandaloneHost {
    fn system_name(&self) -> String {
        self.system_name.clone()
    }

    fn selected_frame(&self) -> Option<FrameId> {
        *self.selected.read()
    }

    fn extra_keyboard_modifiers(&self) -> HostModifiers {
        *self.extra_modifiers.read()
    }

    fn modifier_preferences(&self) -> ModifierPreferences {
        *self.preferences.read()
    }

    fn add_wait_descriptor(&self, fd: RawFd) {
        self.wait_set.write().insert(fd);
    }

    fn remove_wait_descriptor(&self, fd: RawFd) {
        self.wait_set.write().remove(&fd);
    }

    fn notify_input_pending(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    fn open_font(&self, _frame: FrameId, name: &str) -> Option<FontInfo> {
        if name.trim().is_empty() {
            return None;
        }
        if let Some(fonts) = self.fonts.read().as_ref() {
            if !fonts.iter().any(|f| f == name) {
                return None;
            }
        }
        // Size suffix "Family-12" drives the nominal cell metrics.
        let size = name
            .rsplit_once('-')
            .and_then(|(_, s)| s.parse::<u32>().ok())
            .unwrap_or(12);
        Some(FontInfo {
            name: name.to_string(),
            average_width: (size * 2 + 2) / 3,
            line_height: size + size / 3 + 1,
        })
    }
}

/// Host name of this machine as reported by `gethostname(2)`.
pub fn local_system_name() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return String::new();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
