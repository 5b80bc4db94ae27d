//! Modifier masks and the host/protocol modifier mapping.
//!
//! The compositor reports modifiers as an xkb modifier bitmask whose bit
//! positions depend on the active keymap. The host uses a fixed set of
//! modifier bits. [`ModifierMasks`] records, per keymap, which xkb bit serves
//! each role, and the two translation functions remap between the spaces.

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Host modifier bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HostModifiers(u32);

impl HostModifiers {
    pub const NONE: HostModifiers = HostModifiers(0);
    pub const ALT: HostModifiers = HostModifiers(0x0040_0000);
    pub const SUPER: HostModifiers = HostModifiers(0x0080_0000);
    pub const HYPER: HostModifiers = HostModifiers(0x0100_0000);
    pub const SHIFT: HostModifiers = HostModifiers(0x0200_0000);
    pub const CTRL: HostModifiers = HostModifiers(0x0400_0000);
    pub const META: HostModifiers = HostModifiers(0x0800_0000);
    /// Host "down" bit carried by mouse button presses.
    pub const DOWN: HostModifiers = HostModifiers(0x0000_0002);
    /// Host "up" bit carried by mouse button releases.
    pub const UP: HostModifiers = HostModifiers(0x0000_0001);

    pub const fn from_bits(bits: u32) -> Self {
        HostModifiers(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: HostModifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: HostModifiers) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for HostModifiers {
    type Output = HostModifiers;
    fn bitor(self, rhs: Self) -> Self {
        HostModifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for HostModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for HostModifiers {
    type Output = HostModifiers;
    fn bitand(self, rhs: Self) -> Self {
        HostModifiers(self.0 & rhs.0)
    }
}

/// Host modifier a key family can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierSymbol {
    Alt,
    Hyper,
    Meta,
    Super,
    Ctrl,
}

impl ModifierSymbol {
    pub fn host_bit(self) -> HostModifiers {
        match self {
            ModifierSymbol::Alt => HostModifiers::ALT,
            ModifierSymbol::Hyper => HostModifiers::HYPER,
            ModifierSymbol::Meta => HostModifiers::META,
            ModifierSymbol::Super => HostModifiers::SUPER,
            ModifierSymbol::Ctrl => HostModifiers::CTRL,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "alt" => Some(ModifierSymbol::Alt),
            "hyper" => Some(ModifierSymbol::Hyper),
            "meta" => Some(ModifierSymbol::Meta),
            "super" => Some(ModifierSymbol::Super),
            "ctrl" | "control" => Some(ModifierSymbol::Ctrl),
            _ => None,
        }
    }
}

/// User overrides for the alt/meta/hyper/super key families.
///
/// `None` means the family produces its own host modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierPreferences {
    pub alt_keysym: Option<ModifierSymbol>,
    pub meta_keysym: Option<ModifierSymbol>,
    pub hyper_keysym: Option<ModifierSymbol>,
    pub super_keysym: Option<ModifierSymbol>,
}

impl ModifierPreferences {
    fn alt(&self) -> HostModifiers {
        self.alt_keysym.map_or(HostModifiers::ALT, ModifierSymbol::host_bit)
    }

    fn meta(&self) -> HostModifiers {
        self.meta_keysym.map_or(HostModifiers::META, ModifierSymbol::host_bit)
    }

    fn hyper(&self) -> HostModifiers {
        self.hyper_keysym.map_or(HostModifiers::HYPER, ModifierSymbol::host_bit)
    }

    fn super_(&self) -> HostModifiers {
        self.super_keysym.map_or(HostModifiers::SUPER, ModifierSymbol::host_bit)
    }
}

/// Per-keymap xkb bit assigned to each modifier role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierMasks {
    pub control: u32,
    pub alt: u32,
    pub meta: u32,
    pub shift: u32,
    pub shift_lock: u32,
    pub super_: u32,
    pub hyper: u32,
}

impl ModifierMasks {
    /// Build the masks from a modifier-name lookup on the compiled keymap.
    ///
    /// `lookup` returns the xkb modifier index of a named modifier, or `None`
    /// when the keymap does not define it. If no key produces Meta, the Mod1
    /// (alt) mapping serves as Meta; bits claimed by both Alt and Meta stay
    /// Meta only.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<u32>) -> Self {
        let mask = |name: &str| match lookup(name) {
            Some(index) if index < 32 => 1u32 << index,
            _ => 0,
        };

        let mut masks = ModifierMasks {
            control: mask("Control"),
            alt: mask("Mod1"),
            meta: mask("Meta"),
            shift: mask("Shift"),
            shift_lock: mask("Lock"),
            super_: mask("Super"),
            hyper: mask("Hyper"),
        };

        if masks.meta == 0 {
            masks.meta = masks.alt;
            masks.alt = 0;
        }
        if masks.alt & masks.meta != 0 {
            masks.alt &= !masks.meta;
        }

        masks
    }
}

/// Convert an xkb modifier state into host modifier bits.
pub fn to_host_modifiers(
    masks: &ModifierMasks,
    prefs: &ModifierPreferences,
    state: u32,
) -> HostModifiers {
    let mut out = HostModifiers::NONE;
    if state & (masks.shift | masks.shift_lock) != 0 {
        out |= HostModifiers::SHIFT;
    }
    if state & masks.control != 0 {
        out |= HostModifiers::CTRL;
    }
    if state & masks.meta != 0 {
        out |= prefs.meta();
    }
    if state & masks.alt != 0 {
        out |= prefs.alt();
    }
    if state & masks.super_ != 0 {
        out |= prefs.super_();
    }
    if state & masks.hyper != 0 {
        out |= prefs.hyper();
    }
    out
}

/// Convert host modifier bits into an xkb modifier state.
pub fn to_protocol_modifiers(
    masks: &ModifierMasks,
    prefs: &ModifierPreferences,
    mods: HostModifiers,
) -> u32 {
    let mut out = 0;
    if mods.intersects(prefs.alt()) {
        out |= masks.alt;
    }
    if mods.intersects(prefs.super_()) {
        out |= masks.super_;
    }
    if mods.intersects(prefs.hyper()) {
        out |= masks.hyper;
    }
    if mods.intersects(HostModifiers::SHIFT) {
        out |= masks.shift;
    }
    if mods.intersects(HostModifiers::CTRL) {
        out |= masks.control;
    }
    if mods.intersects(prefs.meta()) {
        out |= masks.meta;
    }
    out
}
