//! Keysym classification into host keystroke kinds.

/// Keysyms the classifier refers to by name.
pub mod keysyms {
    pub const BACKSPACE: u32 = 0xff08;
    pub const ESCAPE: u32 = 0xff1b;
    pub const DELETE: u32 = 0xffff;
    pub const ISO_LEFT_TAB: u32 = 0xfe20;
    pub const ISO_ENTER: u32 = 0xfe34;
    pub const HOME: u32 = 0xff50;
    pub const BEGIN: u32 = 0xff58;
    pub const KP_SPACE: u32 = 0xff80;
    pub const SHIFT_L: u32 = 0xffe1;
    pub const DEAD_GRAVE: u32 = 0xfe50;
    pub const DEAD_DOUBLEACUTE: u32 = 0xfe59;
    pub const DEAD_CARON: u32 = 0xfe5a;
    pub const DEAD_CEDILLA: u32 = 0xfe5b;
    pub const DEAD_OGONEK: u32 = 0xfe5c;
    pub const RETURN: u32 = 0xff0d;
    pub const F1: u32 = 0xffbe;
    pub const RIGHT: u32 = 0xff53;
    pub const DEAD_ABOVEDOT: u32 = 0xfe56;
    pub const DEAD_ABOVERING: u32 = 0xfe58;
    pub const CAPS_LOCK: u32 = 0xffe5;
}

/// Unicode keysyms live in this range; the low 24 bits are the code point.
const UNICODE_FIRST: u32 = 0x0100_0000;
const UNICODE_LAST: u32 = 0x0110_ffff;
const UNICODE_ASCII_END: u32 = 0x0100_0080;

/// Vendor-specific keysyms set bit 28.
const VENDOR_BIT: u32 = 1 << 28;

/// How a keysym reaches the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Printable ASCII character code.
    Ascii(u32),
    /// Unicode character beyond ASCII.
    Multibyte(u32),
    /// Function, cursor, keypad or dead key, carried as the raw keysym.
    NonAscii(u32),
    /// Modifier keys and anything else the host has no keystroke for.
    Ignored,
}

fn is_dead_key(k: u32) -> bool {
    matches!(
        k,
        0xfe50..=0xfe57
            | keysyms::DEAD_DOUBLEACUTE
            | keysyms::DEAD_CARON
            | keysyms::DEAD_CEDILLA
            | keysyms::DEAD_OGONEK
    )
}

pub fn classify_keysym(k: u32) -> KeyClass {
    if (32..128).contains(&k) {
        return KeyClass::Ascii(k);
    }

    if (UNICODE_FIRST..=UNICODE_LAST).contains(&k) {
        let code = k & 0x00ff_ffff;
        return if k < UNICODE_ASCII_END {
            KeyClass::Ascii(code)
        } else {
            KeyClass::Multibyte(code)
        };
    }

    let symbolic = (keysyms::BACKSPACE..=keysyms::ESCAPE).contains(&k)
        || k == keysyms::DELETE
        || (keysyms::ISO_LEFT_TAB..=keysyms::ISO_ENTER).contains(&k)
        || (keysyms::HOME..0xff60).contains(&k)
        || is_dead_key(k)
        || (keysyms::KP_SPACE..keysyms::SHIFT_L).contains(&k)
        || k & VENDOR_BIT != 0;

    if symbolic {
        KeyClass::NonAscii(k)
    } else {
        KeyClass::Ignored
    }
}
