//! Virtual-key codes and the process-wide name tables
//!
//! Codes follow the Win32 virtual-key table. Names are the table's
//! identifiers without the `VK_` prefix, plus a few friendly aliases
//! accepted in configuration files (`LAlt`, `LShift`, `LCtrl`, ...).

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// One physical key, identified by its OS virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualKey(pub u32);

impl VirtualKey {
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const MENU: Self = Self(0x12);
    #[cfg(test)]
    pub const KEY_1: Self = Self(0x31);
    #[cfg(test)]
    pub const KEY_2: Self = Self(0x32);
    #[cfg(test)]
    pub const KEY_N: Self = Self(0x4E);
    pub const LWIN: Self = Self(0x5B);
    pub const RWIN: Self = Self(0x5C);
    pub const LSHIFT: Self = Self(0xA0);
    pub const RSHIFT: Self = Self(0xA1);
    pub const LCONTROL: Self = Self(0xA2);
    pub const RCONTROL: Self = Self(0xA3);
    pub const LMENU: Self = Self(0xA4);
    pub const RMENU: Self = Self(0xA5);

    /// Raw code as delivered by the capture source
    pub fn code(self) -> u32 {
        self.0
    }

    /// `SHIFT`, `CONTROL` or `MENU`. The low-level hook always reports the
    /// left or right variant instead, so these never appear as held.
    pub fn is_sideless_modifier(self) -> bool {
        matches!(self, Self::SHIFT | Self::CONTROL | Self::MENU)
    }

    /// Shift, Ctrl, Alt or Win, either side or the side-less variant.
    ///
    /// Only used to order keys for display, never for matching.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::SHIFT
                | Self::CONTROL
                | Self::MENU
                | Self::LSHIFT
                | Self::RSHIFT
                | Self::LCONTROL
                | Self::RCONTROL
                | Self::LMENU
                | Self::RMENU
                | Self::LWIN
                | Self::RWIN
        )
    }

    /// Canonical table name (`LMENU`, `1`, `F5`), if the code is known
    pub fn name(self) -> Option<&'static str> {
        CODE_TO_NAME.get(&self).copied()
    }

    /// Look up a key by table name or configuration alias, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        NAME_TO_CODE.get(name.trim().to_ascii_uppercase().as_str()).copied()
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#04x}", self.code()),
        }
    }
}

impl From<u32> for VirtualKey {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

/// Win32 virtual-key table. Where two names share a code, the first one is
/// the canonical display name.
const KEY_TABLE: &[(&str, u32)] = &[
    ("LBUTTON", 0x01),
    ("RBUTTON", 0x02),
    ("CANCEL", 0x03),
    ("MBUTTON", 0x04),
    ("XBUTTON1", 0x05),
    ("XBUTTON2", 0x06),
    ("BACK", 0x08),
    ("TAB", 0x09),
    ("CLEAR", 0x0C),
    ("RETURN", 0x0D),
    ("SHIFT", 0x10),
    ("CONTROL", 0x11),
    ("MENU", 0x12),
    ("PAUSE", 0x13),
    ("CAPITAL", 0x14),
    ("KANA", 0x15),
    ("HANGUL", 0x15),
    ("IME_ON", 0x16),
    ("JUNJA", 0x17),
    ("FINAL", 0x18),
    ("HANJA", 0x19),
    ("KANJI", 0x19),
    ("IME_OFF", 0x1A),
    ("ESCAPE", 0x1B),
    ("CONVERT", 0x1C),
    ("NONCONVERT", 0x1D),
    ("ACCEPT", 0x1E),
    ("MODECHANGE", 0x1F),
    ("SPACE", 0x20),
    ("PRIOR", 0x21),
    ("NEXT", 0x22),
    ("END", 0x23),
    ("HOME", 0x24),
    ("LEFT", 0x25),
    ("UP", 0x26),
    ("RIGHT", 0x27),
    ("DOWN", 0x28),
    ("SELECT", 0x29),
    ("PRINT", 0x2A),
    ("EXECUTE", 0x2B),
    ("SNAPSHOT", 0x2C),
    ("INSERT", 0x2D),
    ("DELETE", 0x2E),
    ("HELP", 0x2F),
    ("0", 0x30),
    ("1", 0x31),
    ("2", 0x32),
    ("3", 0x33),
    ("4", 0x34),
    ("5", 0x35),
    ("6", 0x36),
    ("7", 0x37),
    ("8", 0x38),
    ("9", 0x39),
    ("A", 0x41),
    ("B", 0x42),
    ("C", 0x43),
    ("D", 0x44),
    ("E", 0x45),
    ("F", 0x46),
    ("G", 0x47),
    ("H", 0x48),
    ("I", 0x49),
    ("J", 0x4A),
    ("K", 0x4B),
    ("L", 0x4C),
    ("M", 0x4D),
    ("N", 0x4E),
    ("O", 0x4F),
    ("P", 0x50),
    ("Q", 0x51),
    ("R", 0x52),
    ("S", 0x53),
    ("T", 0x54),
    ("U", 0x55),
    ("V", 0x56),
    ("W", 0x57),
    ("X", 0x58),
    ("Y", 0x59),
    ("Z", 0x5A),
    ("LWIN", 0x5B),
    ("RWIN", 0x5C),
    ("APPS", 0x5D),
    ("SLEEP", 0x5F),
    ("NUMPAD0", 0x60),
    ("NUMPAD1", 0x61),
    ("NUMPAD2", 0x62),
    ("NUMPAD3", 0x63),
    ("NUMPAD4", 0x64),
    ("NUMPAD5", 0x65),
    ("NUMPAD6", 0x66),
    ("NUMPAD7", 0x67),
    ("NUMPAD8", 0x68),
    ("NUMPAD9", 0x69),
    ("MULTIPLY", 0x6A),
    ("ADD", 0x6B),
    ("SEPARATOR", 0x6C),
    ("SUBTRACT", 0x6D),
    ("DECIMAL", 0x6E),
    ("DIVIDE", 0x6F),
    ("F1", 0x70),
    ("F2", 0x71),
    ("F3", 0x72),
    ("F4", 0x73),
    ("F5", 0x74),
    ("F6", 0x75),
    ("F7", 0x76),
    ("F8", 0x77),
    ("F9", 0x78),
    ("F10", 0x79),
    ("F11", 0x7A),
    ("F12", 0x7B),
    ("F13", 0x7C),
    ("F14", 0x7D),
    ("F15", 0x7E),
    ("F16", 0x7F),
    ("F17", 0x80),
    ("F18", 0x81),
    ("F19", 0x82),
    ("F20", 0x83),
    ("F21", 0x84),
    ("F22", 0x85),
    ("F23", 0x86),
    ("F24", 0x87),
    ("NUMLOCK", 0x90),
    ("SCROLL", 0x91),
    ("LSHIFT", 0xA0),
    ("RSHIFT", 0xA1),
    ("LCONTROL", 0xA2),
    ("RCONTROL", 0xA3),
    ("LMENU", 0xA4),
    ("RMENU", 0xA5),
    ("BROWSER_BACK", 0xA6),
    ("BROWSER_FORWARD", 0xA7),
    ("BROWSER_REFRESH", 0xA8),
    ("BROWSER_STOP", 0xA9),
    ("BROWSER_SEARCH", 0xAA),
    ("BROWSER_FAVORITES", 0xAB),
    ("BROWSER_HOME", 0xAC),
    ("VOLUME_MUTE", 0xAD),
    ("VOLUME_DOWN", 0xAE),
    ("VOLUME_UP", 0xAF),
    ("MEDIA_NEXT_TRACK", 0xB0),
    ("MEDIA_PREV_TRACK", 0xB1),
    ("MEDIA_STOP", 0xB2),
    ("MEDIA_PLAY_PAUSE", 0xB3),
    ("LAUNCH_MAIL", 0xB4),
    ("LAUNCH_MEDIA_SELECT", 0xB5),
    ("LAUNCH_APP1", 0xB6),
    ("LAUNCH_APP2", 0xB7),
    ("OEM_1", 0xBA),
    ("OEM_PLUS", 0xBB),
    ("OEM_COMMA", 0xBC),
    ("OEM_MINUS", 0xBD),
    ("OEM_PERIOD", 0xBE),
    ("OEM_2", 0xBF),
    ("OEM_3", 0xC0),
    ("OEM_4", 0xDB),
    ("OEM_5", 0xDC),
    ("OEM_6", 0xDD),
    ("OEM_7", 0xDE),
    ("OEM_8", 0xDF),
    ("OEM_102", 0xE2),
    ("PROCESSKEY", 0xE5),
    ("PACKET", 0xE7),
    ("ATTN", 0xF6),
    ("CRSEL", 0xF7),
    ("EXSEL", 0xF8),
    ("EREOF", 0xF9),
    ("PLAY", 0xFA),
    ("ZOOM", 0xFB),
    ("NONAME", 0xFC),
    ("PA1", 0xFD),
    ("OEM_CLEAR", 0xFE),
];

/// Friendly names accepted in configuration, stored upper-case
const ALIASES: &[(&str, u32)] = &[
    ("ALT", 0x12),
    ("CTRL", 0x11),
    ("LALT", 0xA4),
    ("RALT", 0xA5),
    ("LCTRL", 0xA2),
    ("RCTRL", 0xA3),
    ("ENTER", 0x0D),
    ("ESC", 0x1B),
];

static NAME_TO_CODE: LazyLock<HashMap<&'static str, VirtualKey>> = LazyLock::new(|| {
    KEY_TABLE
        .iter()
        .chain(ALIASES)
        .map(|&(name, code)| (name, VirtualKey(code)))
        .collect()
});

static CODE_TO_NAME: LazyLock<HashMap<VirtualKey, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(KEY_TABLE.len());
    for &(name, code) in KEY_TABLE {
        map.entry(VirtualKey(code)).or_insert(name);
    }
    map
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(VirtualKey::from_name("lmenu"), Some(VirtualKey::LMENU));
        assert_eq!(VirtualKey::from_name("LAlt"), Some(VirtualKey::LMENU));
        assert_eq!(VirtualKey::from_name("lshift"), Some(VirtualKey::LSHIFT));
        assert_eq!(VirtualKey::from_name(" 1 "), Some(VirtualKey::KEY_1));
        assert_eq!(VirtualKey::from_name("Hyper"), None);
    }

    #[test]
    fn test_shared_codes_display_first_name() {
        assert_eq!(VirtualKey(0x15).to_string(), "KANA");
        assert_eq!(VirtualKey::from_name("HANGUL"), Some(VirtualKey(0x15)));
    }

    #[test]
    fn test_display_unknown_code() {
        assert_eq!(VirtualKey(0xE8).to_string(), "0xe8");
        assert_eq!(VirtualKey::LWIN.to_string(), "LWIN");
    }

    #[test]
    fn test_modifier_classification() {
        assert!(VirtualKey::LMENU.is_modifier());
        assert!(VirtualKey::RWIN.is_modifier());
        assert!(VirtualKey::SHIFT.is_modifier());
        assert!(!VirtualKey::KEY_1.is_modifier());
        assert!(!VirtualKey(0x14).is_modifier());

        assert!(VirtualKey::MENU.is_sideless_modifier());
        assert_eq!(VirtualKey::from_name("Ctrl"), Some(VirtualKey::CONTROL));
        assert!(VirtualKey::from_name("ctrl").unwrap().is_sideless_modifier());
        assert!(!VirtualKey::LMENU.is_sideless_modifier());
        assert!(!VirtualKey::RWIN.is_sideless_modifier());
    }

    #[test]
    fn test_every_table_name_round_trips() {
        for &(name, code) in KEY_TABLE {
            assert_eq!(VirtualKey::from_name(name), Some(VirtualKey(code)), "{name}");
        }
    }
}
