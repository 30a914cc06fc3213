//! Normalized key symbols and the event normalization contract.
//!
//! Raw OS key events are reduced to a `Symbol`: either a short printable
//! string or one of a fixed set of named control keys. Anything else is
//! dropped before it leaves the capture layer.

use std::fmt;

/// Named control keys that are kept as symbols instead of their raw
/// control characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Space,
    Enter,
    Tab,
    Backspace,
    Escape,
    ForwardDelete,
}

impl ControlKey {
    /// Display glyph used as the symbol text in counter keys.
    pub fn glyph(self) -> &'static str {
        match self {
            ControlKey::Space => "␣",
            ControlKey::Enter => "↵",
            ControlKey::Tab => "⇥",
            ControlKey::Backspace => "⌫",
            ControlKey::Escape => "⎋",
            ControlKey::ForwardDelete => "⌦",
        }
    }
}

/// A normalized unit of keyboard input.
///
/// Privacy contract: a symbol is at most one decoded keystroke; the capture
/// layer never batches or buffers raw text beyond this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// Printable text decoded from the event (typically one character,
    /// up to 4 UTF-16 code units for composed input).
    Printable(String),
    /// One of the named control keys.
    Control(ControlKey),
}

impl Symbol {
    /// Text form used when building n-gram keys.
    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Printable(s) => s,
            Symbol::Control(k) => k.glyph(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First numeric value considered printable; scalars below this that are not
/// in the named control table are discarded.
const PRINTABLE_THRESHOLD: u32 = 32;

/// Normalize a raw key event into a `Symbol`.
///
/// `control` is the result of the platform's fixed keycode table lookup and
/// overrides any decoded text. Otherwise `decoded` (up to 4 UTF-16 units of
/// text from the OS) is kept only if it is non-empty and its first scalar is
/// printable. Returns `None` for events that must be dropped.
pub fn normalize_key_event(control: Option<ControlKey>, decoded: &str) -> Option<Symbol> {
    if let Some(key) = control {
        return Some(Symbol::Control(key));
    }

    let first = decoded.chars().next()?;
    if (first as u32) < PRINTABLE_THRESHOLD {
        return None;
    }

    Some(Symbol::Printable(decoded.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_character_kept() {
        let sym = normalize_key_event(None, "a").unwrap();
        assert_eq!(sym, Symbol::Printable("a".to_string()));
        assert_eq!(sym.as_str(), "a");
    }

    #[test]
    fn test_control_table_overrides_decoded_text() {
        let sym = normalize_key_event(Some(ControlKey::Space), " ").unwrap();
        assert_eq!(sym, Symbol::Control(ControlKey::Space));
        assert_eq!(sym.as_str(), "␣");
    }

    #[test]
    fn test_empty_decode_dropped() {
        assert_eq!(normalize_key_event(None, ""), None);
    }

    #[test]
    fn test_unnamed_control_range_dropped() {
        // A raw escape or backspace without a table match is below the
        // printable threshold and must not become a symbol.
        assert_eq!(normalize_key_event(None, "\u{1b}"), None);
        assert_eq!(normalize_key_event(None, "\u{08}"), None);
        assert_eq!(normalize_key_event(None, "\u{01}"), None);
    }

    #[test]
    fn test_multi_unit_text_kept() {
        let sym = normalize_key_event(None, "é").unwrap();
        assert_eq!(sym.as_str(), "é");
    }

    #[test]
    fn test_control_glyphs_distinct() {
        let keys = [
            ControlKey::Space,
            ControlKey::Enter,
            ControlKey::Tab,
            ControlKey::Backspace,
            ControlKey::Escape,
            ControlKey::ForwardDelete,
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a.glyph(), b.glyph());
            }
        }
    }
}
