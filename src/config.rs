//! Ambient configuration: window scale, key bindings, palette choice.
//!
//! Not part of the emulated hardware — grounded on the `gb_rs` teacher
//! crate's existing `serde`/`serde_json` dependency and on
//! `sandlbn-Phosphor`'s `Config::load`/`save` pattern (defaults when the file
//! is missing or unparseable, rather than a hard error), adapted to use
//! `serde_json` directly instead of hand-rolled parsing since this crate
//! already carries that dependency.

use crate::joypad::JoypadKey;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Integer window scale factor applied to the 160x144 frame.
    pub window_scale: usize,
    /// Host keyboard key name (minifb `Key` variant name) to joypad key.
    pub key_bindings: HashMap<String, JoypadKey>,
    /// Four-color grayscale (or custom) palette, light to dark.
    pub palette: [PaletteEntry; 4],
}

impl Default for Config {
    fn default() -> Self {
        let mut key_bindings = HashMap::new();
        key_bindings.insert("Right".to_string(), JoypadKey::Right);
        key_bindings.insert("Left".to_string(), JoypadKey::Left);
        key_bindings.insert("Up".to_string(), JoypadKey::Up);
        key_bindings.insert("Down".to_string(), JoypadKey::Down);
        key_bindings.insert("X".to_string(), JoypadKey::A);
        key_bindings.insert("Z".to_string(), JoypadKey::B);
        key_bindings.insert("Backspace".to_string(), JoypadKey::Select);
        key_bindings.insert("Enter".to_string(), JoypadKey::Start);

        Self {
            window_scale: 3,
            key_bindings,
            palette: [
                PaletteEntry(0xE0, 0xF8, 0xD0),
                PaletteEntry(0x88, 0xC0, 0x70),
                PaletteEntry(0x34, 0x68, 0x56),
                PaletteEntry(0x08, 0x18, 0x20),
            ],
        }
    }
}

impl Config {
    /// Loads `path` if it exists and parses, otherwise returns defaults.
    /// A present-but-invalid file is logged at `warn!` and treated as
    /// absent, rather than aborting startup.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed config at {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("could not read config at {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_covers_all_eight_joypad_keys() {
        let config = Config::default();
        assert_eq!(config.key_bindings.len(), 8);
    }

    #[test]
    fn round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_scale, config.window_scale);
        assert_eq!(parsed.palette, config.palette);
    }
}
