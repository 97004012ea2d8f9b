//! A `minifb`-backed [`InputSource`]/[`DisplaySink`] for the binary.
//!
//! The library's driver loop is windowing-agnostic (see `driver.rs`); this
//! module supplies the one real implementation the CLI binary uses, in the
//! style of `christiankuhl-em68k`'s `Monitor` device (`Window::new` +
//! `update_with_buffer`) and `nirhaike-rust-gameboy/examples/emulator.rs`'s
//! `is_key_down`-driven key polling, mapped through this crate's own
//! `Config::key_bindings` instead of a hard-coded layout.

use crate::config::Config;
use crate::driver::{DisplaySink, InputEvent, InputSource};
use crate::joypad::JoypadKey;
use crate::ppu::Rgb;
use minifb::{Key, Window, WindowOptions};
use std::collections::HashMap;

const SCREEN_WIDTH: usize = 160;
const SCREEN_HEIGHT: usize = 144;

pub struct MinifbFrontend {
    window: Window,
    argb_buffer: Vec<u32>,
    bindings: HashMap<Key, JoypadKey>,
    pressed: HashMap<JoypadKey, bool>,
}

impl MinifbFrontend {
    pub fn new(title: &str, config: &Config) -> Self {
        let scale = config.window_scale.max(1);
        let window = Window::new(
            &format!("{title} - dmg_emu"),
            SCREEN_WIDTH * scale,
            SCREEN_HEIGHT * scale,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )
        .expect("failed to open display window");

        let bindings = config
            .key_bindings
            .iter()
            .filter_map(|(name, key)| key_from_name(name).map(|k| (k, *key)))
            .collect();

        Self {
            window,
            argb_buffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            bindings,
            pressed: HashMap::new(),
        }
    }

    fn next_key_event(&mut self) -> Option<InputEvent> {
        for (&host_key, &joypad_key) in &self.bindings {
            let is_down = self.window.is_key_down(host_key);
            let was_down = *self.pressed.get(&joypad_key).unwrap_or(&false);
            if is_down != was_down {
                self.pressed.insert(joypad_key, is_down);
                return Some(InputEvent::KeyChange(joypad_key, is_down));
            }
        }
        None
    }
}

impl InputSource for MinifbFrontend {
    fn poll(&mut self) -> InputEvent {
        self.window.update();
        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            return InputEvent::Quit;
        }
        self.next_key_event().unwrap_or(InputEvent::None)
    }
}

impl DisplaySink for MinifbFrontend {
    fn present(&mut self, frame: &[Rgb; SCREEN_WIDTH * SCREEN_HEIGHT]) {
        for (dst, Rgb(r, g, b)) in self.argb_buffer.iter_mut().zip(frame.iter().copied()) {
            *dst = (*r as u32) << 16 | (*g as u32) << 8 | *b as u32;
        }
        let _ = self
            .window
            .update_with_buffer(&self.argb_buffer, SCREEN_WIDTH, SCREEN_HEIGHT);
    }
}

fn key_from_name(name: &str) -> Option<Key> {
    Some(match name {
        "Right" => Key::Right,
        "Left" => Key::Left,
        "Up" => Key::Up,
        "Down" => Key::Down,
        "X" => Key::X,
        "Z" => Key::Z,
        "Backspace" => Key::Backspace,
        "Enter" => Key::Enter,
        "A" => Key::A,
        "B" => Key::B,
        "Space" => Key::Space,
        _ => return None,
    })
}
