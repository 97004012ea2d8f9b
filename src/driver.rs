//! The single-threaded drive loop and its collaborator boundary.
//!
//! Grounded on `gb_rs`'s `main.rs` loop (`handle_interrupts` → `step` →
//! `bus.tick(cycles)`) generalized per spec.md §5's seven-step loop, and on
//! `original_source/gb_pymulator/emulator.py`'s `Emulator.run` for the
//! scanline-countdown/frame-present cadence. The collaborator traits
//! (`SaveStore`, `InputSource`, `DisplaySink`) follow the pattern
//! `gb_rs`'s `Cartridge` lacks entirely but that `nirhaike-rust-gameboy`'s
//! `Hardware` trait and `woojiq-gbemu`'s windowing split both use to keep
//! the core testable without a real window.

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::error::EmuError;
use crate::joypad::JoypadKey;
use crate::ppu::Rgb;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const CYCLES_PER_SCANLINE: u32 = 456;
const IF_TIMER: u8 = 0x04;
const IF_JOYPAD: u8 = 0x10;

/// Persists and restores cartridge external RAM by name (spec.md §6's "save
/// store" collaborator).
pub trait SaveStore {
    fn load(&self, name: &str) -> std::io::Result<Option<Vec<u8>>>;
    fn save(&self, name: &str, bytes: &[u8]) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    None,
    KeyChange(JoypadKey, bool),
    Quit,
}

/// Supplies joypad events and requests for orderly shutdown (spec.md §6's
/// "input source" collaborator).
pub trait InputSource {
    fn poll(&mut self) -> InputEvent;
}

/// Accepts a completed frame for presentation (spec.md §6's "display sink"
/// collaborator).
pub trait DisplaySink {
    fn present(&mut self, frame: &[Rgb; 160 * 144]);
}

/// A filesystem-backed [`SaveStore`]: savefiles live alongside the ROM (or
/// under an override directory) as `<name>.sav`.
pub struct FsSaveStore {
    dir: PathBuf,
}

impl FsSaveStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.sav"))
    }
}

impl SaveStore for FsSaveStore {
    fn load(&self, name: &str) -> std::io::Result<Option<Vec<u8>>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    fn save(&self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(name), bytes)
    }
}

/// Loads the ROM from disk, restores any existing savefile, and runs the
/// emulator until the input collaborator requests a quit or a fatal error is
/// hit. On either, external RAM is persisted before returning.
pub fn run(
    rom_path: &Path,
    save_store: &impl SaveStore,
    frontend: &mut (impl InputSource + DisplaySink),
    present_interval: Duration,
    display_palette: [Rgb; 4],
) -> Result<(), EmuError> {
    let rom = std::fs::read(rom_path)?;
    let title = crate::cartridge::peek_title(&rom);
    let saved_ram = save_store.load(&title)?;
    let cartridge = Cartridge::new(rom, saved_ram)?;
    let title = cartridge.title.clone();

    let mut cpu = Cpu::new(Bus::new(cartridge));
    cpu.bus.ppu.set_display_palette(display_palette);
    let mut scanline_countdown: i32 = CYCLES_PER_SCANLINE as i32;
    let mut last_present = Instant::now();

    let result = (|| -> Result<(), EmuError> {
        loop {
            match frontend.poll() {
                InputEvent::Quit => return Ok(()),
                InputEvent::KeyChange(key, pressed) => {
                    let pressed_transition = cpu.bus.joypad.set_key(key, pressed);
                    if pressed_transition {
                        cpu.bus.interrupt_flag |= IF_JOYPAD;
                        cpu.stopped = false;
                    }
                }
                InputEvent::None => {}
            }

            let interrupt_cycles = cpu.handle_interrupts()?;
            let step_cycles = cpu.step()?;
            let cycles = interrupt_cycles + step_cycles;

            if cpu.bus.timer.update(cycles as u8) {
                cpu.bus.interrupt_flag |= IF_TIMER;
            }

            scanline_countdown -= cycles as i32;
            while scanline_countdown <= 0 {
                let fired = cpu.bus.ppu.advance_line();
                cpu.bus.interrupt_flag |= fired;
                scanline_countdown += CYCLES_PER_SCANLINE as i32;
            }

            if last_present.elapsed() >= present_interval {
                frontend.present(cpu.bus.ppu.frame_buffer());
                last_present = Instant::now();
            }
        }
    })();

    if let Err(e) = &result {
        error!("emulation halted: {e}");
    }
    info!("persisting external RAM for '{title}'");
    save_store.save(&title, cpu.bus.cartridge.external_ram())?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scripted frontend: pops queued input events and discards presented
    /// frames, so the driver loop can run headless in tests.
    struct ScriptedFrontend {
        events: std::vec::IntoIter<InputEvent>,
    }
    impl ScriptedFrontend {
        fn new(events: Vec<InputEvent>) -> Self {
            Self { events: events.into_iter() }
        }
    }
    impl InputSource for ScriptedFrontend {
        fn poll(&mut self) -> InputEvent {
            self.events.next().unwrap_or(InputEvent::Quit)
        }
    }
    impl DisplaySink for ScriptedFrontend {
        fn present(&mut self, _frame: &[Rgb; 160 * 144]) {}
    }

    struct MemorySaveStore;
    impl SaveStore for MemorySaveStore {
        fn load(&self, _name: &str) -> std::io::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        fn save(&self, _name: &str, _bytes: &[u8]) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn write_test_rom(path: &Path) {
        let mut rom = vec![0u8; 0x8000];
        rom[0x134..0x144].copy_from_slice(b"TESTROM\0\0\0\0\0\0\0\0");
        rom[0x100] = 0x00; // NOP forever, loop on itself via JR
        rom[0x101] = 0x18; // JR
        rom[0x102] = 0xFD; // -3: back to 0x100
        let mut s: i32 = 0;
        for &b in &rom[0x134..=0x14C] {
            s = s - b as i32 - 1;
        }
        rom[0x14D] = (s & 0xFF) as u8;
        std::fs::write(path, rom).unwrap();
    }

    #[test]
    fn quits_immediately_on_quit_event() {
        let dir = std::env::temp_dir().join("dmg_emu_driver_test_quit");
        std::fs::create_dir_all(&dir).unwrap();
        let rom_path = dir.join("test.gb");
        write_test_rom(&rom_path);

        let mut frontend = ScriptedFrontend::new(vec![InputEvent::Quit]);
        let default_palette = [
            Rgb(0xFF, 0xFF, 0xFF),
            Rgb(0xAA, 0xAA, 0xAA),
            Rgb(0x55, 0x55, 0x55),
            Rgb(0x00, 0x00, 0x00),
        ];
        let result = run(
            &rom_path,
            &MemorySaveStore,
            &mut frontend,
            Duration::from_millis(50),
            default_palette,
        );
        assert!(result.is_ok());
    }
}
