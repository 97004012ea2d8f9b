//! The 16-bit address-space demultiplexer.
//!
//! Grounded on `gb_rs`'s `MMU` (`read_byte`/`write_byte` match-on-range
//! dispatch, the DIV/TIMA tick logic that has since moved to `timer.rs`, and
//! the LCD register pass-through that has since moved to `ppu.rs`),
//! generalized per spec.md §4.4: disallowed accesses (echo-RAM writes, the
//! unused 0xFEA0-0xFEFF window) now return `EmuError::DisallowedAccess`
//! instead of being silently dropped, and cartridge/PPU/timer/joypad
//! ownership moves into their own modules.

use crate::cartridge::Cartridge;
use crate::error::EmuError;
use crate::joypad::Joypad;
use crate::ppu::Ppu;
use crate::timer::Timer;
use log::{debug, trace};

pub struct Bus {
    pub cartridge: Cartridge,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,

    wram: [u8; 0x2000],
    hram: [u8; 0x7F],

    pub interrupt_flag: u8,
    pub interrupt_enable: u8,

    /// Sound/waveform registers (0xFF10-0xFF3F): inert storage only, APU
    /// synthesis is out of scope.
    sound_stub: [u8; 0x30],

    serial_data: u8,
}

impl Bus {
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            cartridge,
            ppu: Ppu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            wram: [0; 0x2000],
            hram: [0; 0x7F],
            interrupt_flag: 0xE1,
            interrupt_enable: 0x00,
            sound_stub: [0; 0x30],
            serial_data: 0,
        }
    }

    pub fn read(&mut self, addr: u16) -> Result<u8, EmuError> {
        let value = match addr {
            0x0000..=0x7FFF => self.cartridge.read(addr),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cartridge.read(addr),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => {
                return Err(EmuError::DisallowedAccess { addr, write: false });
            }
            0xFF00 => self.joypad.read(),
            0xFF01..=0xFF02 => self.serial_data,
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.interrupt_flag | 0xE0,
            0xFF10..=0xFF3F => self.sound_stub.get(addr as usize - 0xFF10).copied().unwrap_or(0xFF),
            0xFF40..=0xFF4B => self.ppu.read_register(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupt_enable,
            _ => 0xFF,
        };
        Ok(value)
    }

    pub fn write(&mut self, addr: u16, value: u8) -> Result<(), EmuError> {
        match addr {
            0x0000..=0x7FFF => self.cartridge.write(addr, value),
            0x8000..=0x9FFF => self.ppu.write_vram(addr, value),
            0xA000..=0xBFFF => self.cartridge.write(addr, value),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = value,
            0xE000..=0xFDFF => {
                return Err(EmuError::DisallowedAccess { addr, write: true });
            }
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, value),
            0xFEA0..=0xFEFF => {} // Writes silently ignored.
            0xFF00 => self.joypad.write_select(value),
            0xFF01 => {
                self.serial_data = value;
                trace!("serial data register write: {value:#04X} ({})", value as char);
            }
            0xFF02 => {
                if value == 0x81 {
                    debug!("serial transfer requested (link cable out of scope)");
                }
            }
            0xFF04..=0xFF07 => self.timer.write(addr, value),
            0xFF0F => self.interrupt_flag = value & 0x1F,
            0xFF10..=0xFF3F => {
                if let Some(slot) = self.sound_stub.get_mut(addr as usize - 0xFF10) {
                    *slot = value;
                }
            }
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_register(addr, value),
            0xFF46 => self.oam_dma(value)?,
            0xFF50 => {
                return Err(EmuError::DisallowedAccess { addr, write: true });
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = value,
            0xFFFF => self.interrupt_enable = value,
            _ => {}
        }
        Ok(())
    }

    /// OAM DMA: copies 160 bytes from `value * 0x100` into OAM, reading
    /// through the bus for each source byte (spec.md §4.4), modeled as
    /// instantaneous per spec.md §9 open question (b).
    fn oam_dma(&mut self, value: u8) -> Result<(), EmuError> {
        let source = (value as u16) * 0x100;
        for i in 0..0xA0u16 {
            let byte = self.read(source + i)?;
            self.ppu.write_oam(0xFE00 + i, byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn test_bus() -> Bus {
        let mut rom = vec![0u8; 0x8000];
        rom[0x134..0x144].copy_from_slice(b"TESTROM\0\0\0\0\0\0\0\0");
        let mut s: i32 = 0;
        for &b in &rom[0x134..=0x14C] {
            s = s - b as i32 - 1;
        }
        rom[0x14D] = (s & 0xFF) as u8;
        Bus::new(Cartridge::new(rom, None).unwrap())
    }

    #[test]
    fn high_ram_round_trips() {
        let mut bus = test_bus();
        for addr in 0xFF80..=0xFFFEu16 {
            bus.write(addr, 0x42).unwrap();
            assert_eq!(bus.read(addr).unwrap(), 0x42);
        }
    }

    #[test]
    fn echo_ram_mirrors_work_ram_for_reads_but_rejects_writes() {
        let mut bus = test_bus();
        bus.write(0xC010, 0x99).unwrap();
        assert_eq!(bus.read(0xE010).unwrap(), 0x99);
        assert!(bus.write(0xE010, 1).is_err());
    }

    #[test]
    fn unused_region_writes_ignored_reads_fail() {
        let mut bus = test_bus();
        assert!(bus.write(0xFEA0, 1).is_ok());
        assert!(bus.read(0xFEA0).is_err());
    }

    #[test]
    fn oam_dma_copies_160_bytes() {
        let mut bus = test_bus();
        for i in 0..0xA0u16 {
            bus.write(0xC000 + i, i as u8).unwrap();
        }
        bus.write(0xFF46, 0xC0).unwrap();
        for i in 0..0xA0u16 {
            assert_eq!(bus.read(0xFE00 + i).unwrap(), i as u8);
        }
    }

    #[test]
    fn if_register_masks_to_low_five_bits_on_write() {
        let mut bus = test_bus();
        bus.write(0xFF0F, 0xFF).unwrap();
        assert_eq!(bus.interrupt_flag, 0x1F);
        assert_eq!(bus.read(0xFF0F).unwrap(), 0xFF);
    }
}
