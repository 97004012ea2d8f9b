//! Cartridge controller: ROM/RAM banking and header parsing.
//!
//! Grounded on `original_source/gb_pymulator/cartridge.py` and
//! `cartridge_header.py` for the bank-switch and checksum algorithms (the
//! `gb_rs` teacher crate has no cartridge controller at all — `main.rs` reads
//! the ROM bytes directly into a flat `Vec<u8>` with no banking), generalized
//! into a small enum-dispatched controller per spec.md §4.3.

use crate::error::EmuError;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc3,
}

impl CartridgeType {
    fn from_header_byte(code: u8) -> Result<Self, EmuError> {
        match code {
            0x00 => Ok(CartridgeType::RomOnly),
            0x01..=0x03 => Ok(CartridgeType::Mbc1),
            0x0F..=0x13 => Ok(CartridgeType::Mbc3),
            _ => Err(EmuError::UnsupportedCartridgeType { code }),
        }
    }
}

/// RAM size byte (0x149) to byte count, per spec.md §6.
fn ram_size_bytes(code: u8) -> usize {
    match code {
        0 => 0,
        2 => 8 * 1024,
        3 => 32 * 1024,
        4 => 128 * 1024,
        5 => 64 * 1024,
        _ => 0,
    }
}

pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    kind: CartridgeType,
    rom_bank_offset: usize,
    ram_bank_offset: usize,
    ram_enabled: bool,
    pub title: String,
    pub declared_ram_size: usize,
}

impl Cartridge {
    /// Parses the header (validating its checksum) and constructs the
    /// controller. `saved_ram` is the collaborator-supplied savefile
    /// contents, if any; its length must match the declared RAM size.
    pub fn new(rom: Vec<u8>, saved_ram: Option<Vec<u8>>) -> Result<Self, EmuError> {
        if rom.len() < 0x150 {
            return Err(EmuError::HeaderChecksumMismatch {
                expected: 0,
                computed: 0,
            });
        }
        validate_header_checksum(&rom)?;

        let kind = CartridgeType::from_header_byte(rom[0x147])?;
        let declared_ram_size = ram_size_bytes(rom[0x149]);
        let title = parse_title(&rom[0x134..0x144]);

        let ram = match saved_ram {
            Some(bytes) => {
                if bytes.len() != declared_ram_size {
                    return Err(EmuError::SavefileSizeMismatch {
                        expected: declared_ram_size,
                        actual: bytes.len(),
                    });
                }
                bytes
            }
            None => vec![0; declared_ram_size],
        };

        info!(
            "cartridge '{title}' loaded: {} ({} bytes ROM, {} bytes RAM)",
            match kind {
                CartridgeType::RomOnly => "ROM_ONLY",
                CartridgeType::Mbc1 => "MBC1",
                CartridgeType::Mbc3 => "MBC3",
            },
            rom.len(),
            declared_ram_size,
        );

        Ok(Self {
            rom,
            ram,
            kind,
            rom_bank_offset: 0,
            ram_bank_offset: 0,
            ram_enabled: false,
            title,
            declared_ram_size,
        })
    }

    pub fn external_ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let idx = self.rom_bank_offset + addr as usize;
                self.rom.get(idx).copied().unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => {
                if self.ram.is_empty() {
                    0xFF
                } else {
                    let idx = self.ram_bank_offset + (addr - 0xA000) as usize;
                    self.ram.get(idx).copied().unwrap_or(0xFF)
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match self.kind {
            CartridgeType::RomOnly => {
                if let 0xA000..=0xBFFF = addr {
                    self.write_external_ram(addr, value);
                }
                // Writes to 0x0000-0x7FFF are ignored for ROM_ONLY.
            }
            CartridgeType::Mbc1 | CartridgeType::Mbc3 => match addr {
                0x0000..=0x1FFF => {
                    self.ram_enabled = value & 0x0F == 0x0A;
                }
                0x2000..=0x3FFF => {
                    let bank = value.max(1) as usize;
                    self.rom_bank_offset = (bank - 1) * 0x4000;
                }
                0x4000..=0x5FFF => {
                    self.ram_bank_offset = value as usize * 0x2000;
                }
                0x6000..=0x7FFF => {
                    warn!("ignoring MBC3 RTC-select write ({value:#04X}), RTC is out of scope");
                }
                0xA000..=0xBFFF => self.write_external_ram(addr, value),
                _ => {}
            },
        }
    }

    fn write_external_ram(&mut self, addr: u16, value: u8) {
        if !self.ram_enabled || self.ram.is_empty() {
            return;
        }
        let idx = self.ram_bank_offset + (addr - 0xA000) as usize;
        if let Some(slot) = self.ram.get_mut(idx) {
            *slot = value;
        }
    }
}

/// Reads the cartridge title straight from raw ROM bytes, without
/// validating the header checksum. Used by the driver to resolve a
/// savefile name before the cartridge (and its RAM) can be constructed.
pub fn peek_title(rom: &[u8]) -> String {
    if rom.len() < 0x144 {
        return String::new();
    }
    parse_title(&rom[0x134..0x144])
}

fn parse_title(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|&&b| b < 0x80)
        .map(|&b| b as char)
        .collect::<String>()
        .replace(' ', "_")
}

fn validate_header_checksum(rom: &[u8]) -> Result<(), EmuError> {
    let mut s: i32 = 0;
    for &b in &rom[0x134..=0x14C] {
        s = s - b as i32 - 1;
    }
    let computed = (s & 0xFF) as u8;
    let expected = rom[0x14D];
    if computed != expected {
        return Err(EmuError::HeaderChecksumMismatch { expected, computed });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rom(kind_byte: u8, ram_byte: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x134..0x144].copy_from_slice(b"TEST GAME\0\0\0\0\0\0");
        rom[0x147] = kind_byte;
        rom[0x149] = ram_byte;
        let mut s: i32 = 0;
        for &b in &rom[0x134..=0x14C] {
            s = s - b as i32 - 1;
        }
        rom[0x14D] = (s & 0xFF) as u8;
        rom
    }

    #[test]
    fn title_is_sanitized() {
        let rom = make_rom(0x00, 0x00);
        let cart = Cartridge::new(rom, None).unwrap();
        assert_eq!(cart.title, "TEST_GAME");
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut rom = make_rom(0x00, 0x00);
        rom[0x14D] ^= 0xFF;
        assert!(matches!(
            Cartridge::new(rom, None),
            Err(EmuError::HeaderChecksumMismatch { .. })
        ));
    }

    #[test]
    fn mbc1_bank_zero_maps_to_bank_one() {
        let mut rom = make_rom(0x01, 0x00);
        rom.resize(0x4000 * 4, 0);
        rom[0x4000] = 0xAA; // bank 1
        rom[0x4000 * 2] = 0xBB; // bank 2
        let mut cart = Cartridge::new(rom, None).unwrap();
        cart.write(0x2000, 0); // selecting bank 0 behaves as bank 1
        assert_eq!(cart.read(0x4000), 0xAA);
        cart.write(0x2000, 2);
        assert_eq!(cart.read(0x4000), 0xBB);
    }

    #[test]
    fn ram_writes_dropped_when_disabled() {
        let rom = make_rom(0x01, 0x02);
        let mut cart = Cartridge::new(rom, None).unwrap();
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0xFF);
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x42);
        assert_eq!(cart.read(0xA000), 0x42);
    }

    #[test]
    fn savefile_size_mismatch_is_fatal() {
        let rom = make_rom(0x01, 0x02);
        let bad_save = vec![0u8; 100];
        assert!(matches!(
            Cartridge::new(rom, Some(bad_save)),
            Err(EmuError::SavefileSizeMismatch { .. })
        ));
    }
}
