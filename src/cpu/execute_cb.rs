//! The 0xCB-prefixed 256-entry extended opcode table: rotate/shift group,
//! BIT, RES, SET, each over the standard 3-bit register field.
//!
//! Grounded on `gb_rs`'s `CPU::execute_cb` (same four-way split of the
//! opcode byte into rotate-kind/BIT-RES-SET/bit-index/register) and
//! `original_source/gb_pymulator/cpu.py`'s `_execute_cb` for the exact flag
//! behavior of BIT (H always set, C untouched) versus RES/SET (no flags
//! touched at all).

use super::execute::{decode_r8_public, is_indirect_hl};
use crate::error::EmuError;
use crate::registers::Flag;
use crate::cpu::Cpu;

impl Cpu {
    pub(super) fn execute_cb(&mut self, opcode: u8) -> Result<u8, EmuError> {
        let slot = decode_r8_public(opcode);
        let indirect = is_indirect_hl(&slot);
        let value = self.read_r8_slot(slot)?;

        let group = opcode >> 6;
        let bit_index = (opcode >> 3) & 0x07;

        match group {
            0 => {
                // Rotate/shift group, selected by bits 3-5.
                let result = match bit_index {
                    0 => self.rlc(value),
                    1 => self.rrc(value),
                    2 => self.rl(value),
                    3 => self.rr(value),
                    4 => self.sla(value),
                    5 => self.sra(value),
                    6 => self.swap(value),
                    7 => self.srl(value),
                    _ => unreachable!(),
                };
                let slot = decode_r8_public(opcode);
                self.write_r8_slot(slot, result)?;
                Ok(if indirect { 16 } else { 8 })
            }
            1 => {
                // BIT b,r: Z reflects the tested bit, H is always set, C untouched.
                let is_zero = value & (1 << bit_index) == 0;
                self.regs.set_flag(Flag::Z, is_zero);
                self.regs.set_flag(Flag::N, false);
                self.regs.set_flag(Flag::H, true);
                Ok(if indirect { 12 } else { 8 })
            }
            2 => {
                // RES b,r
                let result = value & !(1 << bit_index);
                let slot = decode_r8_public(opcode);
                self.write_r8_slot(slot, result)?;
                Ok(if indirect { 16 } else { 8 })
            }
            3 => {
                // SET b,r
                let result = value | (1 << bit_index);
                let slot = decode_r8_public(opcode);
                self.write_r8_slot(slot, result)?;
                Ok(if indirect { 16 } else { 8 })
            }
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::cartridge::Cartridge;
    use crate::registers::Reg8;

    fn test_cpu() -> Cpu {
        let mut rom = vec![0u8; 0x8000];
        rom[0x134..0x144].copy_from_slice(b"TESTROM\0\0\0\0\0\0\0\0");
        let mut s: i32 = 0;
        for &b in &rom[0x134..=0x14C] {
            s = s - b as i32 - 1;
        }
        rom[0x14D] = (s & 0xFF) as u8;
        let cart = Cartridge::new(rom, None).unwrap();
        Cpu::new(Bus::new(cart))
    }

    #[test]
    fn bit_sets_zero_flag_and_h_always() {
        let mut cpu = test_cpu();
        cpu.regs.set8(Reg8::B, 0b0000_0010);
        cpu.regs.set_flag(Flag::C, true);
        // CB 0x50 = BIT 2,B
        let cycles = cpu.execute_cb(0x50).unwrap();
        assert_eq!(cycles, 8);
        assert!(!cpu.regs.get_flag(Flag::Z));
        assert!(cpu.regs.get_flag(Flag::H));
        assert!(cpu.regs.get_flag(Flag::C)); // untouched
    }

    #[test]
    fn res_clears_bit_without_touching_flags() {
        let mut cpu = test_cpu();
        cpu.regs.set8(Reg8::B, 0xFF);
        cpu.regs.set_flag(Flag::Z, true);
        // CB 0x90 = RES 2,B
        cpu.execute_cb(0x90).unwrap();
        assert_eq!(cpu.regs.b, 0xFB);
        assert!(cpu.regs.get_flag(Flag::Z));
    }

    #[test]
    fn swap_nibbles() {
        let mut cpu = test_cpu();
        cpu.regs.set8(Reg8::A, 0x12);
        // CB 0x37 = SWAP A
        cpu.execute_cb(0x37).unwrap();
        assert_eq!(cpu.regs.a, 0x21);
        assert!(!cpu.regs.get_flag(Flag::Z));
    }

    #[test]
    fn srl_shifts_into_carry() {
        let mut cpu = test_cpu();
        cpu.regs.set8(Reg8::A, 0x01);
        // CB 0x3F = SRL A
        cpu.execute_cb(0x3F).unwrap();
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.get_flag(Flag::Z));
        assert!(cpu.regs.get_flag(Flag::C));
    }
}
