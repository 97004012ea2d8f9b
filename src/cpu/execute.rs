//! The base (non-CB-prefixed) 256-entry opcode table, plus the ALU and
//! register-decode helpers shared with `execute_cb.rs`.
//!
//! Grounded on `gb_rs`'s `CPU::execute` big match statement (same
//! instruction groupings: 8-bit loads, 16-bit loads, ALU, rotate/shift,
//! control flow, misc) and on `original_source/gb_pymulator/cpu.py` for the
//! exact flag semantics of DAA, the half-carry/carry computations, and the
//! `ADD SP,r8`/`LD HL,SP+r8` flag quirk (Z and N are always cleared, H/C are
//! computed on the low byte). Unsupported opcodes return
//! `EmuError::UnsupportedOpcode` rather than panicking.

use super::Cpu;
use crate::error::EmuError;
use crate::registers::{Condition, Flag, Reg16, Reg8};

/// Decodes the 3-bit register field used throughout the base and CB tables
/// (0=B,1=C,2=D,3=E,4=H,5=L,6=(HL),7=A).
#[derive(Clone, Copy)]
enum R8Slot {
    Reg(Reg8),
    IndirectHl,
}

fn decode_r8(bits: u8) -> R8Slot {
    match bits & 0x07 {
        0 => R8Slot::Reg(Reg8::B),
        1 => R8Slot::Reg(Reg8::C),
        2 => R8Slot::Reg(Reg8::D),
        3 => R8Slot::Reg(Reg8::E),
        4 => R8Slot::Reg(Reg8::H),
        5 => R8Slot::Reg(Reg8::L),
        6 => R8Slot::IndirectHl,
        7 => R8Slot::Reg(Reg8::A),
        _ => unreachable!(),
    }
}

fn decode_r16_sp(bits: u8) -> Reg16 {
    match bits & 0x03 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        3 => Reg16::SP,
        _ => unreachable!(),
    }
}

fn decode_condition(bits: u8) -> Condition {
    match bits & 0x03 {
        0 => Condition::NZ,
        1 => Condition::Z,
        2 => Condition::NC,
        3 => Condition::C,
        _ => unreachable!(),
    }
}

impl Cpu {
    pub(super) fn read_r8_slot(&mut self, slot: R8SlotPublic) -> Result<u8, EmuError> {
        match slot.0 {
            R8Slot::Reg(r) => Ok(self.regs.get8(r)),
            R8Slot::IndirectHl => self.bus.read(self.get_hl()),
        }
    }

    pub(super) fn write_r8_slot(&mut self, slot: R8SlotPublic, value: u8) -> Result<(), EmuError> {
        match slot.0 {
            R8Slot::Reg(r) => {
                self.regs.set8(r, value);
                Ok(())
            }
            R8Slot::IndirectHl => self.bus.write(self.get_hl(), value),
        }
    }

    fn add8(&mut self, rhs: u8, carry_in: bool) {
        let a = self.regs.a;
        let carry = carry_in as u8;
        let (sum1, o1) = a.overflowing_add(rhs);
        let (sum, o2) = sum1.overflowing_add(carry);
        let half = (a & 0x0F) + (rhs & 0x0F) + carry > 0x0F;
        self.regs.a = sum;
        self.regs.set_flags(sum == 0, false, half, o1 || o2);
    }

    fn sub8(&mut self, rhs: u8, carry_in: bool, store: bool) -> u8 {
        let a = self.regs.a;
        let carry = carry_in as u8;
        let (diff1, b1) = a.overflowing_sub(rhs);
        let (diff, b2) = diff1.overflowing_sub(carry);
        let half = (a & 0x0F) < (rhs & 0x0F) + carry;
        if store {
            self.regs.a = diff;
        }
        self.regs.set_flags(diff == 0, true, half, b1 || b2);
        diff
    }

    fn and8(&mut self, rhs: u8) {
        self.regs.a &= rhs;
        self.regs.set_flags(self.regs.a == 0, false, true, false);
    }

    fn or8(&mut self, rhs: u8) {
        self.regs.a |= rhs;
        self.regs.set_flags(self.regs.a == 0, false, false, false);
    }

    fn xor8(&mut self, rhs: u8) {
        self.regs.a ^= rhs;
        self.regs.set_flags(self.regs.a == 0, false, false, false);
    }

    fn inc8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        let half = (value & 0x0F) == 0x0F;
        self.regs.set_flag(Flag::Z, result == 0);
        self.regs.set_flag(Flag::N, false);
        self.regs.set_flag(Flag::H, half);
        result
    }

    fn dec8(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        let half = (value & 0x0F) == 0;
        self.regs.set_flag(Flag::Z, result == 0);
        self.regs.set_flag(Flag::N, true);
        self.regs.set_flag(Flag::H, half);
        result
    }

    fn add_hl(&mut self, rhs: u16) {
        let hl = self.get_hl();
        let (sum, overflow) = hl.overflowing_add(rhs);
        let half = (hl & 0x0FFF) + (rhs & 0x0FFF) > 0x0FFF;
        self.regs.set16(Reg16::HL, sum);
        self.regs.set_flag(Flag::N, false);
        self.regs.set_flag(Flag::H, half);
        self.regs.set_flag(Flag::C, overflow);
    }

    /// Shared by `ADD SP,r8` and `LD HL,SP+r8`: both clear Z and N and
    /// compute H/C on the low byte of SP plus the signed 8-bit operand.
    fn add_sp_signed(&mut self, offset: i8) -> u16 {
        let sp = self.regs.sp;
        let value = offset as i16 as u16;
        let half = (sp & 0x0F) + (value & 0x0F) > 0x0F;
        let carry = (sp & 0xFF) + (value & 0xFF) > 0xFF;
        self.regs.set_flags(false, false, half, carry);
        sp.wrapping_add(value)
    }

    fn daa(&mut self) {
        let mut a = self.regs.a;
        let mut carry = self.regs.get_flag(Flag::C);
        if !self.regs.get_flag(Flag::N) {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.regs.get_flag(Flag::H) || (a & 0x0F) > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.regs.get_flag(Flag::H) {
                a = a.wrapping_sub(0x06);
            }
        }
        self.regs.a = a;
        self.regs.set_flag(Flag::Z, a == 0);
        self.regs.set_flag(Flag::H, false);
        self.regs.set_flag(Flag::C, carry);
    }

    pub(super) fn rlc(&mut self, value: u8) -> u8 {
        let carry = value & 0x80 != 0;
        let result = value.rotate_left(1);
        self.regs.set_flags(result == 0, false, false, carry);
        result
    }

    pub(super) fn rrc(&mut self, value: u8) -> u8 {
        let carry = value & 0x01 != 0;
        let result = value.rotate_right(1);
        self.regs.set_flags(result == 0, false, false, carry);
        result
    }

    pub(super) fn rl(&mut self, value: u8) -> u8 {
        let carry_in = self.regs.get_flag(Flag::C) as u8;
        let carry_out = value & 0x80 != 0;
        let result = (value << 1) | carry_in;
        self.regs.set_flags(result == 0, false, false, carry_out);
        result
    }

    pub(super) fn rr(&mut self, value: u8) -> u8 {
        let carry_in = (self.regs.get_flag(Flag::C) as u8) << 7;
        let carry_out = value & 0x01 != 0;
        let result = (value >> 1) | carry_in;
        self.regs.set_flags(result == 0, false, false, carry_out);
        result
    }

    pub(super) fn sla(&mut self, value: u8) -> u8 {
        let carry = value & 0x80 != 0;
        let result = value << 1;
        self.regs.set_flags(result == 0, false, false, carry);
        result
    }

    pub(super) fn sra(&mut self, value: u8) -> u8 {
        let carry = value & 0x01 != 0;
        let result = (value >> 1) | (value & 0x80);
        self.regs.set_flags(result == 0, false, false, carry);
        result
    }

    pub(super) fn swap(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(4);
        self.regs.set_flags(result == 0, false, false, false);
        result
    }

    pub(super) fn srl(&mut self, value: u8) -> u8 {
        let carry = value & 0x01 != 0;
        let result = value >> 1;
        self.regs.set_flags(result == 0, false, false, carry);
        result
    }

    /// Dispatches one base-table opcode and returns its T-cycle cost.
    /// Conditional instructions return the branch-taken cost only when the
    /// condition holds, the not-taken cost otherwise, per spec.md §4.5.
    pub(super) fn execute_base(&mut self, opcode: u8) -> Result<u8, EmuError> {
        match opcode {
            0x00 => Ok(4), // NOP
            0x76 => {
                self.halted = true;
                Ok(4)
            } // HALT
            0x10 => {
                let _ = self.fetch_byte()?; // STOP's mandatory (ignored) operand byte
                self.stopped = true;
                self.bus.timer.write(0xFF04, 0);
                Ok(4)
            }
            0xF3 => {
                self.schedule_di();
                Ok(4)
            }
            0xFB => {
                self.schedule_ei();
                Ok(4)
            }
            0x3F => {
                // CCF
                let c = self.regs.get_flag(Flag::C);
                self.regs.set_flag(Flag::N, false);
                self.regs.set_flag(Flag::H, false);
                self.regs.set_flag(Flag::C, !c);
                Ok(4)
            }
            0x37 => {
                // SCF
                self.regs.set_flag(Flag::N, false);
                self.regs.set_flag(Flag::H, false);
                self.regs.set_flag(Flag::C, true);
                Ok(4)
            }
            0x2F => {
                // CPL
                self.regs.a = !self.regs.a;
                self.regs.set_flag(Flag::N, true);
                self.regs.set_flag(Flag::H, true);
                Ok(4)
            }
            0x27 => {
                self.daa();
                Ok(4)
            }

            // 8-bit loads: LD r,r' (0x40-0x7F excluding 0x76 HALT above)
            0x40..=0x7F => {
                let dst = decode_r8(opcode >> 3);
                let src = decode_r8(opcode);
                let value = self.read_r8_slot(R8SlotPublic(src))?;
                self.write_r8_slot(R8SlotPublic(dst), value)?;
                Ok(if matches!(dst, R8Slot::IndirectHl) || matches!(src, R8Slot::IndirectHl) {
                    8
                } else {
                    4
                })
            }

            // LD r,d8
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let dst = decode_r8(opcode >> 3);
                let imm = self.fetch_byte()?;
                self.write_r8_slot(R8SlotPublic(dst), imm)?;
                Ok(if matches!(dst, R8Slot::IndirectHl) { 12 } else { 8 })
            }

            // INC r / DEC r (0x04,0x0C,... step 8 ; 0x05,0x0D,... step 8)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let slot = decode_r8(opcode >> 3);
                let value = self.read_r8_slot(R8SlotPublic(slot))?;
                let result = self.inc8(value);
                self.write_r8_slot(R8SlotPublic(slot), result)?;
                Ok(if matches!(slot, R8Slot::IndirectHl) { 12 } else { 4 })
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let slot = decode_r8(opcode >> 3);
                let value = self.read_r8_slot(R8SlotPublic(slot))?;
                let result = self.dec8(value);
                self.write_r8_slot(R8SlotPublic(slot), result)?;
                Ok(if matches!(slot, R8Slot::IndirectHl) { 12 } else { 4 })
            }

            // ALU A,r (0x80-0xBF)
            0x80..=0xBF => {
                let slot = decode_r8(opcode);
                let value = self.read_r8_slot(R8SlotPublic(slot))?;
                let cycles = if matches!(slot, R8Slot::IndirectHl) { 8 } else { 4 };
                match (opcode >> 3) & 0x07 {
                    0 => self.add8(value, false),
                    1 => self.add8(value, self.regs.get_flag(Flag::C)),
                    2 => {
                        self.sub8(value, false, true);
                    }
                    3 => {
                        self.sub8(value, self.regs.get_flag(Flag::C), true);
                    }
                    4 => self.and8(value),
                    5 => self.xor8(value),
                    6 => self.or8(value),
                    7 => {
                        self.sub8(value, false, false);
                    }
                    _ => unreachable!(),
                }
                Ok(cycles)
            }

            // ALU A,d8 (0xC6,0xCE,0xD6,0xDE,0xE6,0xEE,0xF6,0xFE)
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let imm = self.fetch_byte()?;
                match (opcode >> 3) & 0x07 {
                    0 => self.add8(imm, false),
                    1 => self.add8(imm, self.regs.get_flag(Flag::C)),
                    2 => {
                        self.sub8(imm, false, true);
                    }
                    3 => {
                        self.sub8(imm, self.regs.get_flag(Flag::C), true);
                    }
                    4 => self.and8(imm),
                    5 => self.xor8(imm),
                    6 => self.or8(imm),
                    7 => {
                        self.sub8(imm, false, false);
                    }
                    _ => unreachable!(),
                }
                Ok(8)
            }

            // 16-bit loads: LD rr,d16
            0x01 | 0x11 | 0x21 | 0x31 => {
                let pair = decode_r16_sp(opcode >> 4);
                let imm = self.fetch_u16()?;
                self.regs.set16(pair, imm);
                Ok(12)
            }

            // LD (rr),A / LD A,(rr) for BC/DE; HL+/HL-
            0x02 => {
                self.bus.write(self.regs.get16(Reg16::BC), self.regs.a)?;
                Ok(8)
            }
            0x12 => {
                self.bus.write(self.regs.get16(Reg16::DE), self.regs.a)?;
                Ok(8)
            }
            0x0A => {
                self.regs.a = self.bus.read(self.regs.get16(Reg16::BC))?;
                Ok(8)
            }
            0x1A => {
                self.regs.a = self.bus.read(self.regs.get16(Reg16::DE))?;
                Ok(8)
            }
            0x22 => {
                let hl = self.get_hl();
                self.bus.write(hl, self.regs.a)?;
                self.regs.set16(Reg16::HL, hl.wrapping_add(1));
                Ok(8)
            }
            0x32 => {
                let hl = self.get_hl();
                self.bus.write(hl, self.regs.a)?;
                self.regs.set16(Reg16::HL, hl.wrapping_sub(1));
                Ok(8)
            }
            0x2A => {
                let hl = self.get_hl();
                self.regs.a = self.bus.read(hl)?;
                self.regs.set16(Reg16::HL, hl.wrapping_add(1));
                Ok(8)
            }
            0x3A => {
                let hl = self.get_hl();
                self.regs.a = self.bus.read(hl)?;
                self.regs.set16(Reg16::HL, hl.wrapping_sub(1));
                Ok(8)
            }

            0x08 => {
                // LD (a16),SP
                let addr = self.fetch_u16()?;
                self.bus.write(addr, (self.regs.sp & 0xFF) as u8)?;
                self.bus.write(addr.wrapping_add(1), (self.regs.sp >> 8) as u8)?;
                Ok(20)
            }

            0xE0 => {
                let offset = self.fetch_byte()?;
                self.bus.write(0xFF00 + offset as u16, self.regs.a)?;
                Ok(12)
            }
            0xF0 => {
                let offset = self.fetch_byte()?;
                self.regs.a = self.bus.read(0xFF00 + offset as u16)?;
                Ok(12)
            }
            0xE2 => {
                self.bus.write(0xFF00 + self.regs.c as u16, self.regs.a)?;
                Ok(8)
            }
            0xF2 => {
                self.regs.a = self.bus.read(0xFF00 + self.regs.c as u16)?;
                Ok(8)
            }
            0xEA => {
                let addr = self.fetch_u16()?;
                self.bus.write(addr, self.regs.a)?;
                Ok(16)
            }
            0xFA => {
                let addr = self.fetch_u16()?;
                self.regs.a = self.bus.read(addr)?;
                Ok(16)
            }

            // INC rr / DEC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                self.regs.inc16(decode_r16_sp(opcode >> 4));
                Ok(8)
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                self.regs.dec16(decode_r16_sp(opcode >> 4));
                Ok(8)
            }

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let value = self.regs.get16(decode_r16_sp(opcode >> 4));
                self.add_hl(value);
                Ok(8)
            }

            0xE8 => {
                // ADD SP,r8
                let offset = self.fetch_i8()?;
                self.regs.sp = self.add_sp_signed(offset);
                Ok(16)
            }
            0xF8 => {
                // LD HL,SP+r8
                let offset = self.fetch_i8()?;
                let result = self.add_sp_signed(offset);
                self.regs.set16(Reg16::HL, result);
                Ok(12)
            }
            0xF9 => {
                self.regs.sp = self.get_hl();
                Ok(8)
            }

            // PUSH/POP
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let pair = match (opcode >> 4) & 0x03 {
                    0 => Reg16::BC,
                    1 => Reg16::DE,
                    2 => Reg16::HL,
                    3 => Reg16::AF,
                    _ => unreachable!(),
                };
                let value = self.regs.get16(pair);
                self.push_u16(value)?;
                Ok(16)
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let pair = match (opcode >> 4) & 0x03 {
                    0 => Reg16::BC,
                    1 => Reg16::DE,
                    2 => Reg16::HL,
                    3 => Reg16::AF,
                    _ => unreachable!(),
                };
                let value = self.pop_u16()?;
                self.regs.set16(pair, value);
                Ok(12)
            }

            // Jumps
            0xC3 => {
                self.regs.pc = self.fetch_u16()?;
                Ok(16)
            }
            0xE9 => {
                self.regs.pc = self.get_hl();
                Ok(4)
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let target = self.fetch_u16()?;
                if self.regs.test_cc(decode_condition(opcode >> 3)) {
                    self.regs.pc = target;
                    Ok(16)
                } else {
                    Ok(12)
                }
            }
            0x18 => {
                let offset = self.fetch_i8()?;
                self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                Ok(12)
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch_i8()?;
                if self.regs.test_cc(decode_condition(opcode >> 3)) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    Ok(12)
                } else {
                    Ok(8)
                }
            }

            // Calls/returns
            0xCD => {
                let target = self.fetch_u16()?;
                let ret = self.regs.pc;
                self.push_u16(ret)?;
                self.regs.pc = target;
                Ok(24)
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let target = self.fetch_u16()?;
                if self.regs.test_cc(decode_condition(opcode >> 3)) {
                    let ret = self.regs.pc;
                    self.push_u16(ret)?;
                    self.regs.pc = target;
                    Ok(24)
                } else {
                    Ok(12)
                }
            }
            0xC9 => {
                self.regs.pc = self.pop_u16()?;
                Ok(16)
            }
            0xD9 => {
                self.regs.pc = self.pop_u16()?;
                self.ime = true;
                Ok(16)
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.regs.test_cc(decode_condition(opcode >> 3)) {
                    self.regs.pc = self.pop_u16()?;
                    Ok(20)
                } else {
                    Ok(8)
                }
            }

            // RST
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let target = (opcode & 0x38) as u16;
                let ret = self.regs.pc;
                self.push_u16(ret)?;
                self.regs.pc = target;
                Ok(16)
            }

            // Rotate-A group (faster encodings, always clear Z per spec.md).
            0x07 => {
                self.regs.a = self.rlc(self.regs.a);
                self.regs.set_flag(Flag::Z, false);
                Ok(4)
            }
            0x0F => {
                self.regs.a = self.rrc(self.regs.a);
                self.regs.set_flag(Flag::Z, false);
                Ok(4)
            }
            0x17 => {
                self.regs.a = self.rl(self.regs.a);
                self.regs.set_flag(Flag::Z, false);
                Ok(4)
            }
            0x1F => {
                self.regs.a = self.rr(self.regs.a);
                self.regs.set_flag(Flag::Z, false);
                Ok(4)
            }

            0xCB => {
                let cb_opcode = self.fetch_byte()?;
                self.execute_cb(cb_opcode)
            }

            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                Err(EmuError::UnsupportedOpcode { opcode, pc: self.regs.pc.wrapping_sub(1) })
            }

            _ => Err(EmuError::UnsupportedOpcode { opcode, pc: self.regs.pc.wrapping_sub(1) }),
        }
    }
}

/// Thin public wrapper so `execute_cb.rs` can reuse `decode_r8` and the
/// slot accessors without exposing `R8Slot` itself across the module.
#[derive(Clone, Copy)]
pub(super) struct R8SlotPublic(R8Slot);

pub(super) fn decode_r8_public(bits: u8) -> R8SlotPublic {
    R8SlotPublic(decode_r8(bits))
}

pub(super) fn is_indirect_hl(slot: &R8SlotPublic) -> bool {
    matches!(slot.0, R8Slot::IndirectHl)
}
