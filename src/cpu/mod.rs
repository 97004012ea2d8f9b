//! The fetch/decode/execute interpreter: CPU state, the interrupt-service
//! routine, delayed EI/DI, and HALT/STOP handling.
//!
//! Grounded on `gb_rs`'s `CPU` (the flag-arithmetic helpers, `handle_interrupts`,
//! `push_u16`/`pop_u16`, `fetch_byte`/`fetch_u16`) and on
//! `original_source/gb_pymulator/motherboard.py`'s `Motherboard` (the
//! two-instruction EI/DI countdown, named there `_ei_countdown`/
//! `_di_countdown`) and `emulator.py`'s `_handle_interrupts` (lowest-bit-first
//! vectoring, 5 M-cycle service cost). The opcode tables themselves live in
//! `execute.rs` (base) and `execute_cb.rs` (0xCB-prefixed), mirroring how
//! `hunterchen7-ti84ce/core/src/cpu/{mod.rs,execute.rs}` splits dispatch from
//! CPU-state bookkeeping.

mod execute;
mod execute_cb;

use crate::bus::Bus;
use crate::error::EmuError;
use crate::registers::{Reg16, Registers};
use log::{debug, trace};

/// IF/IE bit positions, lowest-numbered-first as spec.md §4.5 requires for
/// priority when servicing.
const VECTORS: [u16; 5] = [0x0040, 0x0048, 0x0050, 0x0058, 0x0060];

pub struct Cpu {
    pub regs: Registers,
    pub bus: Bus,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Countdown for EI's "takes effect after the next instruction" delay;
    /// `Some(1)` on the instruction boundary where IME should flip.
    ei_delay: Option<u8>,
    di_delay: Option<u8>,
}

impl Cpu {
    pub fn new(bus: Bus) -> Self {
        Self {
            regs: Registers::new(),
            bus,
            ime: false,
            halted: false,
            stopped: false,
            ei_delay: None,
            di_delay: None,
        }
    }

    pub fn schedule_ei(&mut self) {
        self.ei_delay = Some(2);
    }

    pub fn schedule_di(&mut self) {
        self.di_delay = Some(2);
        self.ei_delay = None; // DI cancels a pending EI, matching gb_rs's 0xF3 handler.
    }

    fn apply_ime_delay(&mut self) {
        if let Some(n) = self.ei_delay {
            if n <= 1 {
                self.ime = true;
                self.ei_delay = None;
                trace!("IME enabled (delayed EI)");
            } else {
                self.ei_delay = Some(n - 1);
            }
        }
        if let Some(n) = self.di_delay {
            if n <= 1 {
                self.ime = false;
                self.di_delay = None;
                trace!("IME disabled (delayed DI)");
            } else {
                self.di_delay = Some(n - 1);
            }
        }
    }

    /// Services the highest-priority pending interrupt, if any. Returns the
    /// T-cycle cost of servicing (20, i.e. 5 M-cycles, per spec.md §4.5), or
    /// 0 if nothing was serviced. Always clears `halted` when any enabled
    /// interrupt is pending, even if IME is false.
    pub fn handle_interrupts(&mut self) -> Result<u8, EmuError> {
        let pending = self.bus.interrupt_flag & self.bus.interrupt_enable & 0x1F;
        if pending == 0 {
            return Ok(0);
        }
        self.halted = false;

        if !self.ime {
            return Ok(0);
        }

        for bit in 0..5 {
            if pending & (1 << bit) != 0 {
                self.ime = false;
                self.bus.interrupt_flag &= !(1 << bit);
                let pc = self.regs.pc;
                self.push_u16(pc)?;
                self.regs.pc = VECTORS[bit];
                debug!("servicing interrupt bit {bit}, vector {:#06X}", VECTORS[bit]);
                return Ok(20);
            }
        }
        unreachable!("pending was nonzero but no bit matched")
    }

    /// Executes one step: either 4 halt-substitute cycles, or one
    /// fetch/decode/execute cycle followed by applying any pending EI/DI.
    /// Returns the T-cycle cost.
    pub fn step(&mut self) -> Result<u8, EmuError> {
        if self.halted || self.stopped {
            return Ok(4);
        }

        let opcode = self.fetch_byte()?;
        let cycles = self.execute_base(opcode)?;
        self.apply_ime_delay();
        Ok(cycles)
    }

    fn fetch_byte(&mut self) -> Result<u8, EmuError> {
        let byte = self.bus.read(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        Ok(byte)
    }

    fn fetch_i8(&mut self) -> Result<i8, EmuError> {
        Ok(self.fetch_byte()? as i8)
    }

    fn fetch_u16(&mut self) -> Result<u16, EmuError> {
        let lo = self.fetch_byte()? as u16;
        let hi = self.fetch_byte()? as u16;
        Ok(hi << 8 | lo)
    }

    fn push_u16(&mut self, value: u16) -> Result<(), EmuError> {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.bus.write(self.regs.sp, (value >> 8) as u8)?;
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.bus.write(self.regs.sp, (value & 0xFF) as u8)?;
        Ok(())
    }

    fn pop_u16(&mut self) -> Result<u16, EmuError> {
        let lo = self.bus.read(self.regs.sp)? as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.bus.read(self.regs.sp)? as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        Ok(hi << 8 | lo)
    }

    fn get_hl(&self) -> u16 {
        self.regs.get16(Reg16::HL)
    }
}
