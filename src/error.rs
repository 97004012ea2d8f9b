//! The fatal/non-fatal error taxonomy for the emulator core.
//!
//! Every fallible core operation returns `Result<T, EmuError>` instead of
//! panicking, so the driver loop can attempt to persist external RAM before
//! propagating the failure (see `driver::run`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("unsupported opcode {opcode:#04X} at PC {pc:#06X}")]
    UnsupportedOpcode { opcode: u8, pc: u16 },

    #[error("unsupported cartridge type byte {code:#04X}")]
    UnsupportedCartridgeType { code: u8 },

    #[error("disallowed memory access at {addr:#06X} (write={write})")]
    DisallowedAccess { addr: u16, write: bool },

    #[error("header checksum mismatch: header says {expected:#04X}, computed {computed:#04X}")]
    HeaderChecksumMismatch { expected: u8, computed: u8 },

    #[error("savefile size mismatch: cartridge declares {expected} bytes, savefile has {actual}")]
    SavefileSizeMismatch { expected: usize, actual: usize },

    #[error("collaborator I/O error: {0}")]
    Io(#[from] std::io::Error),
}
