//! Errors that abort the fetch-decode-execute loop

use thiserror::Error;

use super::snapshot::RegisterSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// Unassigned opcode or reserved operand encoding. The failing step
    /// leaves registers, flags, memory and the clock as they were, and the
    /// snapshot reflects that state.
    #[error("decode error: opcode {opcode:02X} at {cs:04X}:{ip:04X}")]
    Decode {
        opcode: u8,
        cs: u16,
        ip: u16,
        snapshot: Box<RegisterSnapshot>,
    },

    /// Physical address above 0xFFFFF under `AddressPolicy::Strict`
    #[error("address {address:06X} is outside the 1 MiB address space")]
    Address { address: u32 },
}

impl CpuError {
    /// Opcode byte of a decode error
    pub fn opcode(&self) -> Option<u8> {
        match self {
            CpuError::Decode { opcode, .. } => Some(*opcode),
            CpuError::Address { .. } => None,
        }
    }
}
