//! Byte/word operand abstraction shared by decode, the ALU and execution.

use super::memory::effective_address;

/// Operand width selected by an instruction's `w` bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 8-bit operation
    Byte,
    /// 16-bit operation
    Word,
}

impl Width {
    /// Decode the `w` bit (0 = byte, 1 = word)
    #[inline]
    pub fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Width::Byte
        } else {
            Width::Word
        }
    }

    /// Mask that clips a raw result to this width
    #[inline]
    pub const fn mask(self) -> u32 {
        match self {
            Width::Byte => 0xFF,
            Width::Word => 0xFFFF,
        }
    }

    /// Most significant bit for this width
    #[inline]
    pub const fn sign_bit(self) -> u32 {
        match self {
            Width::Byte => 0x80,
            Width::Word => 0x8000,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            Width::Byte => 8,
            Width::Word => 16,
        }
    }

    /// Size in bytes, used for string pointer stepping
    #[inline]
    pub const fn bytes(self) -> u16 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
        }
    }

    /// Sign-extend a value of this width to 32 bits
    #[inline]
    pub fn sign_extend(self, value: u32) -> i32 {
        match self {
            Width::Byte => value as u8 as i8 as i32,
            Width::Word => value as u16 as i16 as i32,
        }
    }
}

/// Resolved location of a mod/reg/rm operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Register-direct (mod == 11); holds the 3-bit register code
    Register(u8),
    /// Memory operand at `segment:offset`
    Memory { segment: u16, offset: u16 },
}

impl Operand {
    /// Physical address of a memory operand (unmasked), `None` for registers
    pub fn address(&self) -> Option<u32> {
        match *self {
            Operand::Register(_) => None,
            Operand::Memory { segment, offset } => Some(effective_address(segment, offset)),
        }
    }

    #[inline]
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory { .. })
    }
}
