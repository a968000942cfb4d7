//! Arithmetic/logic unit
//!
//! All helpers take operands already masked to `width` and return the result
//! masked to `width`. Flags are derived from the raw (unmasked) result.

use super::flags::{parity, Flags, FLAG_AF, FLAG_CF, FLAG_OF, FLAG_PF, FLAG_SF, FLAG_ZF};
use super::operand::Width;

/// Two-operand ALU operation, encoded in bits 5-3 of the opcode (00-3F) or
/// in the reg field of the 80-83 group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Or,
            2 => AluOp::Adc,
            3 => AluOp::Sbb,
            4 => AluOp::And,
            5 => AluOp::Sub,
            6 => AluOp::Xor,
            _ => AluOp::Cmp,
        }
    }

    /// CMP only updates flags
    #[inline]
    pub fn writes_result(self) -> bool {
        self != AluOp::Cmp
    }
}

/// Shift/rotate operation from the reg field of the D0-D3 group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
}

impl ShiftOp {
    /// Returns `None` for the reserved encoding (reg = 110)
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0 => Some(ShiftOp::Rol),
            1 => Some(ShiftOp::Ror),
            2 => Some(ShiftOp::Rcl),
            3 => Some(ShiftOp::Rcr),
            4 => Some(ShiftOp::Shl),
            5 => Some(ShiftOp::Shr),
            7 => Some(ShiftOp::Sar),
            _ => None,
        }
    }
}

/// Update ZF, SF and PF from a raw result
#[inline]
pub fn set_szp(flags: &mut Flags, width: Width, raw: u32) {
    let result = raw & width.mask();
    flags.set(FLAG_ZF, result == 0);
    flags.set(FLAG_SF, result & width.sign_bit() != 0);
    flags.set(FLAG_PF, parity(result as u8));
}

/// Dispatch a two-operand ALU operation
pub fn binary(flags: &mut Flags, op: AluOp, width: Width, dst: u32, src: u32) -> u32 {
    match op {
        AluOp::Add => add(flags, width, dst, src, 0),
        AluOp::Adc => {
            let carry = flags.carry() as u32;
            add(flags, width, dst, src, carry)
        }
        AluOp::Sub | AluOp::Cmp => sub(flags, width, dst, src, 0),
        AluOp::Sbb => {
            let borrow = flags.carry() as u32;
            sub(flags, width, dst, src, borrow)
        }
        AluOp::And => logic(flags, width, dst & src),
        AluOp::Or => logic(flags, width, dst | src),
        AluOp::Xor => logic(flags, width, dst ^ src),
    }
}

/// ADD/ADC
pub fn add(flags: &mut Flags, width: Width, a: u32, b: u32, carry: u32) -> u32 {
    let raw = a + b + carry;
    flags.set(FLAG_CF, raw > width.mask());
    flags.set(FLAG_OF, (a ^ raw) & (b ^ raw) & width.sign_bit() != 0);
    flags.set(FLAG_AF, (a ^ b ^ raw) & 0x10 != 0);
    set_szp(flags, width, raw);
    raw & width.mask()
}

/// SUB/SBB/CMP (`a - b - borrow`)
pub fn sub(flags: &mut Flags, width: Width, a: u32, b: u32, borrow: u32) -> u32 {
    let raw = a.wrapping_sub(b).wrapping_sub(borrow);
    flags.set(FLAG_CF, a < b + borrow);
    flags.set(FLAG_OF, (a ^ b) & (a ^ raw) & width.sign_bit() != 0);
    flags.set(FLAG_AF, (a ^ b ^ raw) & 0x10 != 0);
    set_szp(flags, width, raw);
    raw & width.mask()
}

/// AND/OR/XOR/TEST: CF and OF cleared, AF left alone
pub fn logic(flags: &mut Flags, width: Width, raw: u32) -> u32 {
    flags.set(FLAG_CF, false);
    flags.set(FLAG_OF, false);
    set_szp(flags, width, raw);
    raw & width.mask()
}

/// INC preserves CF
pub fn inc(flags: &mut Flags, width: Width, value: u32) -> u32 {
    let carry = flags.carry();
    let result = add(flags, width, value, 1, 0);
    flags.set(FLAG_CF, carry);
    result
}

/// DEC preserves CF
pub fn dec(flags: &mut Flags, width: Width, value: u32) -> u32 {
    let carry = flags.carry();
    let result = sub(flags, width, value, 1, 0);
    flags.set(FLAG_CF, carry);
    result
}

/// NEG: `0 - value`, CF set unless the operand was zero
pub fn neg(flags: &mut Flags, width: Width, value: u32) -> u32 {
    sub(flags, width, 0, value, 0)
}

/// Shift or rotate `value` by `count` bit positions
///
/// A zero count leaves every flag untouched. OF is only defined for a count
/// of one and is left alone otherwise.
pub fn shift_rotate(flags: &mut Flags, op: ShiftOp, width: Width, value: u32, count: u32) -> u32 {
    if count == 0 {
        return value;
    }

    let mask = width.mask();
    let msb = width.sign_bit();
    let top = width.bits() - 1;
    let mut result = value & mask;

    match op {
        ShiftOp::Rol => {
            for _ in 0..count {
                let carry_out = result & msb != 0;
                result = ((result << 1) | carry_out as u32) & mask;
                flags.set(FLAG_CF, carry_out);
            }
            if count == 1 {
                flags.set(FLAG_OF, (result & msb != 0) != flags.carry());
            }
        }
        ShiftOp::Ror => {
            for _ in 0..count {
                let carry_out = result & 1 != 0;
                result = (result >> 1) | ((carry_out as u32) << top);
                flags.set(FLAG_CF, carry_out);
            }
            if count == 1 {
                flags.set(FLAG_OF, ((result ^ (result << 1)) & msb) != 0);
            }
        }
        ShiftOp::Rcl => {
            for _ in 0..count {
                let carry_out = result & msb != 0;
                result = ((result << 1) | flags.carry() as u32) & mask;
                flags.set(FLAG_CF, carry_out);
            }
            if count == 1 {
                flags.set(FLAG_OF, (result & msb != 0) != flags.carry());
            }
        }
        ShiftOp::Rcr => {
            for _ in 0..count {
                let carry_out = result & 1 != 0;
                result = (result >> 1) | ((flags.carry() as u32) << top);
                flags.set(FLAG_CF, carry_out);
            }
            if count == 1 {
                flags.set(FLAG_OF, ((result ^ (result << 1)) & msb) != 0);
            }
        }
        ShiftOp::Shl => {
            for _ in 0..count {
                flags.set(FLAG_CF, result & msb != 0);
                result = (result << 1) & mask;
            }
            if count == 1 {
                flags.set(FLAG_OF, (result & msb != 0) != flags.carry());
            }
            set_szp(flags, width, result);
        }
        ShiftOp::Shr => {
            if count == 1 {
                flags.set(FLAG_OF, result & msb != 0);
            }
            for _ in 0..count {
                flags.set(FLAG_CF, result & 1 != 0);
                result >>= 1;
            }
            set_szp(flags, width, result);
        }
        ShiftOp::Sar => {
            for _ in 0..count {
                flags.set(FLAG_CF, result & 1 != 0);
                result = (result >> 1) | (result & msb);
            }
            if count == 1 {
                flags.set(FLAG_OF, false);
            }
            set_szp(flags, width, result);
        }
    }

    result
}
