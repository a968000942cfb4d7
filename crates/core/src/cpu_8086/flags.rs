//! FLAGS register
//!
//! Layout: `X:X:X:X:OF:DF:IF:TF:SF:ZF:X:AF:X:PF:X:CF`. Bits marked X are
//! never read by the engine and keep whatever was last written to them.

// Flag bit positions in FLAGS register
pub const FLAG_CF: u16 = 0x0001; // Carry Flag
pub const FLAG_PF: u16 = 0x0004; // Parity Flag
pub const FLAG_AF: u16 = 0x0010; // Auxiliary Carry Flag
pub const FLAG_ZF: u16 = 0x0040; // Zero Flag
pub const FLAG_SF: u16 = 0x0080; // Sign Flag
pub const FLAG_TF: u16 = 0x0100; // Trap Flag
pub const FLAG_IF: u16 = 0x0200; // Interrupt Enable Flag
pub const FLAG_DF: u16 = 0x0400; // Direction Flag
pub const FLAG_OF: u16 = 0x0800; // Overflow Flag

/// Every defined flag bit
pub const FLAG_MASK: u16 = 0x0FD5;

/// 16-bit condition-code word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u16);

impl Flags {
    pub const fn from_bits(bits: u16) -> Self {
        Flags(bits)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn set_bits(&mut self, bits: u16) {
        self.0 = bits;
    }

    /// Test a single flag bit
    #[inline]
    pub fn get(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Set or clear a single flag bit
    #[inline]
    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[inline]
    pub fn carry(self) -> bool {
        self.get(FLAG_CF)
    }

    #[inline]
    pub fn zero(self) -> bool {
        self.get(FLAG_ZF)
    }

    #[inline]
    pub fn sign(self) -> bool {
        self.get(FLAG_SF)
    }

    #[inline]
    pub fn overflow(self) -> bool {
        self.get(FLAG_OF)
    }

    #[inline]
    pub fn parity(self) -> bool {
        self.get(FLAG_PF)
    }

    #[inline]
    pub fn direction(self) -> bool {
        self.get(FLAG_DF)
    }

    #[inline]
    pub fn interrupt_enabled(self) -> bool {
        self.get(FLAG_IF)
    }

    #[inline]
    pub fn trap(self) -> bool {
        self.get(FLAG_TF)
    }

    /// Evaluate a 4-bit condition code (low nibble of Jcc opcodes)
    /// Condition codes: 0=O, 1=NO, 2=B/C, 3=NB/NC, 4=E/Z, 5=NE/NZ, 6=BE, 7=NBE,
    ///                  8=S, 9=NS, A=P, B=NP, C=L, D=NL, E=LE, F=NLE
    pub fn condition(self, code: u8) -> bool {
        let taken = match code >> 1 & 0x07 {
            0 => self.overflow(),
            1 => self.carry(),
            2 => self.zero(),
            3 => self.carry() || self.zero(),
            4 => self.sign(),
            5 => self.parity(),
            6 => self.sign() != self.overflow(),
            _ => self.zero() || (self.sign() != self.overflow()),
        };
        // Odd codes are the negated form
        taken != (code & 1 != 0)
    }
}

/// True if the byte has an even number of set bits
#[inline]
pub fn parity(val: u8) -> bool {
    val.count_ones() % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_round_trip() {
        let mut flags = Flags::default();
        flags.set(FLAG_CF, true);
        flags.set(FLAG_ZF, true);
        assert!(flags.get(FLAG_ZF));

        flags.set(FLAG_ZF, false);
        assert!(!flags.get(FLAG_ZF));
        // Unrelated flag untouched
        assert!(flags.get(FLAG_CF));
        assert_eq!(flags.bits(), FLAG_CF);
    }

    #[test]
    fn test_flag_positions() {
        let all = [
            FLAG_CF, FLAG_PF, FLAG_AF, FLAG_ZF, FLAG_SF, FLAG_TF, FLAG_IF, FLAG_DF, FLAG_OF,
        ];
        let bits: Vec<u32> = all.iter().map(|f| f.trailing_zeros()).collect();
        assert_eq!(bits, vec![0, 2, 4, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_parity() {
        assert!(parity(0x00));
        assert!(parity(0x03));
        assert!(!parity(0x01));
        assert!(!parity(0x07));
        assert!(parity(0xFF));
    }

    #[test]
    fn test_conditions() {
        let mut flags = Flags::default();
        assert!(!flags.condition(0x4)); // JE
        assert!(flags.condition(0x5)); // JNE

        flags.set(FLAG_ZF, true);
        assert!(flags.condition(0x4));
        assert!(flags.condition(0x6)); // JBE
        assert!(!flags.condition(0x7)); // JA

        // SF != OF means less
        let mut flags = Flags::default();
        flags.set(FLAG_SF, true);
        assert!(flags.condition(0xC)); // JL
        assert!(!flags.condition(0xD)); // JGE
        flags.set(FLAG_OF, true);
        assert!(!flags.condition(0xC));
        assert!(flags.condition(0xF)); // JG
    }
}
