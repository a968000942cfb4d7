//! General purpose, pointer/index and segment registers
//!
//! Register codes follow the architectural mod/reg/rm encoding:
//!
//! | code | byte | word |
//! |------|------|------|
//! | 000  | AL   | AX   |
//! | 001  | CL   | CX   |
//! | 010  | DL   | DX   |
//! | 011  | BL   | BX   |
//! | 100  | AH   | SP   |
//! | 101  | CH   | BP   |
//! | 110  | DH   | SI   |
//! | 111  | BH   | DI   |

// Byte register codes
pub const AL: u8 = 0b000;
pub const CL: u8 = 0b001;
pub const DL: u8 = 0b010;
pub const BL: u8 = 0b011;
pub const AH: u8 = 0b100;
pub const CH: u8 = 0b101;
pub const DH: u8 = 0b110;
pub const BH: u8 = 0b111;

// Word register codes
pub const AX: u8 = 0b000;
pub const CX: u8 = 0b001;
pub const DX: u8 = 0b010;
pub const BX: u8 = 0b011;
pub const SP: u8 = 0b100;
pub const BP: u8 = 0b101;
pub const SI: u8 = 0b110;
pub const DI: u8 = 0b111;

// Segment register codes (sreg field of 8C/8E, bits 4-3 of push/pop seg)
pub const ES: u8 = 0b00;
pub const CS: u8 = 0b01;
pub const SS: u8 = 0b10;
pub const DS: u8 = 0b11;

/// General purpose and pointer/index registers plus IP
///
/// AX, CX, DX and BX are stored as words; their byte halves are views onto
/// the same storage, so `word == (high << 8) | low` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterFile {
    words: [u16; 8],
    /// Instruction pointer
    pub ip: u16,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register including IP
    pub fn reset(&mut self) {
        self.words = [0; 8];
        self.ip = 0;
    }

    /// Read an 8-bit register by code (AL, CL, DL, BL, AH, CH, DH, BH)
    #[inline]
    pub fn get_byte_reg(&self, code: u8) -> u8 {
        let code = code & 0x07;
        if code < 4 {
            self.words[code as usize] as u8
        } else {
            (self.words[(code - 4) as usize] >> 8) as u8
        }
    }

    /// Write an 8-bit register by code; the value is masked to 8 bits and
    /// the other half of the word is preserved
    #[inline]
    pub fn set_byte_reg(&mut self, code: u8, value: u32) {
        let code = code & 0x07;
        let val = (value & 0xFF) as u16;
        if code < 4 {
            let word = &mut self.words[code as usize];
            *word = (*word & 0xFF00) | val;
        } else {
            let word = &mut self.words[(code - 4) as usize];
            *word = (*word & 0x00FF) | (val << 8);
        }
    }

    /// Read a 16-bit register by code (AX, CX, DX, BX, SP, BP, SI, DI)
    #[inline]
    pub fn get_word_reg(&self, code: u8) -> u16 {
        self.words[(code & 0x07) as usize]
    }

    /// Write a 16-bit register by code; the value is masked to 16 bits
    #[inline]
    pub fn set_word_reg(&mut self, code: u8, value: u32) {
        self.words[(code & 0x07) as usize] = (value & 0xFFFF) as u16;
    }

    #[inline]
    pub fn ax(&self) -> u16 {
        self.words[AX as usize]
    }

    #[inline]
    pub fn cx(&self) -> u16 {
        self.words[CX as usize]
    }

    #[inline]
    pub fn dx(&self) -> u16 {
        self.words[DX as usize]
    }

    #[inline]
    pub fn bx(&self) -> u16 {
        self.words[BX as usize]
    }

    #[inline]
    pub fn sp(&self) -> u16 {
        self.words[SP as usize]
    }

    #[inline]
    pub fn bp(&self) -> u16 {
        self.words[BP as usize]
    }

    #[inline]
    pub fn si(&self) -> u16 {
        self.words[SI as usize]
    }

    #[inline]
    pub fn di(&self) -> u16 {
        self.words[DI as usize]
    }
}

/// Segment registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentRegisters {
    /// Extra segment (string destination)
    pub es: u16,
    /// Code segment
    pub cs: u16,
    /// Stack segment
    pub ss: u16,
    /// Data segment
    pub ds: u16,
}

impl SegmentRegisters {
    /// Power-on values: CS = 0xFFFF, everything else zero
    pub fn reset(&mut self) {
        self.es = 0;
        self.cs = 0xFFFF;
        self.ss = 0;
        self.ds = 0;
    }

    /// Read a segment register by its 2-bit code
    #[inline]
    pub fn get(&self, code: u8) -> u16 {
        match code & 0x03 {
            ES => self.es,
            CS => self.cs,
            SS => self.ss,
            _ => self.ds,
        }
    }

    /// Write a segment register by its 2-bit code
    #[inline]
    pub fn set(&mut self, code: u8, value: u16) {
        match code & 0x03 {
            ES => self.es = value,
            CS => self.cs = value,
            SS => self.ss = value,
            _ => self.ds = value,
        }
    }

    /// Name for trace output
    pub fn name(code: u8) -> &'static str {
        match code & 0x03 {
            ES => "ES",
            CS => "CS",
            SS => "SS",
            _ => "DS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_write_updates_both_halves() {
        let mut regs = RegisterFile::new();
        regs.set_word_reg(AX, 0x1234);
        assert_eq!(regs.get_byte_reg(AH), 0x12);
        assert_eq!(regs.get_byte_reg(AL), 0x34);

        for (word, low, high) in [(CX, CL, CH), (DX, DL, DH), (BX, BL, BH)] {
            regs.set_word_reg(word, 0xBEEF);
            assert_eq!(regs.get_byte_reg(high), 0xBE);
            assert_eq!(regs.get_byte_reg(low), 0xEF);
        }
    }

    #[test]
    fn test_half_write_preserves_other_half() {
        let mut regs = RegisterFile::new();
        regs.set_word_reg(BX, 0xAABB);

        regs.set_byte_reg(BL, 0x11);
        assert_eq!(regs.bx(), 0xAA11);

        regs.set_byte_reg(BH, 0x22);
        assert_eq!(regs.bx(), 0x2211);
    }

    #[test]
    fn test_out_of_range_values_are_masked() {
        let mut regs = RegisterFile::new();
        regs.set_byte_reg(AL, 0x1FF);
        assert_eq!(regs.get_byte_reg(AL), 0xFF);
        assert_eq!(regs.get_byte_reg(AH), 0x00);

        regs.set_word_reg(SI, 0x12345);
        assert_eq!(regs.si(), 0x2345);
    }

    #[test]
    fn test_pointer_registers_have_no_byte_view() {
        let mut regs = RegisterFile::new();
        regs.set_word_reg(SP, 0xFFFE);
        regs.set_word_reg(BP, 0x1000);
        regs.set_word_reg(DI, 0x0042);

        // Byte code 4 is AH, not the low half of SP
        assert_eq!(regs.get_byte_reg(AH), 0);
        assert_eq!(regs.sp(), 0xFFFE);
        assert_eq!(regs.bp(), 0x1000);
        assert_eq!(regs.di(), 0x0042);
    }

    #[test]
    fn test_register_reset() {
        let mut regs = RegisterFile::new();
        regs.set_word_reg(DX, 0x5555);
        regs.ip = 0x0100;
        regs.reset();
        assert_eq!(regs, RegisterFile::default());
    }

    #[test]
    fn test_segment_codes() {
        let mut segs = SegmentRegisters::default();
        segs.reset();
        assert_eq!(segs.cs, 0xFFFF);

        segs.set(ES, 0x1000);
        segs.set(SS, 0x2000);
        segs.set(DS, 0x3000);
        assert_eq!(segs.get(ES), 0x1000);
        assert_eq!(segs.get(SS), 0x2000);
        assert_eq!(segs.get(DS), 0x3000);
        assert_eq!(SegmentRegisters::name(CS), "CS");
    }
}
