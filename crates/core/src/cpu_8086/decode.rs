//! Operand decoding: immediates, mod/reg/rm and effective addresses

use super::error::CpuError;
use super::memory::Memory8086;
use super::opcodes::{ImmRule, OperandRule, WidthRule};
use super::operand::{Operand, Width};
use super::registers::{BP, BX, DI, SI};
use super::Cpu8086;

/// Latched repeat prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    None,
    /// REP / REPE / REPZ (0xF3)
    WhileEqual,
    /// REPNE / REPNZ (0xF2)
    WhileNotEqual,
}

/// Decoded mod/reg/rm byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Bits 7-6
    pub mode: u8,
    /// Bits 5-3: register operand or group sub-opcode
    pub reg: u8,
    /// Bits 2-0
    pub rm: u8,
}

impl ModRm {
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            mode: (byte >> 6) & 0x03,
            reg: (byte >> 3) & 0x07,
            rm: byte & 0x07,
        }
    }

    /// mod == 11 selects a register instead of memory
    #[inline]
    pub fn is_register(&self) -> bool {
        self.mode == 0b11
    }
}

/// A fully decoded instruction handed to an opcode handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub width: Width,
    /// `d` bit: when set the reg field is the destination
    pub direction: bool,
    pub modrm: Option<ModRm>,
    /// Resolved r/m operand
    pub operand: Option<Operand>,
    /// Immediate, displacement or far-pointer offset (masked to width)
    pub imm: u16,
    /// Far-pointer segment
    pub segment: u16,
    /// Effective-address calculation cost of a memory operand
    pub ea_cycles: u32,
    pub repeat: RepeatMode,
}

impl Instruction {
    pub fn new(opcode: u8, width: Width, repeat: RepeatMode) -> Self {
        Self {
            opcode,
            width,
            direction: opcode & 0x02 != 0,
            modrm: None,
            operand: None,
            imm: 0,
            segment: 0,
            ea_cycles: 0,
            repeat,
        }
    }

    /// reg field of the mod/reg/rm byte
    #[inline]
    pub fn reg(&self) -> u8 {
        self.modrm.map_or(0, |m| m.reg)
    }

    /// The r/m operand. Handlers registered with a mod/reg/rm operand rule
    /// always have one; anything else sees register 0.
    #[inline]
    pub fn rm(&self) -> Operand {
        self.operand.unwrap_or(Operand::Register(0))
    }

    #[inline]
    pub fn has_memory_operand(&self) -> bool {
        self.operand.is_some_and(|op| op.is_memory())
    }

    /// Immediate interpreted as a signed displacement
    #[inline]
    pub fn displacement(&self) -> i16 {
        self.imm as i16
    }
}

impl<M: Memory8086> Cpu8086<M> {
    /// Consume one instruction byte at CS:IP, preferring the prefetch queue
    pub fn fetch_u8(&mut self) -> Result<u8, CpuError> {
        let byte = match self.queue.pop() {
            Some(byte) => byte,
            None => self.read_at(Width::Byte, self.segs.cs, self.regs.ip)? as u8,
        };
        self.regs.ip = self.regs.ip.wrapping_add(1);
        Ok(byte)
    }

    /// Consume a little-endian word from the instruction stream
    pub fn fetch_u16(&mut self) -> Result<u16, CpuError> {
        let low = self.fetch_u8()? as u16;
        let high = self.fetch_u8()? as u16;
        Ok((high << 8) | low)
    }

    /// Consume an immediate according to `rule`
    pub fn fetch_immediate(&mut self, rule: ImmRule, width: Width) -> Result<u16, CpuError> {
        Ok(match rule {
            ImmRule::Byte => self.fetch_u8()? as u16,
            ImmRule::Word => self.fetch_u16()?,
            ImmRule::Width => match width {
                Width::Byte => self.fetch_u8()? as u16,
                Width::Word => self.fetch_u16()?,
            },
            ImmRule::SignExtended => {
                let value = self.fetch_u8()? as i8 as i16 as u16;
                value & width.mask() as u16
            }
        })
    }

    /// Segment for non-BP memory operands: the override if present, else DS
    #[inline]
    pub fn data_segment(&self) -> u16 {
        self.segs.get(self.segment_override.unwrap_or(super::registers::DS))
    }

    /// Resolve a mod/reg/rm byte into an operand, consuming any displacement.
    /// Returns the operand and the effective-address cycle cost.
    ///
    /// | rm  | mod 00       | mod 01/10          |
    /// |-----|--------------|--------------------|
    /// | 000 | [BX+SI]      | [BX+SI+disp]       |
    /// | 001 | [BX+DI]      | [BX+DI+disp]       |
    /// | 010 | [BP+SI]      | [BP+SI+disp]       |
    /// | 011 | [BP+DI]      | [BP+DI+disp]       |
    /// | 100 | [SI]         | [SI+disp]          |
    /// | 101 | [DI]         | [DI+disp]          |
    /// | 110 | [disp16]     | [BP+disp]          |
    /// | 111 | [BX]         | [BX+disp]          |
    pub fn resolve_modrm(&mut self, modrm: ModRm) -> Result<(Operand, u32), CpuError> {
        if modrm.is_register() {
            return Ok((Operand::Register(modrm.rm), 0));
        }

        let bx = self.regs.get_word_reg(BX);
        let bp = self.regs.get_word_reg(BP);
        let si = self.regs.get_word_reg(SI);
        let di = self.regs.get_word_reg(DI);

        // (base offset, BP-relative, cycles without displacement)
        let (base, bp_relative, cycles) = match modrm.rm {
            0b000 => (bx.wrapping_add(si), false, 7),
            0b001 => (bx.wrapping_add(di), false, 8),
            0b010 => (bp.wrapping_add(si), true, 8),
            0b011 => (bp.wrapping_add(di), true, 7),
            0b100 => (si, false, 5),
            0b101 => (di, false, 5),
            0b110 => (bp, true, 5),
            _ => (bx, false, 5),
        };

        let (offset, bp_relative, cycles) = match modrm.mode {
            0b00 if modrm.rm == 0b110 => (self.fetch_u16()?, false, 6),
            0b00 => (base, bp_relative, cycles),
            0b01 => {
                let disp = self.fetch_u8()? as i8 as i16 as u16;
                (base.wrapping_add(disp), bp_relative, cycles + 4)
            }
            _ => {
                let disp = self.fetch_u16()?;
                (base.wrapping_add(disp), bp_relative, cycles + 4)
            }
        };

        let segment = match (bp_relative, self.segment_override) {
            (true, None) => self.segs.ss,
            _ => self.data_segment(),
        };

        Ok((Operand::Memory { segment, offset }, cycles))
    }

    /// Build an [`Instruction`] for `opcode` by fetching the operands its
    /// table entry asks for
    pub(crate) fn decode_operands(
        &mut self,
        opcode: u8,
        width_rule: WidthRule,
        operand_rule: OperandRule,
    ) -> Result<Instruction, CpuError> {
        let width = match width_rule {
            WidthRule::Bit0 => Width::from_bit(opcode),
            WidthRule::Bit3 => Width::from_bit(opcode >> 3),
            WidthRule::Byte => Width::Byte,
            WidthRule::Word => Width::Word,
        };
        let mut instr = Instruction::new(opcode, width, self.repeat);

        match operand_rule {
            OperandRule::Implied => {}
            OperandRule::ModRm => self.decode_modrm(&mut instr)?,
            OperandRule::ModRmImmediate(rule) => {
                self.decode_modrm(&mut instr)?;
                instr.imm = self.fetch_immediate(rule, width)?;
            }
            OperandRule::Immediate(rule) => {
                instr.imm = self.fetch_immediate(rule, width)?;
            }
            OperandRule::FarPointer => {
                instr.imm = self.fetch_u16()?;
                instr.segment = self.fetch_u16()?;
            }
        }

        Ok(instr)
    }

    fn decode_modrm(&mut self, instr: &mut Instruction) -> Result<(), CpuError> {
        let modrm = ModRm::from_byte(self.fetch_u8()?);
        let (operand, ea_cycles) = self.resolve_modrm(modrm)?;
        instr.modrm = Some(modrm);
        instr.operand = Some(operand);
        instr.ea_cycles = ea_cycles;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_8086::registers::{ES, SS};
    use crate::cpu_8086::ArrayMemory;

    fn cpu_with_code(code: &[u8]) -> Cpu8086<ArrayMemory> {
        let mut cpu = Cpu8086::new(ArrayMemory::new());
        cpu.segs.cs = 0x1000;
        cpu.regs.ip = 0;
        cpu.memory.load(0x10000, code);
        cpu
    }

    #[test]
    fn test_decode_modrm() {
        let m = ModRm::from_byte(0b11_010_001);
        assert_eq!((m.mode, m.reg, m.rm), (0b11, 0b010, 0b001));
        assert!(m.is_register());

        let m = ModRm::from_byte(0b01_111_110);
        assert_eq!((m.mode, m.reg, m.rm), (0b01, 0b111, 0b110));
        assert!(!m.is_register());
    }

    #[test]
    fn test_effective_address_register_mode() {
        let mut cpu = cpu_with_code(&[]);
        let (op, cycles) = cpu.resolve_modrm(ModRm::from_byte(0xC3)).unwrap();
        assert_eq!(op, Operand::Register(3));
        assert_eq!(cycles, 0);
        assert_eq!(cpu.regs.ip, 0);
    }

    #[test]
    fn test_effective_address_no_displacement() {
        let mut cpu = cpu_with_code(&[]);
        cpu.segs.ds = 0x2000;
        cpu.regs.set_word_reg(BX, 0x0100);
        cpu.regs.set_word_reg(SI, 0x0020);

        // [BX+SI]
        let (op, cycles) = cpu.resolve_modrm(ModRm::from_byte(0b00_000_000)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x2000,
                offset: 0x0120
            }
        );
        assert_eq!(cycles, 7);
    }

    #[test]
    fn test_effective_address_direct() {
        let mut cpu = cpu_with_code(&[0x34, 0x12]);
        cpu.segs.ds = 0x3000;
        cpu.regs.set_word_reg(BP, 0xFFFF);

        // mod=00 rm=110 is [disp16], not [BP]
        let (op, cycles) = cpu.resolve_modrm(ModRm::from_byte(0b00_000_110)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x3000,
                offset: 0x1234
            }
        );
        assert_eq!(cycles, 6);
        assert_eq!(cpu.regs.ip, 2);
    }

    #[test]
    fn test_effective_address_8bit_displacement_sign_extends() {
        let mut cpu = cpu_with_code(&[0xFE]);
        cpu.segs.ss = 0x4000;
        cpu.regs.set_word_reg(BP, 0x0010);

        // [BP-2] defaults to SS
        let (op, cycles) = cpu.resolve_modrm(ModRm::from_byte(0b01_000_110)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x4000,
                offset: 0x000E
            }
        );
        assert_eq!(cycles, 9);
    }

    #[test]
    fn test_effective_address_16bit_displacement() {
        let mut cpu = cpu_with_code(&[0x00, 0x10]);
        cpu.regs.set_word_reg(BX, 0x0004);
        cpu.regs.set_word_reg(DI, 0x0002);

        // [BX+DI+0x1000]
        let (op, cycles) = cpu.resolve_modrm(ModRm::from_byte(0b10_000_001)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x0000,
                offset: 0x1006
            }
        );
        assert_eq!(cycles, 12);
    }

    #[test]
    fn test_segment_override_applies_to_bp_forms() {
        let mut cpu = cpu_with_code(&[]);
        cpu.segs.es = 0x5000;
        cpu.segs.ss = 0x6000;
        cpu.segment_override = Some(ES);

        let (op, _) = cpu.resolve_modrm(ModRm::from_byte(0b00_000_011)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x5000,
                offset: 0
            }
        );

        cpu.segment_override = Some(SS);
        let (op, _) = cpu.resolve_modrm(ModRm::from_byte(0b00_000_111)).unwrap();
        assert_eq!(
            op,
            Operand::Memory {
                segment: 0x6000,
                offset: 0
            }
        );
    }

    #[test]
    fn test_fetch_immediate_rules() {
        let mut cpu = cpu_with_code(&[0x80, 0x34, 0x12, 0xFF, 0x7F]);
        assert_eq!(
            cpu.fetch_immediate(ImmRule::SignExtended, Width::Word).unwrap(),
            0xFF80
        );
        assert_eq!(cpu.fetch_immediate(ImmRule::Width, Width::Word).unwrap(), 0x1234);
        assert_eq!(
            cpu.fetch_immediate(ImmRule::SignExtended, Width::Byte).unwrap(),
            0x00FF
        );
        assert_eq!(cpu.fetch_immediate(ImmRule::Byte, Width::Word).unwrap(), 0x7F);
        assert_eq!(cpu.regs.ip, 5);
    }
}
