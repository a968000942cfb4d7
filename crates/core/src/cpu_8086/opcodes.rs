//! Opcode dispatch table
//!
//! Every implemented opcode byte maps to an [`OpcodeEntry`] describing how
//! its width is chosen, which operand bytes follow it, what it costs and
//! which handler executes it. The execution loop never inspects raw opcode
//! values; adding an instruction means adding a row here (or calling
//! [`Cpu8086::install_opcode`]).
//!
//! Base costs come from the 8086 datasheet. Memory forms additionally pay
//! the effective-address cost computed during decode; handlers add any
//! data-dependent cycles (taken branches, shift counts, multiplies).

use super::decode::Instruction;
use super::error::CpuError;
use super::execute as ex;
use super::memory::Memory8086;
use super::Cpu8086;

/// Handler result: keep running or stop at a halt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Opcode handler
pub type Handler<M> = fn(&mut Cpu8086<M>, &Instruction) -> Result<Flow, CpuError>;

/// How the operand width is derived from the opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthRule {
    /// `w` bit in bit 0
    Bit0,
    /// `w` bit in bit 3 (MOV reg, imm)
    Bit3,
    Byte,
    Word,
}

/// Size of an immediate operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmRule {
    Byte,
    Word,
    /// Byte or word following the instruction width
    Width,
    /// One byte sign-extended to the instruction width
    SignExtended,
}

/// Operand bytes that follow the opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRule {
    Implied,
    ModRm,
    ModRmImmediate(ImmRule),
    Immediate(ImmRule),
    /// offset16 followed by segment16
    FarPointer,
}

/// Base cycle cost by operand form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    /// Register operand or no r/m operand (per iteration for string ops)
    pub register: u32,
    /// Memory operand, before the effective-address cost
    pub memory: u32,
}

/// Opcode class as seen by the repeat-prefix logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Normal,
    /// String primitive. `compare` forms (CMPS/SCAS) can terminate a
    /// repeat early on ZF; `single` is the cost without a repeat prefix.
    String { compare: bool, single: u32 },
}

/// Dispatch table row
pub struct OpcodeEntry<M: Memory8086> {
    pub mnemonic: &'static str,
    pub width: WidthRule,
    pub operands: OperandRule,
    /// `None` when the handler charges the whole cost itself (groups whose
    /// cost depends on the sub-opcode)
    pub timing: Option<Timing>,
    /// Instructions without this marker must leave FLAGS untouched
    pub affects_flags: bool,
    pub class: OpClass,
    pub handler: Handler<M>,
}

impl<M: Memory8086> Clone for OpcodeEntry<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Memory8086> Copy for OpcodeEntry<M> {}

impl<M: Memory8086> std::fmt::Debug for OpcodeEntry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("mnemonic", &self.mnemonic)
            .field("width", &self.width)
            .field("operands", &self.operands)
            .field("timing", &self.timing)
            .field("affects_flags", &self.affects_flags)
            .field("class", &self.class)
            .finish()
    }
}

impl<M: Memory8086> OpcodeEntry<M> {
    /// Implied operands, width from bit 0, handler-timed, flags untouched
    pub fn new(mnemonic: &'static str, handler: Handler<M>) -> Self {
        Self {
            mnemonic,
            width: WidthRule::Bit0,
            operands: OperandRule::Implied,
            timing: None,
            affects_flags: false,
            class: OpClass::Normal,
            handler,
        }
    }

    pub fn width(mut self, rule: WidthRule) -> Self {
        self.width = rule;
        self
    }

    pub fn operands(mut self, rule: OperandRule) -> Self {
        self.operands = rule;
        self
    }

    /// Same cost for every form
    pub fn cycles(mut self, cycles: u32) -> Self {
        self.timing = Some(Timing {
            register: cycles,
            memory: cycles,
        });
        self
    }

    pub fn timing(mut self, register: u32, memory: u32) -> Self {
        self.timing = Some(Timing { register, memory });
        self
    }

    pub fn sets_flags(mut self) -> Self {
        self.affects_flags = true;
        self
    }

    /// Mark as a string primitive; `per_iteration` is charged per repeat
    pub fn string(mut self, compare: bool, per_iteration: u32, single: u32) -> Self {
        self.class = OpClass::String { compare, single };
        self.timing = Some(Timing {
            register: per_iteration,
            memory: per_iteration,
        });
        self
    }
}

const ALU_MNEMONICS: [&str; 8] = ["ADD", "OR", "ADC", "SBB", "AND", "SUB", "XOR", "CMP"];

/// Build the 256-entry table of the supported instruction set
pub fn build_table<M: Memory8086>() -> Vec<Option<OpcodeEntry<M>>> {
    use ImmRule::*;
    use OperandRule::*;

    let mut table: Vec<Option<OpcodeEntry<M>>> = vec![None; 256];
    let mut set = |opcode: u8, entry: OpcodeEntry<M>| table[opcode as usize] = Some(entry);

    // ===== ALU: 00-3D =====
    for (op, &mnemonic) in ALU_MNEMONICS.iter().enumerate() {
        let base = (op as u8) << 3;
        // r/m, reg and reg, r/m forms (xx0 - xx3)
        for form in 0..4 {
            set(
                base | form,
                OpcodeEntry::new(mnemonic, ex::alu_rm_reg)
                    .operands(ModRm)
                    .timing(3, 9)
                    .sets_flags(),
            );
        }
        // AL/AX, imm (xx4 - xx5)
        for form in 4..6 {
            set(
                base | form,
                OpcodeEntry::new(mnemonic, ex::alu_acc_imm)
                    .operands(Immediate(Width))
                    .cycles(4)
                    .sets_flags(),
            );
        }
    }

    // ===== Segment push/pop =====
    for opcode in [0x06, 0x0E, 0x16, 0x1E] {
        set(opcode, OpcodeEntry::new("PUSH", ex::push_seg).width(WidthRule::Word).cycles(10));
    }
    for opcode in [0x07, 0x17, 0x1F] {
        set(opcode, OpcodeEntry::new("POP", ex::pop_seg).width(WidthRule::Word).cycles(8));
    }

    // ===== Register inc/dec/push/pop: 40-5F =====
    for reg in 0..8u8 {
        set(
            0x40 | reg,
            OpcodeEntry::new("INC", ex::inc_reg).width(WidthRule::Word).cycles(2).sets_flags(),
        );
        set(
            0x48 | reg,
            OpcodeEntry::new("DEC", ex::dec_reg).width(WidthRule::Word).cycles(2).sets_flags(),
        );
        set(0x50 | reg, OpcodeEntry::new("PUSH", ex::push_reg).width(WidthRule::Word).cycles(11));
        set(0x58 | reg, OpcodeEntry::new("POP", ex::pop_reg).width(WidthRule::Word).cycles(8));
    }

    // ===== Conditional jumps: 70-7F =====
    for cc in 0..16u8 {
        set(
            0x70 | cc,
            OpcodeEntry::new("Jcc", ex::jcc)
                .width(WidthRule::Byte)
                .operands(Immediate(Byte))
                .cycles(4),
        );
    }

    // ===== Immediate ALU group: 80-83 =====
    set(0x80, OpcodeEntry::new("GRP1", ex::alu_group).operands(ModRmImmediate(Width)).timing(4, 10).sets_flags());
    set(0x81, OpcodeEntry::new("GRP1", ex::alu_group).operands(ModRmImmediate(Width)).timing(4, 10).sets_flags());
    set(0x82, OpcodeEntry::new("GRP1", ex::alu_group).operands(ModRmImmediate(Width)).timing(4, 10).sets_flags());
    set(0x83, OpcodeEntry::new("GRP1", ex::alu_group).operands(ModRmImmediate(SignExtended)).timing(4, 10).sets_flags());

    // ===== TEST/XCHG/MOV with mod/reg/rm: 84-8F =====
    set(0x84, OpcodeEntry::new("TEST", ex::test_rm_reg).operands(ModRm).timing(3, 9).sets_flags());
    set(0x85, OpcodeEntry::new("TEST", ex::test_rm_reg).operands(ModRm).timing(3, 9).sets_flags());
    set(0x86, OpcodeEntry::new("XCHG", ex::xchg_rm_reg).operands(ModRm).timing(4, 17));
    set(0x87, OpcodeEntry::new("XCHG", ex::xchg_rm_reg).operands(ModRm).timing(4, 17));
    for opcode in 0x88..=0x8B {
        set(opcode, OpcodeEntry::new("MOV", ex::mov_rm_reg).operands(ModRm).timing(2, 8));
    }
    set(0x8C, OpcodeEntry::new("MOV", ex::mov_rm_seg).width(WidthRule::Word).operands(ModRm).timing(2, 9));
    set(0x8D, OpcodeEntry::new("LEA", ex::lea).width(WidthRule::Word).operands(ModRm).cycles(2));
    set(0x8E, OpcodeEntry::new("MOV", ex::mov_seg_rm).width(WidthRule::Word).operands(ModRm).timing(2, 8));
    set(0x8F, OpcodeEntry::new("POP", ex::pop_rm).width(WidthRule::Word).operands(ModRm).timing(8, 17));

    // ===== 90-9F =====
    set(0x90, OpcodeEntry::new("NOP", ex::nop).cycles(3));
    for reg in 1..8u8 {
        set(0x90 | reg, OpcodeEntry::new("XCHG", ex::xchg_ax).width(WidthRule::Word).cycles(3));
    }
    set(0x98, OpcodeEntry::new("CBW", ex::cbw).cycles(2));
    set(0x99, OpcodeEntry::new("CWD", ex::cwd).cycles(5));
    set(0x9A, OpcodeEntry::new("CALL", ex::call_far).operands(FarPointer).cycles(28));
    set(0x9C, OpcodeEntry::new("PUSHF", ex::pushf).cycles(10));
    set(0x9D, OpcodeEntry::new("POPF", ex::popf).cycles(8).sets_flags());
    set(0x9E, OpcodeEntry::new("SAHF", ex::sahf).cycles(4).sets_flags());
    set(0x9F, OpcodeEntry::new("LAHF", ex::lahf).cycles(4));

    // ===== Accumulator moves and string primitives: A0-AF =====
    for opcode in 0xA0..=0xA3 {
        set(opcode, OpcodeEntry::new("MOV", ex::mov_acc_mem).operands(Immediate(Word)).cycles(10));
    }
    set(0xA4, OpcodeEntry::new("MOVSB", ex::movs).string(false, 17, 18));
    set(0xA5, OpcodeEntry::new("MOVSW", ex::movs).string(false, 17, 18));
    set(0xA6, OpcodeEntry::new("CMPSB", ex::cmps).string(true, 22, 22).sets_flags());
    set(0xA7, OpcodeEntry::new("CMPSW", ex::cmps).string(true, 22, 22).sets_flags());
    set(0xA8, OpcodeEntry::new("TEST", ex::test_acc_imm).operands(Immediate(Width)).cycles(4).sets_flags());
    set(0xA9, OpcodeEntry::new("TEST", ex::test_acc_imm).operands(Immediate(Width)).cycles(4).sets_flags());
    set(0xAA, OpcodeEntry::new("STOSB", ex::stos).string(false, 10, 11));
    set(0xAB, OpcodeEntry::new("STOSW", ex::stos).string(false, 10, 11));
    set(0xAC, OpcodeEntry::new("LODSB", ex::lods).string(false, 13, 12));
    set(0xAD, OpcodeEntry::new("LODSW", ex::lods).string(false, 13, 12));
    set(0xAE, OpcodeEntry::new("SCASB", ex::scas).string(true, 15, 15).sets_flags());
    set(0xAF, OpcodeEntry::new("SCASW", ex::scas).string(true, 15, 15).sets_flags());

    // ===== MOV reg, imm: B0-BF =====
    for opcode in 0xB0..=0xBF {
        set(
            opcode,
            OpcodeEntry::new("MOV", ex::mov_reg_imm)
                .width(WidthRule::Bit3)
                .operands(Immediate(Width))
                .cycles(4),
        );
    }

    // ===== Returns, MOV r/m imm, interrupts: C2-CF =====
    set(0xC2, OpcodeEntry::new("RET", ex::ret_near).operands(Immediate(Word)).cycles(12));
    set(0xC3, OpcodeEntry::new("RET", ex::ret_near).cycles(8));
    set(0xC6, OpcodeEntry::new("MOV", ex::mov_rm_imm).operands(ModRmImmediate(Width)).timing(4, 10));
    set(0xC7, OpcodeEntry::new("MOV", ex::mov_rm_imm).operands(ModRmImmediate(Width)).timing(4, 10));
    set(0xCA, OpcodeEntry::new("RETF", ex::ret_far).operands(Immediate(Word)).cycles(17));
    set(0xCB, OpcodeEntry::new("RETF", ex::ret_far).cycles(18));
    set(0xCC, OpcodeEntry::new("INT3", ex::int3).cycles(52).sets_flags());
    set(0xCD, OpcodeEntry::new("INT", ex::int_n).operands(Immediate(Byte)).cycles(51).sets_flags());
    set(0xCE, OpcodeEntry::new("INTO", ex::into).cycles(4).sets_flags());
    set(0xCF, OpcodeEntry::new("IRET", ex::iret).cycles(24).sets_flags());

    // ===== Shifts and rotates: D0-D3 =====
    set(0xD0, OpcodeEntry::new("SHIFT", ex::shift_group).operands(ModRm).timing(2, 15).sets_flags());
    set(0xD1, OpcodeEntry::new("SHIFT", ex::shift_group).operands(ModRm).timing(2, 15).sets_flags());
    set(0xD2, OpcodeEntry::new("SHIFT", ex::shift_group).operands(ModRm).timing(8, 20).sets_flags());
    set(0xD3, OpcodeEntry::new("SHIFT", ex::shift_group).operands(ModRm).timing(8, 20).sets_flags());

    // ===== Loops and jumps: E0-EB =====
    set(0xE0, OpcodeEntry::new("LOOPNZ", ex::loop_cx).width(WidthRule::Byte).operands(Immediate(Byte)).cycles(5));
    set(0xE1, OpcodeEntry::new("LOOPZ", ex::loop_cx).width(WidthRule::Byte).operands(Immediate(Byte)).cycles(6));
    set(0xE2, OpcodeEntry::new("LOOP", ex::loop_cx).width(WidthRule::Byte).operands(Immediate(Byte)).cycles(5));
    set(0xE3, OpcodeEntry::new("JCXZ", ex::jcxz).width(WidthRule::Byte).operands(Immediate(Byte)).cycles(6));
    set(0xE8, OpcodeEntry::new("CALL", ex::call_near).width(WidthRule::Word).operands(Immediate(Word)).cycles(19));
    set(0xE9, OpcodeEntry::new("JMP", ex::jmp_near).width(WidthRule::Word).operands(Immediate(Word)).cycles(15));
    set(0xEA, OpcodeEntry::new("JMP", ex::jmp_far).operands(FarPointer).cycles(15));
    set(0xEB, OpcodeEntry::new("JMP", ex::jmp_short).width(WidthRule::Byte).operands(Immediate(Byte)).cycles(15));

    // ===== F4-FF =====
    set(0xF4, OpcodeEntry::new("HLT", ex::hlt).cycles(2));
    set(0xF5, OpcodeEntry::new("CMC", ex::flag_control).cycles(2).sets_flags());
    set(0xF6, OpcodeEntry::new("GRP3", ex::unary_group).operands(ModRm).sets_flags());
    set(0xF7, OpcodeEntry::new("GRP3", ex::unary_group).operands(ModRm).sets_flags());
    set(0xF8, OpcodeEntry::new("CLC", ex::flag_control).cycles(2).sets_flags());
    set(0xF9, OpcodeEntry::new("STC", ex::flag_control).cycles(2).sets_flags());
    set(0xFA, OpcodeEntry::new("CLI", ex::flag_control).cycles(2).sets_flags());
    set(0xFB, OpcodeEntry::new("STI", ex::flag_control).cycles(2).sets_flags());
    set(0xFC, OpcodeEntry::new("CLD", ex::flag_control).cycles(2).sets_flags());
    set(0xFD, OpcodeEntry::new("STD", ex::flag_control).cycles(2).sets_flags());
    set(0xFE, OpcodeEntry::new("GRP4", ex::inc_dec_group).width(WidthRule::Byte).operands(ModRm).sets_flags());
    set(0xFF, OpcodeEntry::new("GRP5", ex::word_group).width(WidthRule::Word).operands(ModRm).sets_flags());

    table
}
