//! Opcode handlers
//!
//! Each handler receives a fully decoded [`Instruction`]. The engine has
//! already charged the table's base cost (plus the effective-address cost
//! for memory forms); handlers only charge data-dependent extras. Handlers
//! for string primitives perform a single iteration; repetition is driven
//! by the engine.

use super::alu::{self, AluOp, ShiftOp};
use super::decode::Instruction;
use super::error::CpuError;
use super::flags::{FLAG_CF, FLAG_DF, FLAG_IF, FLAG_MASK, FLAG_OF};
use super::memory::Memory8086;
use super::opcodes::{Flow, ImmRule};
use super::operand::{Operand, Width};
use super::registers::{AH, AL, AX, CL, CX, DI, DX, ES, SI, SP};
use super::Cpu8086;

/// Operand helpers shared by the handlers and by externally installed ones
impl<M: Memory8086> Cpu8086<M> {
    /// Read a general register of the given width
    #[inline]
    pub fn read_register(&self, width: Width, code: u8) -> u32 {
        match width {
            Width::Byte => self.regs.get_byte_reg(code) as u32,
            Width::Word => self.regs.get_word_reg(code) as u32,
        }
    }

    /// Write a general register of the given width (value is masked)
    #[inline]
    pub fn write_register(&mut self, width: Width, code: u8, value: u32) {
        match width {
            Width::Byte => self.regs.set_byte_reg(code, value),
            Width::Word => self.regs.set_word_reg(code, value),
        }
    }

    pub fn read_operand(&mut self, width: Width, operand: Operand) -> Result<u32, CpuError> {
        match operand {
            Operand::Register(code) => Ok(self.read_register(width, code)),
            Operand::Memory { segment, offset } => self.read_at(width, segment, offset),
        }
    }

    pub fn write_operand(&mut self, width: Width, operand: Operand, value: u32) -> Result<(), CpuError> {
        match operand {
            Operand::Register(code) => {
                self.write_register(width, code, value);
                Ok(())
            }
            Operand::Memory { segment, offset } => self.write_at(width, segment, offset, value),
        }
    }

    /// Charge `register` cycles, or `memory` plus the EA cost when the r/m
    /// operand is in memory
    #[inline]
    pub fn charge_form(&mut self, instr: &Instruction, register: u32, memory: u32) {
        if instr.has_memory_operand() {
            self.charge(memory + instr.ea_cycles);
        } else {
            self.charge(register);
        }
    }

    /// Signed step applied to SI/DI by string primitives
    #[inline]
    fn string_delta(&self, width: Width) -> u16 {
        if self.flags.direction() {
            width.bytes().wrapping_neg()
        } else {
            width.bytes()
        }
    }

    fn advance_index(&mut self, code: u8, width: Width) {
        let value = self.regs.get_word_reg(code).wrapping_add(self.string_delta(width));
        self.regs.set_word_reg(code, value as u32);
    }

    #[inline]
    fn jump_relative(&mut self, displacement: u16) {
        self.regs.ip = self.regs.ip.wrapping_add(displacement);
    }
}

/// 8-bit relative displacement sign-extended to 16 bits
#[inline]
fn short_displacement(instr: &Instruction) -> u16 {
    instr.imm as u8 as i8 as i16 as u16
}

// ===== Arithmetic and logic =====

/// ADD/OR/ADC/SBB/AND/SUB/XOR/CMP between r/m and reg (00-3B)
pub fn alu_rm_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let op = AluOp::from_bits(instr.opcode >> 3);
    let width = instr.width;
    let reg = Operand::Register(instr.reg());
    let (dst, src) = if instr.direction {
        (reg, instr.rm())
    } else {
        (instr.rm(), reg)
    };

    let a = cpu.read_operand(width, dst)?;
    let b = cpu.read_operand(width, src)?;
    let result = alu::binary(&mut cpu.flags, op, width, a, b);
    if op.writes_result() {
        cpu.write_operand(width, dst, result)?;
        if dst.is_memory() {
            cpu.charge(7);
        }
    }
    Ok(Flow::Continue)
}

/// ALU operation between AL/AX and an immediate (04, 05, 0C, ... 3D)
pub fn alu_acc_imm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let op = AluOp::from_bits(instr.opcode >> 3);
    let width = instr.width;
    let a = cpu.read_register(width, AX);
    let result = alu::binary(&mut cpu.flags, op, width, a, instr.imm as u32);
    if op.writes_result() {
        cpu.write_register(width, AX, result);
    }
    Ok(Flow::Continue)
}

/// 80-83: ALU operation on r/m with an immediate, operation in reg field
pub fn alu_group<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let op = AluOp::from_bits(instr.reg());
    let width = instr.width;
    let dst = instr.rm();
    let a = cpu.read_operand(width, dst)?;
    let result = alu::binary(&mut cpu.flags, op, width, a, instr.imm as u32);
    if op.writes_result() {
        cpu.write_operand(width, dst, result)?;
        if dst.is_memory() {
            cpu.charge(7);
        }
    }
    Ok(Flow::Continue)
}

pub fn test_rm_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let a = cpu.read_operand(width, instr.rm())?;
    let b = cpu.read_register(width, instr.reg());
    alu::logic(&mut cpu.flags, width, a & b);
    Ok(Flow::Continue)
}

pub fn test_acc_imm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let a = cpu.read_register(width, AX);
    alu::logic(&mut cpu.flags, width, a & instr.imm as u32);
    Ok(Flow::Continue)
}

pub fn inc_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let code = instr.opcode & 0x07;
    let value = cpu.read_register(Width::Word, code);
    let result = alu::inc(&mut cpu.flags, Width::Word, value);
    cpu.write_register(Width::Word, code, result);
    Ok(Flow::Continue)
}

pub fn dec_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let code = instr.opcode & 0x07;
    let value = cpu.read_register(Width::Word, code);
    let result = alu::dec(&mut cpu.flags, Width::Word, value);
    cpu.write_register(Width::Word, code, result);
    Ok(Flow::Continue)
}

pub fn cbw<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    let al = cpu.regs.get_byte_reg(AL);
    cpu.regs.set_word_reg(AX, al as i8 as i16 as u16 as u32);
    Ok(Flow::Continue)
}

pub fn cwd<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    let dx = if cpu.regs.ax() & 0x8000 != 0 { 0xFFFF } else { 0 };
    cpu.regs.set_word_reg(DX, dx);
    Ok(Flow::Continue)
}

// ===== Data movement =====

/// MOV r/m <-> reg (88-8B)
pub fn mov_rm_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let reg = instr.reg();
    if instr.direction {
        let value = cpu.read_operand(width, instr.rm())?;
        cpu.write_register(width, reg, value);
    } else {
        let value = cpu.read_register(width, reg);
        cpu.write_operand(width, instr.rm(), value)?;
        // mem <- reg is one cycle slower than reg <- mem
        if instr.has_memory_operand() {
            cpu.charge(1);
        }
    }
    Ok(Flow::Continue)
}

/// 8C: MOV r/m16, sreg
pub fn mov_rm_seg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let seg = instr.reg();
    if seg > 3 {
        return Err(cpu.decode_error(instr.opcode));
    }
    let value = cpu.segs.get(seg);
    cpu.write_operand(Width::Word, instr.rm(), value as u32)?;
    Ok(Flow::Continue)
}

/// 8E: MOV sreg, r/m16
pub fn mov_seg_rm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let seg = instr.reg();
    if seg > 3 {
        return Err(cpu.decode_error(instr.opcode));
    }
    let value = cpu.read_operand(Width::Word, instr.rm())?;
    cpu.segs.set(seg, value as u16);
    Ok(Flow::Continue)
}

/// 8D: LEA r16, m. A register operand is a reserved encoding.
pub fn lea<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    match instr.rm() {
        Operand::Memory { offset, .. } => {
            cpu.regs.set_word_reg(instr.reg(), offset as u32);
            Ok(Flow::Continue)
        }
        Operand::Register(_) => Err(cpu.decode_error(instr.opcode)),
    }
}

/// A0-A3: MOV between AL/AX and a direct memory offset
pub fn mov_acc_mem<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let segment = cpu.data_segment();
    if instr.direction {
        let value = cpu.read_register(width, AX);
        cpu.write_at(width, segment, instr.imm, value)?;
    } else {
        let value = cpu.read_at(width, segment, instr.imm)?;
        cpu.write_register(width, AX, value);
    }
    Ok(Flow::Continue)
}

/// B0-BF: MOV reg, imm
pub fn mov_reg_imm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.write_register(instr.width, instr.opcode & 0x07, instr.imm as u32);
    Ok(Flow::Continue)
}

/// C6/C7: MOV r/m, imm (reg field must be 0)
pub fn mov_rm_imm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    if instr.reg() != 0 {
        return Err(cpu.decode_error(instr.opcode));
    }
    cpu.write_operand(instr.width, instr.rm(), instr.imm as u32)?;
    Ok(Flow::Continue)
}

pub fn xchg_rm_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let reg = instr.reg();
    let a = cpu.read_register(width, reg);
    let b = cpu.read_operand(width, instr.rm())?;
    cpu.write_operand(width, instr.rm(), a)?;
    cpu.write_register(width, reg, b);
    Ok(Flow::Continue)
}

/// 91-97: XCHG AX, r16
pub fn xchg_ax<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let code = instr.opcode & 0x07;
    let ax = cpu.regs.ax();
    let other = cpu.regs.get_word_reg(code);
    cpu.regs.set_word_reg(AX, other as u32);
    cpu.regs.set_word_reg(code, ax as u32);
    Ok(Flow::Continue)
}

pub fn nop<M: Memory8086>(_cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    Ok(Flow::Continue)
}

pub fn lahf<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    let low = cpu.flags.bits() & 0xFF;
    cpu.regs.set_byte_reg(AH, low as u32);
    Ok(Flow::Continue)
}

/// SAHF loads SF, ZF, AF, PF and CF from AH
pub fn sahf<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    let ah = cpu.regs.get_byte_reg(AH) as u16 & 0xD5;
    let bits = (cpu.flags.bits() & 0xFF00) | ah;
    cpu.flags.set_bits(bits);
    Ok(Flow::Continue)
}

// ===== Stack =====

pub fn push_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let code = instr.opcode & 0x07;
    // PUSH SP stores the already decremented value
    let value = match code {
        SP => cpu.regs.sp().wrapping_sub(2),
        _ => cpu.regs.get_word_reg(code),
    };
    cpu.push(value)?;
    Ok(Flow::Continue)
}

pub fn pop_reg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let value = cpu.pop()?;
    cpu.regs.set_word_reg(instr.opcode & 0x07, value as u32);
    Ok(Flow::Continue)
}

pub fn push_seg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let value = cpu.segs.get((instr.opcode >> 3) & 0x03);
    cpu.push(value)?;
    Ok(Flow::Continue)
}

pub fn pop_seg<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let value = cpu.pop()?;
    cpu.segs.set((instr.opcode >> 3) & 0x03, value);
    Ok(Flow::Continue)
}

/// 8F: POP r/m16 (reg field must be 0)
pub fn pop_rm<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    if instr.reg() != 0 {
        return Err(cpu.decode_error(instr.opcode));
    }
    let value = cpu.pop()?;
    cpu.write_operand(Width::Word, instr.rm(), value as u32)?;
    Ok(Flow::Continue)
}

pub fn pushf<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.push(cpu.flags.bits())?;
    Ok(Flow::Continue)
}

pub fn popf<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    let value = cpu.pop()?;
    cpu.flags.set_bits(value & FLAG_MASK);
    Ok(Flow::Continue)
}

// ===== Control transfer =====

/// 70-7F: short conditional jump, condition in the low nibble
pub fn jcc<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    if cpu.flags.condition(instr.opcode & 0x0F) {
        cpu.jump_relative(short_displacement(instr));
        cpu.charge(12);
    }
    Ok(Flow::Continue)
}

/// E0-E2: LOOPNZ, LOOPZ, LOOP. CX is decremented without touching flags.
pub fn loop_cx<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let cx = cpu.regs.cx().wrapping_sub(1);
    cpu.regs.set_word_reg(CX, cx as u32);
    let (taken, extra) = match instr.opcode {
        0xE0 => (cx != 0 && !cpu.flags.zero(), 14),
        0xE1 => (cx != 0 && cpu.flags.zero(), 12),
        _ => (cx != 0, 12),
    };
    if taken {
        cpu.jump_relative(short_displacement(instr));
        cpu.charge(extra);
    }
    Ok(Flow::Continue)
}

pub fn jcxz<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    if cpu.regs.cx() == 0 {
        cpu.jump_relative(short_displacement(instr));
        cpu.charge(12);
    }
    Ok(Flow::Continue)
}

/// EB: JMP rel8
pub fn jmp_short<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.jump_relative(short_displacement(instr));
    Ok(Flow::Continue)
}

/// E9: JMP rel16
pub fn jmp_near<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.jump_relative(instr.imm);
    Ok(Flow::Continue)
}

/// EA: JMP ptr16:16
pub fn jmp_far<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.regs.ip = instr.imm;
    cpu.segs.cs = instr.segment;
    Ok(Flow::Continue)
}

/// E8: CALL rel16
pub fn call_near<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.push(cpu.regs.ip)?;
    cpu.jump_relative(instr.imm);
    Ok(Flow::Continue)
}

/// 9A: CALL ptr16:16
pub fn call_far<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.push(cpu.segs.cs)?;
    cpu.push(cpu.regs.ip)?;
    cpu.regs.ip = instr.imm;
    cpu.segs.cs = instr.segment;
    Ok(Flow::Continue)
}

/// C2/C3: near return, C2 also releases `imm` bytes of arguments
pub fn ret_near<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.regs.ip = cpu.pop()?;
    if instr.opcode == 0xC2 {
        let sp = cpu.regs.sp().wrapping_add(instr.imm);
        cpu.regs.set_word_reg(SP, sp as u32);
    }
    Ok(Flow::Continue)
}

/// CA/CB: far return
pub fn ret_far<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.regs.ip = cpu.pop()?;
    cpu.segs.cs = cpu.pop()?;
    if instr.opcode == 0xCA {
        let sp = cpu.regs.sp().wrapping_add(instr.imm);
        cpu.regs.set_word_reg(SP, sp as u32);
    }
    Ok(Flow::Continue)
}

pub fn hlt<M: Memory8086>(_cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    Ok(Flow::Halt)
}

// ===== Interrupts =====

pub fn int3<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.raise(3)?;
    Ok(Flow::Continue)
}

pub fn int_n<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.raise(instr.imm as u8)?;
    Ok(Flow::Continue)
}

/// CE: INTO raises vector 4 when OF is set
pub fn into<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    if cpu.flags.overflow() {
        cpu.raise(4)?;
        cpu.charge(49);
    }
    Ok(Flow::Continue)
}

pub fn iret<M: Memory8086>(cpu: &mut Cpu8086<M>, _instr: &Instruction) -> Result<Flow, CpuError> {
    cpu.interrupt_return()?;
    Ok(Flow::Continue)
}

// ===== Flag control =====

/// F5, F8-FD
pub fn flag_control<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    match instr.opcode {
        0xF5 => {
            let carry = cpu.flags.carry();
            cpu.flags.set(FLAG_CF, !carry);
        }
        0xF8 => cpu.flags.set(FLAG_CF, false),
        0xF9 => cpu.flags.set(FLAG_CF, true),
        0xFA => cpu.flags.set(FLAG_IF, false),
        0xFB => cpu.flags.set(FLAG_IF, true),
        0xFC => cpu.flags.set(FLAG_DF, false),
        0xFD => cpu.flags.set(FLAG_DF, true),
        _ => return Err(cpu.decode_error(instr.opcode)),
    }
    Ok(Flow::Continue)
}

// ===== String primitives (one iteration) =====

pub fn movs<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let value = cpu.read_at(width, cpu.data_segment(), cpu.regs.si())?;
    cpu.write_at(width, cpu.segs.es, cpu.regs.di(), value)?;
    cpu.advance_index(SI, width);
    cpu.advance_index(DI, width);
    Ok(Flow::Continue)
}

/// CMPS compares [OS:SI] with [ES:DI] (source minus destination)
pub fn cmps<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let a = cpu.read_at(width, cpu.data_segment(), cpu.regs.si())?;
    let b = cpu.read_at(width, cpu.segs.es, cpu.regs.di())?;
    alu::sub(&mut cpu.flags, width, a, b, 0);
    cpu.advance_index(SI, width);
    cpu.advance_index(DI, width);
    Ok(Flow::Continue)
}

pub fn stos<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let value = cpu.read_register(width, AX);
    cpu.write_at(width, cpu.segs.es, cpu.regs.di(), value)?;
    cpu.advance_index(DI, width);
    Ok(Flow::Continue)
}

pub fn lods<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let value = cpu.read_at(width, cpu.data_segment(), cpu.regs.si())?;
    cpu.write_register(width, AX, value);
    cpu.advance_index(SI, width);
    Ok(Flow::Continue)
}

/// SCAS compares AL/AX with [ES:DI]; the destination segment cannot be
/// overridden
pub fn scas<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let a = cpu.read_register(width, AX);
    let b = cpu.read_at(width, cpu.segs.get(ES), cpu.regs.di())?;
    alu::sub(&mut cpu.flags, width, a, b, 0);
    cpu.advance_index(DI, width);
    Ok(Flow::Continue)
}

// ===== Shifts and rotates =====

/// D0-D3: count is 1 (D0/D1) or CL (D2/D3), operation in reg field
pub fn shift_group<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let Some(op) = ShiftOp::from_bits(instr.reg()) else {
        return Err(cpu.decode_error(instr.opcode));
    };
    let width = instr.width;
    let count = if instr.opcode & 0x02 != 0 {
        cpu.regs.get_byte_reg(CL) as u32
    } else {
        1
    };

    let value = cpu.read_operand(width, instr.rm())?;
    let result = alu::shift_rotate(&mut cpu.flags, op, width, value, count);
    cpu.write_operand(width, instr.rm(), result)?;
    if instr.opcode & 0x02 != 0 {
        cpu.charge(4 * count);
    }
    Ok(Flow::Continue)
}

// ===== Unary groups =====

/// F6/F7: TEST imm, NOT, NEG, MUL, IMUL, DIV, IDIV
pub fn unary_group<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let width = instr.width;
    let word = width == Width::Word;
    let rm = instr.rm();

    match instr.reg() {
        // TEST r/m, imm (immediate follows the mod/reg/rm bytes)
        0 => {
            let imm = cpu.fetch_immediate(ImmRule::Width, width)? as u32;
            let value = cpu.read_operand(width, rm)?;
            alu::logic(&mut cpu.flags, width, value & imm);
            cpu.charge_form(instr, 5, 11);
        }
        1 => return Err(cpu.decode_error(instr.opcode)),
        // NOT
        2 => {
            let value = cpu.read_operand(width, rm)?;
            cpu.write_operand(width, rm, !value)?;
            cpu.charge_form(instr, 3, 16);
        }
        // NEG
        3 => {
            let value = cpu.read_operand(width, rm)?;
            let result = alu::neg(&mut cpu.flags, width, value);
            cpu.write_operand(width, rm, result)?;
            cpu.charge_form(instr, 3, 16);
        }
        // MUL: AX = AL * r/m8, DX:AX = AX * r/m16
        4 => {
            let src = cpu.read_operand(width, rm)?;
            let acc = cpu.read_register(width, AX);
            let product = acc * src;
            let high = if word {
                cpu.regs.set_word_reg(AX, product);
                cpu.regs.set_word_reg(DX, product >> 16);
                product >> 16
            } else {
                cpu.regs.set_word_reg(AX, product);
                product >> 8
            };
            cpu.flags.set(FLAG_CF, high != 0);
            cpu.flags.set(FLAG_OF, high != 0);
            if word {
                cpu.charge_form(instr, 118, 124);
            } else {
                cpu.charge_form(instr, 70, 76);
            }
        }
        // IMUL: signed forms of MUL
        5 => {
            let src = width.sign_extend(cpu.read_operand(width, rm)?);
            let acc = width.sign_extend(cpu.read_register(width, AX));
            let product = acc * src;
            // CF/OF set when the upper half is not a sign extension
            let fits = product == width.sign_extend(product as u32);
            if word {
                cpu.regs.set_word_reg(AX, product as u32);
                cpu.regs.set_word_reg(DX, (product >> 16) as u32);
            } else {
                cpu.regs.set_word_reg(AX, product as u32);
            }
            cpu.flags.set(FLAG_CF, !fits);
            cpu.flags.set(FLAG_OF, !fits);
            if word {
                cpu.charge_form(instr, 128, 134);
            } else {
                cpu.charge_form(instr, 80, 86);
            }
        }
        // DIV: AX / r/m8 -> AL rem AH, DX:AX / r/m16 -> AX rem DX
        6 => {
            let divisor = cpu.read_operand(width, rm)?;
            if word {
                cpu.charge_form(instr, 144, 150);
            } else {
                cpu.charge_form(instr, 80, 86);
            }
            let dividend = if word {
                ((cpu.regs.dx() as u32) << 16) | cpu.regs.ax() as u32
            } else {
                cpu.regs.ax() as u32
            };
            match dividend.checked_div(divisor) {
                Some(quotient) if quotient <= width.mask() => {
                    let remainder = dividend % divisor;
                    store_division(cpu, width, quotient, remainder);
                }
                _ => cpu.divide_error()?,
            }
        }
        // IDIV: signed, quotient truncated toward zero
        _ => {
            let divisor = width.sign_extend(cpu.read_operand(width, rm)?) as i64;
            if word {
                cpu.charge_form(instr, 165, 171);
            } else {
                cpu.charge_form(instr, 101, 107);
            }
            let dividend = if word {
                ((((cpu.regs.dx() as u32) << 16) | cpu.regs.ax() as u32) as i32) as i64
            } else {
                cpu.regs.ax() as i16 as i64
            };
            let limit = (width.sign_bit() - 1) as i64;
            match dividend.checked_div(divisor) {
                Some(quotient) if (-limit..=limit).contains(&quotient) => {
                    let remainder = dividend % divisor;
                    store_division(cpu, width, quotient as u32, remainder as u32);
                }
                _ => cpu.divide_error()?,
            }
        }
    }
    Ok(Flow::Continue)
}

fn store_division<M: Memory8086>(cpu: &mut Cpu8086<M>, width: Width, quotient: u32, remainder: u32) {
    match width {
        Width::Byte => {
            cpu.regs.set_byte_reg(AL, quotient);
            cpu.regs.set_byte_reg(AH, remainder);
        }
        Width::Word => {
            cpu.regs.set_word_reg(AX, quotient);
            cpu.regs.set_word_reg(DX, remainder);
        }
    }
}

/// FE: INC/DEC r/m8
pub fn inc_dec_group<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let reg = instr.reg();
    if reg > 1 {
        return Err(cpu.decode_error(instr.opcode));
    }
    inc_dec(cpu, instr, reg == 0)?;
    Ok(Flow::Continue)
}

fn inc_dec<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction, increment: bool) -> Result<(), CpuError> {
    let width = instr.width;
    let rm = instr.rm();
    let value = cpu.read_operand(width, rm)?;
    let result = if increment {
        alu::inc(&mut cpu.flags, width, value)
    } else {
        alu::dec(&mut cpu.flags, width, value)
    };
    cpu.write_operand(width, rm, result)?;
    cpu.charge_form(instr, 3, 15);
    Ok(())
}

/// FF: INC, DEC, CALL near/far indirect, JMP near/far indirect, PUSH
pub fn word_group<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<Flow, CpuError> {
    let rm = instr.rm();
    match instr.reg() {
        0 => inc_dec(cpu, instr, true)?,
        1 => inc_dec(cpu, instr, false)?,
        // CALL r/m16
        2 => {
            let target = cpu.read_operand(Width::Word, rm)? as u16;
            cpu.push(cpu.regs.ip)?;
            cpu.regs.ip = target;
            cpu.charge_form(instr, 16, 21);
        }
        // CALL m16:16
        3 => {
            let (offset, segment) = far_pointer(cpu, instr)?;
            cpu.push(cpu.segs.cs)?;
            cpu.push(cpu.regs.ip)?;
            cpu.regs.ip = offset;
            cpu.segs.cs = segment;
            cpu.charge_form(instr, 0, 37);
        }
        // JMP r/m16
        4 => {
            cpu.regs.ip = cpu.read_operand(Width::Word, rm)? as u16;
            cpu.charge_form(instr, 11, 18);
        }
        // JMP m16:16
        5 => {
            let (offset, segment) = far_pointer(cpu, instr)?;
            cpu.regs.ip = offset;
            cpu.segs.cs = segment;
            cpu.charge_form(instr, 0, 24);
        }
        // PUSH r/m16
        6 => {
            let value = cpu.read_operand(Width::Word, rm)? as u16;
            cpu.push(value)?;
            cpu.charge_form(instr, 11, 16);
        }
        _ => return Err(cpu.decode_error(instr.opcode)),
    }
    Ok(Flow::Continue)
}

/// Read an offset:segment pair from a memory operand. Register operands are
/// a reserved encoding.
fn far_pointer<M: Memory8086>(cpu: &mut Cpu8086<M>, instr: &Instruction) -> Result<(u16, u16), CpuError> {
    match instr.rm() {
        Operand::Memory { segment, offset } => {
            let target_ip = cpu.read_at(Width::Word, segment, offset)? as u16;
            let target_cs = cpu.read_at(Width::Word, segment, offset.wrapping_add(2))? as u16;
            Ok((target_ip, target_cs))
        }
        Operand::Register(_) => Err(cpu.decode_error(instr.opcode)),
    }
}
