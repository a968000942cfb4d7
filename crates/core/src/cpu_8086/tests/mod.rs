//! Scenario tests for the 8086 core
//!
//! Tests are organized by instruction family:
//! - `tests_8bit`: byte-wide ALU operations, moves, shifts and multiplies
//! - `tests_16bit`: word-wide operations, stack, segment moves and LEA
//! - `tests_flags`: flag arithmetic and flag control instructions
//! - `tests_jumps`: jumps, calls, returns and loops
//! - `tests_strings`: string primitives and repeat prefixes
//! - `tests_interrupts`: INT/IRET, traps, divide errors and external requests
//! - `tests_decode`: decode errors, address policies, HLT and the run loop
//! - `tests_timing`: cycle accounting and the timer hook

mod tests_8bit;
mod tests_strings;

use crate::cpu_8086::registers::SP;
use crate::cpu_8086::{ArrayMemory, Cpu8086};

/// CPU with CS = DS = ES = SS = `segment`, SP = 0xFFFE and `code` loaded
/// at `segment:offset`
pub(super) fn cpu_at(segment: u16, offset: u16, code: &[u8]) -> Cpu8086<ArrayMemory> {
    let mut cpu = Cpu8086::new(ArrayMemory::new());
    cpu.segs.cs = segment;
    cpu.segs.ds = segment;
    cpu.segs.es = segment;
    cpu.segs.ss = segment;
    cpu.regs.set_word_reg(SP, 0xFFFE);
    cpu.load(offset, code);
    cpu
}

/// `code` at 1000:0100
pub(super) fn cpu_with_program(code: &[u8]) -> Cpu8086<ArrayMemory> {
    cpu_at(0x1000, 0x0100, code)
}

pub(super) fn physical_address(segment: u16, offset: u16) -> u32 {
    ((segment as u32) << 4) + (offset as u32)
}

/// Point interrupt `vector` at `segment:offset`
pub(super) fn set_vector(cpu: &mut Cpu8086<ArrayMemory>, vector: u8, segment: u16, offset: u16) {
    let entry = vector as u32 * 4;
    cpu.memory.write_u16(entry, offset);
    cpu.memory.write_u16(entry + 2, segment);
}
